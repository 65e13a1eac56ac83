//! Fork before exec, relaying job-control stops
//!
//! This module uses `unsafe` for fork(), which is required so the exec'd
//! program becomes a member of an entered PID namespace.

#![allow(unsafe_code)]

use nix::sys::signal::{SigHandler, Signal, kill, signal};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, fork, getpid};
use nsenter_core::{Error, Result};
use tracing::debug;

/// Which side of the fork we are on
#[derive(Debug)]
pub enum Continuation {
    /// The forked child; carry on to exec
    Child,
    /// The original process; its child has finished
    Parent(ChildExit),
}

/// How the child ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    /// Exited with a status code
    Exited(i32),
    /// Killed by a signal
    Signaled(Signal),
}

/// State of the supervised child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Running
    Running,
    /// Stopped by job control
    Stopped,
    /// Exited with a status code
    Exited(i32),
    /// Killed by a signal
    Signaled(Signal),
}

impl SupervisorState {
    /// Map a wait status of the child to a state
    #[must_use]
    pub const fn from_wait_status(status: WaitStatus) -> Self {
        match status {
            WaitStatus::Exited(_, code) => Self::Exited(code),
            WaitStatus::Signaled(_, sig, _) => Self::Signaled(sig),
            WaitStatus::Stopped(..) => Self::Stopped,
            _ => Self::Running,
        }
    }

    /// Final outcome, if the child has terminated
    #[must_use]
    pub const fn exit(self) -> Option<ChildExit> {
        match self {
            Self::Exited(code) => Some(ChildExit::Exited(code)),
            Self::Signaled(sig) => Some(ChildExit::Signaled(sig)),
            Self::Running | Self::Stopped => None,
        }
    }
}

/// Waits on one child and mirrors its job-control stops
#[derive(Debug)]
pub struct ChildSupervisor {
    child: Pid,
    state: SupervisorState,
}

impl ChildSupervisor {
    /// Supervise `child`
    #[must_use]
    pub const fn new(child: Pid) -> Self {
        Self {
            child,
            state: SupervisorState::Running,
        }
    }

    #[cfg(test)]
    pub(crate) const fn state(&self) -> SupervisorState {
        self.state
    }

    /// Wait for the next state change
    ///
    /// On a stop, the supervisor stops itself and then resumes the child, so
    /// a job-control shell sees a single job.
    ///
    /// # Errors
    /// Returns error if `waitpid(2)` fails.
    pub fn step(&mut self) -> Result<SupervisorState> {
        let status = loop {
            match waitpid(self.child, Some(WaitPidFlag::WUNTRACED)) {
                Ok(status) => break status,
                Err(nix::errno::Errno::EINTR) => {}
                Err(e) => return Err(e.into()),
            }
        };

        self.state = SupervisorState::from_wait_status(status);
        if self.state == SupervisorState::Stopped {
            debug!(child = %self.child, "Child stopped, suspending");
            let _ = kill(getpid(), Signal::SIGSTOP);
            let _ = kill(self.child, Signal::SIGCONT);
            self.state = SupervisorState::Running;
        }
        Ok(self.state)
    }

    /// Loop until the child terminates
    ///
    /// # Errors
    /// Returns error if `waitpid(2)` fails.
    pub fn wait(mut self) -> Result<ChildExit> {
        loop {
            if let Some(exit) = self.step()?.exit() {
                debug!(child = %self.child, ?exit, "Child finished");
                return Ok(exit);
            }
        }
    }
}

/// Fork; the child returns immediately, the parent waits for it
///
/// # Errors
/// Returns error if `fork(2)` or `waitpid(2)` fails.
pub fn continue_as_child() -> Result<Continuation> {
    // SAFETY: restoring the default disposition is always sound.
    unsafe { signal(Signal::SIGCHLD, SigHandler::SigDfl) }?;

    // SAFETY: the process is single-threaded; the child only continues
    // with the same straight-line setup and exec.
    match unsafe { fork() } {
        Ok(ForkResult::Child) => Ok(Continuation::Child),
        Ok(ForkResult::Parent { child }) => {
            debug!(child = %child, "Forked, relaying child status");
            ChildSupervisor::new(child).wait().map(Continuation::Parent)
        }
        Err(e) => Err(Error::System(e)),
    }
}
