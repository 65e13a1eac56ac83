//! Two-phase namespace entry
//!
//! Entering the user namespace changes what the remaining `setns(2)` calls
//! are allowed to do. If the user namespace lowers our privilege it must be
//! entered last; if it raises it, the other calls fail until it has been
//! entered. So every namespace except user is tried first with errors
//! ignored, then everything still pending is tried with errors reported.

use std::os::fd::{AsFd, BorrowedFd};

use nsenter_core::{Error, Result};
use tracing::{debug, error};

use crate::kind::{NamespaceKind, NamespaceMask};
use crate::plan::NamespacePlan;
use crate::registry::NamespaceRegistry;
use crate::sys;

/// Progress of the sequencer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Nothing attempted yet
    Unentered,
    /// Non-user namespaces attempted, failures tolerated
    Phase1,
    /// Everything pending attempted, failures fatal
    Phase2,
    /// All enabled namespaces entered
    Entered,
    /// A phase-2 entry failed
    Fatal,
}

/// Whether a phase tolerates failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Ignore errors, leave failed entries for phase two
    Tolerant,
    /// Report the first error
    Strict,
}

/// Enters the namespaces of a [`NamespacePlan`]
#[derive(Debug)]
pub struct EntrySequencer {
    state: EntryState,
    entered: NamespaceMask,
}

impl Default for EntrySequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl EntrySequencer {
    /// Create a sequencer in the `Unentered` state
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: EntryState::Unentered,
            entered: NamespaceMask::NONE,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> EntryState {
        self.state
    }

    /// Kinds entered so far
    #[must_use]
    pub const fn entered(&self) -> NamespaceMask {
        self.entered
    }

    /// Run both phases
    ///
    /// # Errors
    /// Returns `NoNamespaceSpecified` if nothing is enabled, or
    /// `NamespaceEntryFailed` for the first phase-two failure.
    pub fn enter(&mut self, plan: &mut NamespacePlan) -> Result<NamespaceMask> {
        let requested = plan.registry.mask_of(true);
        if requested.is_empty() {
            return Err(Error::NoNamespaceSpecified);
        }
        debug!(namespaces = %requested, "Entering namespaces");

        self.state = EntryState::Phase1;
        let pidfd = plan.pidfd.as_ref().map(AsFd::as_fd);
        let phase1 = requested.without(NamespaceKind::User);
        self.entered |= enter_phase(&mut plan.registry, pidfd, phase1, Phase::Tolerant)?;

        self.state = EntryState::Phase2;
        let pending = plan.registry.mask_of(true);
        if !pending.is_empty() {
            match enter_phase(&mut plan.registry, pidfd, pending, Phase::Strict) {
                Ok(entered) => self.entered |= entered,
                Err(e) => {
                    self.state = EntryState::Fatal;
                    return Err(e);
                }
            }
        }

        self.state = EntryState::Entered;
        debug!(namespaces = %self.entered, "All namespaces entered");
        Ok(self.entered)
    }
}

fn entry_failed(namespace: String, source: nix::Error) -> Error {
    Error::NamespaceEntryFailed { namespace, source }
}

/// Enter the enabled entries of `registry` within `mask`
///
/// Entries without a descriptor are first entered together through one
/// `setns(pidfd, mask)`. The kernel applies such a call to all of them or
/// none, so a failed batch needs no rollback and its entries are retried one
/// by one below.
///
/// # Errors
/// Only under [`Phase::Strict`]: the first failing namespace.
pub fn enter_phase(
    registry: &mut NamespaceRegistry,
    pidfd: Option<BorrowedFd<'_>>,
    mask: NamespaceMask,
    phase: Phase,
) -> Result<NamespaceMask> {
    let mut entered = NamespaceMask::NONE;
    if mask.is_empty() {
        return Ok(entered);
    }

    if let Some(pidfd) = pidfd {
        let batch: NamespaceMask = registry
            .iter(mask, true)
            .filter(|entry| !entry.has_fd())
            .map(|entry| entry.kind())
            .collect();
        if !batch.is_empty() {
            match sys::setns(pidfd, batch) {
                Ok(()) => {
                    debug!(namespaces = %batch, "Entered through pidfd");
                    registry.disable_mask(batch);
                    entered |= batch;
                }
                Err(e) => debug!(namespaces = %batch, error = %e, "pidfd setns failed"),
            }
        }
    }

    let pending: Vec<NamespaceKind> = registry.iter(mask, true).map(|e| e.kind()).collect();
    for kind in pending {
        let entry = registry.entry(kind);
        let result = match (entry.fd(), pidfd) {
            (Some(fd), _) => sys::setns(fd, kind.mask()),
            (None, Some(pidfd)) => sys::setns(pidfd, kind.mask()),
            (None, None) => Err(nix::Error::EBADF),
        };

        match result {
            Ok(()) => {
                debug!(namespace = %kind, "Entered namespace");
                registry.disable(kind);
                entered |= kind.mask();
            }
            Err(e) if phase == Phase::Tolerant => {
                debug!(namespace = %kind, error = %e, "setns failed, retrying later");
            }
            Err(e) => {
                error!(namespace = %kind, error = %e, "setns failed");
                return Err(entry_failed(kind.short_name().to_string(), e));
            }
        }
    }

    Ok(entered)
}
