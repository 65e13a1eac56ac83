//! Moving the calling process into a cgroup

use std::io::Write;

use nsenter_core::io::write_fully;
use nsenter_core::{Error, ProcessId, Result};
use tracing::{debug, error};

/// Writes pids into an open `cgroup.procs`
///
/// The sink is opened before any namespace is entered, so joining works
/// even when the cgroup directory is no longer reachable afterwards.
#[derive(Debug)]
pub struct CgroupJoiner<W: Write> {
    sink: W,
}

impl<W: Write> CgroupJoiner<W> {
    /// Join through `sink`
    pub const fn new(sink: W) -> Self {
        Self { sink }
    }

    /// Write `pid` in decimal, retrying interrupted and would-block writes
    ///
    /// # Errors
    /// Returns `Cgroup` if the write fails.
    pub fn join(&mut self, pid: ProcessId) -> Result<()> {
        let line = pid.as_raw().to_string();
        write_fully(&mut self.sink, line.as_bytes()).map_err(|e| {
            error!(pid = %pid, error = %e, "write cgroup.procs failed");
            Error::Cgroup {
                message: format!("write cgroup.procs failed: {e}"),
            }
        })?;
        debug!(pid = %pid, "Joined cgroup");
        Ok(())
    }

    /// Move the calling process
    ///
    /// # Errors
    /// See [`Self::join`].
    pub fn join_self(&mut self) -> Result<()> {
        self.join(ProcessId::current())
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct Flaky {
        failures: Vec<io::ErrorKind>,
        written: Vec<u8>,
    }

    impl Write for Flaky {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(kind) = self.failures.pop() {
                return Err(kind.into());
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_join_writes_decimal_pid() {
        let mut joiner = CgroupJoiner::new(Vec::new());
        joiner.join(ProcessId::from_raw(4242)).unwrap();
        assert_eq!(joiner.into_inner(), b"4242");
    }

    #[test]
    fn test_join_retries_interrupted_write() {
        let sink = Flaky {
            failures: vec![io::ErrorKind::Interrupted],
            written: Vec::new(),
        };
        let mut joiner = CgroupJoiner::new(sink);
        joiner.join(ProcessId::from_raw(7)).unwrap();
        assert_eq!(joiner.into_inner().written, b"7");
    }

    #[test]
    fn test_join_reports_hard_failure() {
        let sink = Flaky {
            failures: vec![io::ErrorKind::PermissionDenied],
            written: Vec::new(),
        };
        let err = CgroupJoiner::new(sink)
            .join(ProcessId::from_raw(7))
            .unwrap_err();
        assert!(matches!(err, Error::Cgroup { .. }));
    }
}
