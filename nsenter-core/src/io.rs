//! Retrying I/O helpers for procfs and cgroupfs descriptors

use std::io::{self, Read, Write};

use crate::constants::RETRY_DELAY;

/// Write all of `buf`, retrying short writes.
///
/// `EINTR` is retried immediately, `EAGAIN` after [`RETRY_DELAY`]. Any
/// other error is returned.
///
/// # Errors
/// Returns the first non-retryable write error, or `WriteZero` if the sink
/// stops accepting bytes.
pub fn write_fully<W: Write + ?Sized>(sink: &mut W, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match sink.write(buf) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "sink accepted no bytes",
                ));
            }
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                tracing::trace!("write would block, retrying");
                std::thread::sleep(RETRY_DELAY);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Read a procfs file descriptor to its end.
///
/// procfs reports a size of zero for most files, so this never trusts
/// metadata and grows the buffer as needed.
///
/// # Errors
/// Returns the underlying read error.
pub fn read_all<R: Read + ?Sized>(source: &mut R) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(1024);
    source.read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts at most `chunk` bytes per call and fails once with `first_err`
    struct StutteringSink {
        written: Vec<u8>,
        chunk: usize,
        first_err: Option<io::ErrorKind>,
    }

    impl Write for StutteringSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(kind) = self.first_err.take() {
                return Err(io::Error::from(kind));
            }
            let n = buf.len().min(self.chunk);
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_short_writes_are_completed() {
        let mut sink = StutteringSink {
            written: Vec::new(),
            chunk: 2,
            first_err: None,
        };
        write_fully(&mut sink, b"123456").unwrap();
        assert_eq!(sink.written, b"123456");
    }

    #[test]
    fn test_interrupted_is_retried() {
        let mut sink = StutteringSink {
            written: Vec::new(),
            chunk: 16,
            first_err: Some(io::ErrorKind::Interrupted),
        };
        write_fully(&mut sink, b"4242").unwrap();
        assert_eq!(sink.written, b"4242");
    }

    #[test]
    fn test_would_block_is_retried() {
        let mut sink = StutteringSink {
            written: Vec::new(),
            chunk: 16,
            first_err: Some(io::ErrorKind::WouldBlock),
        };
        write_fully(&mut sink, b"7").unwrap();
        assert_eq!(sink.written, b"7");
    }

    #[test]
    fn test_hard_error_is_returned() {
        let mut sink = StutteringSink {
            written: Vec::new(),
            chunk: 16,
            first_err: Some(io::ErrorKind::PermissionDenied),
        };
        let err = write_fully(&mut sink, b"1").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(sink.written.is_empty());
    }

    #[test]
    fn test_read_all_reads_procfs() {
        let mut f = std::fs::File::open("/proc/self/stat").unwrap();
        let data = read_all(&mut f).unwrap();
        assert!(!data.is_empty());
    }
}
