//! Paths into procfs and namespace identities

use std::fmt;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use nsenter_core::ProcessId;
use nsenter_core::constants::PROC_ROOT;

use crate::kind::NamespaceKind;

/// Root of a procfs mount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new(PROC_ROOT)
    }
}

impl ProcFs {
    /// Use a procfs mounted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Mount point
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<pid>/<name>`; an empty `name` yields the process directory
    #[must_use]
    pub fn path(&self, pid: ProcessId, name: &str) -> PathBuf {
        let dir = self.root.join(pid.to_string());
        if name.is_empty() { dir } else { dir.join(name) }
    }

    /// Namespace file of `kind` for `pid`
    #[must_use]
    pub fn ns_path(&self, pid: ProcessId, kind: NamespaceKind) -> PathBuf {
        self.path(pid, kind.proc_name())
    }
}

/// Identity of a namespace: the device and inode of its nsfs file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceIdentity {
    /// Device of the nsfs mount
    pub dev: u64,
    /// Namespace inode
    pub ino: u64,
}

impl NamespaceIdentity {
    /// Identity of the namespace file at `path`, following the magic link
    ///
    /// # Errors
    /// Returns the `stat(2)` error, e.g. `NotFound` when the kernel lacks the
    /// namespace type.
    pub fn of_path(path: &Path) -> io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        Ok(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }

    /// Identity of namespace `kind` of `pid`
    ///
    /// # Errors
    /// See [`Self::of_path`].
    pub fn of_process(procfs: &ProcFs, pid: ProcessId, kind: NamespaceKind) -> io::Result<Self> {
        Self::of_path(&procfs.ns_path(pid, kind))
    }
}

impl fmt::Display for NamespaceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:[{}]", self.dev, self.ino)
    }
}
