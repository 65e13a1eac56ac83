//! Locating a process's cgroup v2 directory

use std::fs::{File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};

use nix::sys::statfs::{CGROUP2_SUPER_MAGIC, statfs};
use nsenter_core::constants::CGROUP_V2_PATH;
use nsenter_core::io::read_all;
use nsenter_core::{Error, Result};
use tracing::{debug, error};

/// Cgroup path from the contents of `/proc/<pid>/cgroup`
///
/// Takes the text after the last `:` of the first line. Under cgroup v2 the
/// file holds a single `0::<path>` line.
///
/// # Errors
/// Returns `Cgroup` if the contents hold no `:`-separated line.
pub fn parse_cgroup_path(contents: &str) -> Result<&str> {
    contents
        .split('\n')
        .find(|line| !line.is_empty())
        .and_then(|line| line.rsplit_once(':'))
        .map(|(_, path)| path)
        .ok_or_else(|| Error::Cgroup {
            message: "failed to get cgroup path".to_string(),
        })
}

/// A mounted cgroup hierarchy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgroupController {
    root: PathBuf,
}

impl Default for CgroupController {
    fn default() -> Self {
        Self::new(CGROUP_V2_PATH)
    }
}

impl CgroupController {
    /// Hierarchy mounted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Mount point
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the mount point is a cgroup2 filesystem
    ///
    /// A failing `statfs(2)` counts as "no".
    #[must_use]
    pub fn is_cgroup2(&self) -> bool {
        match statfs(self.root.as_path()) {
            Ok(fs) => fs.filesystem_type() == CGROUP2_SUPER_MAGIC,
            Err(e) => {
                error!(path = %self.root.display(), error = %e, "statfs failed");
                false
            }
        }
    }

    /// Fail unless the mount point is cgroup v2
    ///
    /// # Errors
    /// Returns `CgroupUnsupported` unless the hierarchy is cgroup v2.
    pub fn ensure_v2(&self) -> Result<()> {
        if self.is_cgroup2() {
            Ok(())
        } else {
            Err(Error::CgroupUnsupported)
        }
    }

    /// `cgroup.procs` of the cgroup at `path`, relative to the mount point
    #[must_use]
    pub fn procs_path(&self, path: &str) -> PathBuf {
        self.root
            .join(path.trim_start_matches('/'))
            .join("cgroup.procs")
    }

    /// Open `cgroup.procs` of `path` for appending
    ///
    /// # Errors
    /// Returns `Cgroup` if the file cannot be opened.
    pub fn open_procs(&self, path: &str) -> Result<File> {
        let procs = self.procs_path(path);
        let file = OpenOptions::new()
            .append(true)
            .open(&procs)
            .map_err(|e| {
                error!(path = %procs.display(), error = %e, "Cannot open cgroup.procs");
                Error::Cgroup {
                    message: format!("failed to open {}: {e}", procs.display()),
                }
            })?;
        debug!(path = %procs.display(), "Opened cgroup.procs");
        Ok(file)
    }

    /// Open `cgroup.procs` of the cgroup described by `proc_cgroup`, an open
    /// `/proc/<pid>/cgroup`
    ///
    /// # Errors
    /// Returns `Cgroup` if the file cannot be read or parsed, or the
    /// cgroup's `cgroup.procs` cannot be opened.
    pub fn open_procs_of<R: Read>(&self, mut proc_cgroup: R) -> Result<File> {
        let buf = read_all(&mut proc_cgroup).map_err(|e| Error::Cgroup {
            message: format!("failed to get cgroup path: {e}"),
        })?;
        let contents = String::from_utf8_lossy(&buf);
        let path = parse_cgroup_path(&contents)?;
        self.open_procs(path)
    }
}
