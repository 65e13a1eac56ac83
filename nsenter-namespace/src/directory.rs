//! Root and working directory changes through descriptors

use std::fs::File;
use std::os::fd::AsFd;
use std::path::Path;

use nix::unistd::{chdir, chroot, fchdir};
use nsenter_core::{Error, Result};
use tracing::{debug, error};

fn dir_failed(operation: impl Into<String>, source: nix::Error) -> Error {
    let operation = operation.into();
    error!(operation = %operation, error = %source, "Directory change failed");
    Error::DirectoryChangeFailed { operation, source }
}

/// Pending root and working directory changes
#[derive(Debug, Default)]
pub struct DirectorySwitch {
    root: Option<File>,
    cwd: Option<File>,
    wd_in_namespace: Option<std::path::PathBuf>,
}

impl DirectorySwitch {
    /// Collect the changes to perform
    ///
    /// If only the root changes, the current directory is captured now so
    /// it can be restored under the new root.
    ///
    /// # Errors
    /// Returns error if the current directory cannot be opened.
    pub fn prepare(
        root: Option<File>,
        cwd: Option<File>,
        wd_in_namespace: Option<std::path::PathBuf>,
    ) -> Result<Self> {
        let cwd = match cwd {
            Some(cwd) => Some(cwd),
            None if root.is_some() && wd_in_namespace.is_none() => {
                let here = File::open(".").map_err(|e| {
                    Error::Io(std::io::Error::new(
                        e.kind(),
                        format!("cannot open current working directory: {e}"),
                    ))
                })?;
                debug!("Captured current working directory");
                Some(here)
            }
            None => None,
        };
        Ok(Self {
            root,
            cwd,
            wd_in_namespace,
        })
    }

    #[cfg(test)]
    pub(crate) const fn is_empty(&self) -> bool {
        self.root.is_none() && self.cwd.is_none() && self.wd_in_namespace.is_none()
    }

    /// Change root, then working directory
    ///
    /// The in-namespace working directory is opened only now, after the root
    /// change, so it resolves inside the entered mount namespace.
    ///
    /// # Errors
    /// Returns `DirectoryChangeFailed` if any step fails.
    pub fn apply(self) -> Result<()> {
        if let Some(root) = self.root {
            change_root(&root)?;
        }

        let cwd = match self.wd_in_namespace {
            Some(path) => Some(File::open(&path).map_err(|e| {
                dir_failed(
                    format!("open {}", path.display()),
                    nix::Error::from_raw(e.raw_os_error().unwrap_or(libc::EIO)),
                )
            })?),
            None => self.cwd,
        };

        if let Some(cwd) = cwd {
            fchdir(cwd.as_fd())
                .map_err(|e| dir_failed("change directory by working directory descriptor", e))?;
            debug!("Changed working directory");
        }
        Ok(())
    }
}

/// `fchdir(root)`, `chroot(".")`, `chdir("/")`
///
/// # Errors
/// Returns `DirectoryChangeFailed` naming the failing step.
pub fn change_root(root: &File) -> Result<()> {
    fchdir(root.as_fd())
        .map_err(|e| dir_failed("change directory by root descriptor", e))?;
    chroot(".").map_err(|e| dir_failed("chroot", e))?;
    chdir(Path::new("/")).map_err(|e| dir_failed("chdir /", e))?;
    debug!("Changed root directory");
    Ok(())
}
