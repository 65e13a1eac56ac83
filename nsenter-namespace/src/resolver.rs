//! Turns a target into one open descriptor per enabled namespace

use std::fs::File;
use std::io;
use std::os::fd::{AsFd, OwnedFd};
use std::path::Path;

use nsenter_core::{Error, ProcessId, Result};
use tracing::{debug, error};

use crate::kind::{NamespaceKind, NamespaceMask};
use crate::plan::{DirSource, NamespacePlan};
use crate::procfs::{NamespaceIdentity, ProcFs};
use crate::sys;

fn unavailable(kind: NamespaceKind, source: io::Error) -> Error {
    Error::NamespaceUnavailable {
        namespace: kind.short_name().to_string(),
        source,
    }
}

fn open_path(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        Error::Io(io::Error::new(
            e.kind(),
            format!("cannot open {}: {e}", path.display()),
        ))
    })
}

/// Whether `kind` of `target` can be entered by the caller
///
/// The kind is unusable if the kernel lacks it, or if it is the user
/// namespace and the target already shares the caller's user namespace:
/// `setns(2)` refuses to re-enter the current user namespace.
///
/// # Errors
/// Returns error if the namespace files cannot be inspected for a reason
/// other than `ENOENT`.
pub fn is_usable_namespace(
    procfs: &ProcFs,
    target: ProcessId,
    kind: NamespaceKind,
) -> Result<bool> {
    let own = match NamespaceIdentity::of_process(procfs, ProcessId::current(), kind) {
        Ok(id) => id,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(unavailable(kind, e)),
    };

    if kind != NamespaceKind::User {
        return Ok(true);
    }

    let theirs = NamespaceIdentity::of_process(procfs, target, kind).map_err(|e| {
        error!(pid = %target, error = %e, "Cannot stat target user namespace");
        unavailable(kind, e)
    })?;

    if own == theirs {
        debug!(
            error = %Error::OwnUserNamespaceRejected,
            identity = %own,
            "Skipping user namespace"
        );
        return Ok(false);
    }

    Ok(true)
}

/// Populates a [`NamespacePlan`] with descriptors
#[derive(Debug)]
pub struct NamespaceResolver<'a> {
    plan: &'a mut NamespacePlan,
}

impl<'a> NamespaceResolver<'a> {
    /// Resolve into `plan`
    pub fn new(plan: &'a mut NamespacePlan) -> Self {
        Self { plan }
    }

    fn target(&self, what: &str) -> Result<ProcessId> {
        self.plan.target.ok_or_else(|| Error::NoTargetPid {
            what: what.to_string(),
        })
    }

    /// Open `/proc/<target>/<name>`
    ///
    /// # Errors
    /// Returns error if no target is set or the file cannot be opened.
    pub fn open_target_file(&self, name: &str) -> Result<File> {
        let target = self.target(if name.is_empty() { "process directory" } else { name })?;
        open_path(&self.plan.procfs.path(target, name))
    }

    /// Enable every usable namespace of the target that is not yet enabled
    ///
    /// # Errors
    /// Returns error if no target is set, or a namespace cannot be inspected.
    pub fn enable_all_usable(&mut self) -> Result<()> {
        let target = self.target("--all")?;
        for kind in NamespaceKind::ALL {
            if self.plan.is_enabled(kind) {
                continue;
            }
            if is_usable_namespace(&self.plan.procfs, target, kind)? {
                self.plan.registry.entry_mut(kind).mark_enabled();
            } else {
                debug!(namespace = %kind, "Namespace not usable, excluded");
            }
        }
        Ok(())
    }

    /// Obtain a descriptor, or a pidfd route, for every enabled entry
    ///
    /// A pidfd is opened when the target is needed at all; if that fails the
    /// entries fall back to `/proc/<pid>/ns/*`.
    ///
    /// # Errors
    /// Returns `NoTargetPid` if an entry, `--net-socket` or `--user-parent`
    /// needs a target that was not given, or `NamespaceUnavailable` if a
    /// namespace file cannot be opened.
    pub fn resolve_namespaces(&mut self) -> Result<()> {
        let missing = self.plan.registry.mask_without_fd();
        let needs_target = !missing.is_empty()
            || self.plan.net_socket.is_some()
            || self.plan.options.use_parent_userns;
        if !needs_target {
            return Ok(());
        }

        let target = self.target("namespace resolution")?;

        if self.plan.pidfd.is_none() {
            match sys::pidfd_open(target) {
                Ok(pidfd) => {
                    debug!(pid = %target, "Opened pidfd");
                    self.plan.pidfd = Some(pidfd);
                }
                Err(e) => debug!(pid = %target, error = %e, "pidfd_open failed, using /proc"),
            }
        }

        if self.plan.pidfd.is_none() && !missing.is_empty() {
            self.open_from_proc(target, missing)?;
        }
        Ok(())
    }

    fn open_from_proc(&mut self, target: ProcessId, mask: NamespaceMask) -> Result<()> {
        for kind in mask.kinds() {
            let path = self.plan.procfs.ns_path(target, kind);
            let file = File::open(&path).map_err(|e| {
                error!(
                    namespace = %kind,
                    path = %path.display(),
                    error = %e,
                    "Cannot open namespace"
                );
                unavailable(kind, e)
            })?;
            debug!(namespace = %kind, path = %path.display(), "Opened namespace file");
            self.plan.registry.entry_mut(kind).install(OwnedFd::from(file));
        }
        Ok(())
    }

    /// Open the root and working directory sources
    ///
    /// # Errors
    /// Returns error if a directory cannot be opened.
    pub fn open_directories(
        &mut self,
        root: Option<&DirSource>,
        cwd: Option<&DirSource>,
    ) -> Result<()> {
        if let Some(source) = root {
            self.plan.root = Some(self.open_dir_source(source, "root")?);
        }
        if let Some(source) = cwd {
            self.plan.cwd = Some(self.open_dir_source(source, "cwd")?);
        }
        Ok(())
    }

    fn open_dir_source(&self, source: &DirSource, proc_name: &str) -> Result<File> {
        match source {
            DirSource::Target => self.open_target_file(proc_name),
            DirSource::Path(path) => open_path(path),
        }
    }

    /// Open the target's `environ` and, for uid/gid follow, its process
    /// directory
    ///
    /// # Errors
    /// Returns error if no target is set or a file cannot be opened.
    pub fn open_target_sources(&mut self) -> Result<()> {
        if self.plan.options.import_env {
            self.plan.environ = Some(self.open_target_file("environ")?);
        }
        let follows = |id: Option<nsenter_core::IdSource>| {
            matches!(id, Some(nsenter_core::IdSource::Follow))
        };
        if follows(self.plan.options.uid) || follows(self.plan.options.gid) {
            self.plan.id_source = Some(self.open_target_file("")?);
        }
        Ok(())
    }

    /// Replace the user entry with the parent of the target's user namespace
    ///
    /// # Errors
    /// Returns `NamespaceUnavailable` if no reference namespace can be found
    /// or `NS_GET_USERNS` fails.
    pub fn derive_parent_userns(&mut self) -> Result<()> {
        let kind = NamespaceKind::User;
        let parent = {
            let registry = &self.plan.registry;
            let user = registry.entry(kind);

            // local intermediates drop at the end of this block
            let mut local: Option<OwnedFd> = None;
            let mut reference = user.fd().filter(|_| user.is_enabled());

            if reference.is_none() {
                if let Some(pidfd) = &self.plan.pidfd {
                    match sys::pidfd_user_namespace(pidfd.as_fd()) {
                        Ok(fd) => local = Some(fd),
                        Err(e) => debug!(error = %e, "PIDFD_GET_USER_NAMESPACE failed"),
                    }
                }
            }
            if reference.is_none() && local.is_none() {
                reference = registry
                    .iter(NamespaceMask::NONE, true)
                    .find_map(|entry| entry.fd());
            }
            if reference.is_none() && local.is_none() {
                let target = self.target("--user-parent")?;
                let path = self.plan.procfs.ns_path(target, kind);
                let file = File::open(&path).map_err(|e| unavailable(kind, e))?;
                local = Some(OwnedFd::from(file));
            }

            let reference = match &local {
                Some(fd) => fd.as_fd(),
                None => reference.ok_or_else(|| {
                    unavailable(kind, io::Error::from(io::ErrorKind::NotFound))
                })?,
            };
            sys::parent_user_namespace(reference).map_err(|e| {
                error!(error = %e, "Failed to open parent user namespace");
                unavailable(kind, e.into())
            })?
        };

        debug!("Installed parent user namespace");
        self.plan.registry.entry_mut(kind).install(parent);
        Ok(())
    }

    /// Replace the network entry with the namespace of a socket held by the
    /// target
    ///
    /// # Errors
    /// Returns `NamespaceUnavailable` if the socket cannot be retrieved or
    /// queried.
    pub fn derive_socket_netns(&mut self) -> Result<()> {
        let kind = NamespaceKind::Net;
        let Some(sock_fd) = self.plan.net_socket else {
            return Ok(());
        };

        let local_pidfd;
        let pidfd = if let Some(fd) = &self.plan.pidfd {
            fd.as_fd()
        } else {
            let target = self.target("--net-socket")?;
            local_pidfd = sys::pidfd_open(target).map_err(|e| unavailable(kind, e.into()))?;
            local_pidfd.as_fd()
        };

        let sock = sys::pidfd_getfd(pidfd, sock_fd).map_err(|e| {
            error!(fd = sock_fd, error = %e, "pidfd_getfd failed");
            unavailable(kind, e.into())
        })?;

        let sock = File::from(sock);
        sock.metadata().map_err(|e| unavailable(kind, e))?;

        let netns = sys::socket_net_namespace(sock.as_fd()).map_err(|e| {
            error!(fd = sock_fd, error = %e, "SIOCGSKNS failed");
            unavailable(kind, e.into())
        })?;

        debug!(fd = sock_fd, "Installed socket network namespace");
        self.plan.registry.entry_mut(kind).install(netns);
        Ok(())
    }

    /// Run the derivations requested by the plan options
    ///
    /// # Errors
    /// See [`Self::derive_parent_userns`] and [`Self::derive_socket_netns`].
    pub fn derive(&mut self) -> Result<()> {
        if self.plan.options.use_parent_userns {
            self.derive_parent_userns()?;
        }
        self.derive_socket_netns()
    }
}
