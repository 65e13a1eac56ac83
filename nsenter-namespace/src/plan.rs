//! Per-invocation namespace plan

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::os::fd::{OwnedFd, RawFd};
use std::path::PathBuf;

use nsenter_core::{IdSource, ProcessId};

use crate::kind::NamespaceKind;
use crate::procfs::ProcFs;
use crate::registry::NamespaceRegistry;

/// Whether to fork before exec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForkMode {
    /// Fork only if the PID namespace is entered
    #[default]
    Unspecified,
    /// Always fork
    Fork,
    /// Never fork
    NoFork,
}

impl ForkMode {
    /// Resolve against whether the PID namespace is part of the final set
    #[must_use]
    pub const fn should_fork(self, entering_pid_ns: bool) -> bool {
        match self {
            Self::Unspecified => entering_pid_ns,
            Self::Fork => true,
            Self::NoFork => false,
        }
    }
}

/// Scalar switches of an invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnterOptions {
    /// Enter every usable namespace of the target
    pub enter_all: bool,
    /// Do not touch uids, gids or supplementary groups
    pub preserve_credentials: bool,
    /// Raise permitted capabilities into the ambient set
    pub keep_capabilities: bool,
    /// Fork before exec
    pub fork: ForkMode,
    /// Join the target's cgroup
    pub join_cgroup: bool,
    /// Enter the parent of the target's user namespace
    pub use_parent_userns: bool,
    /// Import the target's environment
    pub import_env: bool,
    /// uid to assume
    pub uid: Option<IdSource>,
    /// gid to assume
    pub gid: Option<IdSource>,
}

/// How a directory descriptor is obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirSource {
    /// The target's `/proc/<pid>/<root|cwd>`
    Target,
    /// An explicit path, opened before namespace entry
    Path(PathBuf),
}

/// Resolved state of one invocation
///
/// Built once by the driver and passed by `&mut` through resolution and
/// entry. Every descriptor is closed when the plan drops.
#[derive(Debug, Default)]
pub struct NamespacePlan {
    /// One entry per namespace kind
    pub registry: NamespaceRegistry,
    /// Process whose namespaces are entered
    pub target: Option<ProcessId>,
    /// pidfd of the target, once opened
    pub pidfd: Option<OwnedFd>,
    /// Descriptor number of a socket in the target, for `--net-socket`
    pub net_socket: Option<RawFd>,
    /// New root directory
    pub root: Option<File>,
    /// New working directory
    pub cwd: Option<File>,
    /// Working directory resolved inside the entered mount namespace
    pub wd_in_namespace: Option<PathBuf>,
    /// Target's `environ`
    pub environ: Option<File>,
    /// Target's `/proc/<pid>` directory, for uid/gid follow
    pub id_source: Option<File>,
    /// Target's `cgroup.procs`
    pub cgroup_procs: Option<File>,
    /// Scalar switches
    pub options: EnterOptions,
    /// procfs to resolve target paths against
    pub procfs: ProcFs,
}

impl NamespacePlan {
    /// Create an empty plan
    #[must_use]
    pub fn new(options: EnterOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Set the target process
    #[must_use]
    pub fn with_target(mut self, target: ProcessId) -> Self {
        self.target = Some(target);
        self
    }

    /// Use a different procfs mount
    #[must_use]
    pub fn with_procfs(mut self, procfs: ProcFs) -> Self {
        self.procfs = procfs;
        self
    }

    /// Whether `kind` is enabled
    #[must_use]
    pub fn is_enabled(&self, kind: NamespaceKind) -> bool {
        self.registry.entry(kind).is_enabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fork_mode_resolution() {
        assert!(ForkMode::Unspecified.should_fork(true));
        assert!(!ForkMode::Unspecified.should_fork(false));
        assert!(ForkMode::Fork.should_fork(false));
        assert!(!ForkMode::NoFork.should_fork(true));
    }

    #[test]
    fn test_default_plan_is_empty() {
        let plan = NamespacePlan::new(EnterOptions::default());
        assert!(plan.target.is_none());
        assert!(plan.registry.mask_of(true).is_empty());
        assert_eq!(plan.procfs, ProcFs::default());
    }

    #[test]
    fn test_options_serialize() {
        let options = EnterOptions {
            fork: ForkMode::NoFork,
            uid: Some(IdSource::Follow),
            ..EnterOptions::default()
        };
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["fork"], "nofork");
        assert_eq!(json["uid"], "follow");
    }
}
