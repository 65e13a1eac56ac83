//! Error types for nsenter

use thiserror::Error;

/// nsenter error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// System error from nix
    #[error("System error: {0}")]
    System(#[from] nix::Error),

    /// A namespace file could not be opened or derived
    #[error("cannot open {namespace} namespace: {source}")]
    NamespaceUnavailable {
        /// Namespace short name (`mnt`, `user`, ...)
        namespace: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// `setns(2)` failed for a namespace (or a batch of them)
    #[error("reassociate to namespace '{namespace}' failed: {source}")]
    NamespaceEntryFailed {
        /// Namespace short name, or a `+`-joined batch
        namespace: String,
        /// Underlying error
        #[source]
        source: nix::Error,
    },

    /// Target shares the caller's user namespace, which cannot be re-entered
    #[error("refusing to re-enter the caller's own user namespace")]
    OwnUserNamespaceRejected,

    /// Something needed a target PID and none was given
    #[error("no target PID specified for {what}")]
    NoTargetPid {
        /// What required the target
        what: String,
    },

    /// Nothing to enter
    #[error("no namespace specified")]
    NoNamespaceSpecified,

    /// Cgroup hierarchy is not v2
    #[error("--join-cgroup is only supported under cgroup v2")]
    CgroupUnsupported,

    /// `CGroup` operation failed
    #[error("CGroup error: {message}")]
    Cgroup {
        /// Error message
        message: String,
    },

    /// setgroups/setgid/setuid failed
    #[error("{operation} failed: {source}")]
    CredentialChangeFailed {
        /// Operation that failed
        operation: String,
        /// Underlying error
        #[source]
        source: nix::Error,
    },

    /// capget/capset/prctl failed
    #[error("{operation} failed: {message}")]
    CapabilityPropagationFailed {
        /// Operation that failed
        operation: String,
        /// Error reported by the capability call
        message: String,
    },

    /// fchdir/chroot/chdir failed
    #[error("{operation} failed: {source}")]
    DirectoryChangeFailed {
        /// Operation that failed
        operation: String,
        /// Underlying error
        #[source]
        source: nix::Error,
    },

    /// Reading or applying the target's environment failed
    #[error("failed to import environment: {message}")]
    EnvironmentImportFailed {
        /// Error message
        message: String,
    },

    /// `execvp(3)` returned
    #[error("failed to execute {program}: {source}")]
    ExecFailed {
        /// Program that could not be executed
        program: String,
        /// Underlying error
        #[source]
        source: nix::Error,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },
}

impl Error {
    /// Shorthand for [`Error::InvalidConfig`]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Result type alias for nsenter operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_failure_names_namespace() {
        let err = Error::NamespaceEntryFailed {
            namespace: "mnt".to_string(),
            source: nix::Error::EPERM,
        };
        let msg = err.to_string();
        assert!(msg.contains("'mnt'"));
        assert!(msg.contains("EPERM"));
    }

    #[test]
    fn test_cgroup_unsupported_message() {
        assert!(Error::CgroupUnsupported.to_string().contains("cgroup v2"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::from(std::io::ErrorKind::NotFound);
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
