//! Core type definitions with strong typing and validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Process identifier of a namespace target
///
/// Zero is never a valid target; it is rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ProcessId(i32);

impl ProcessId {
    /// Create a validated PID
    ///
    /// # Errors
    /// Returns error if the PID is not strictly positive
    pub fn new(pid: i32) -> Result<Self> {
        if pid <= 0 {
            return Err(Error::invalid_config(format!("invalid pid: {pid}")));
        }
        Ok(Self(pid))
    }

    /// Create from raw PID without validation
    #[must_use]
    pub const fn from_raw(pid: i32) -> Self {
        Self(pid)
    }

    /// Get the current process ID
    #[must_use]
    pub fn current() -> Self {
        Self(nix::unistd::getpid().as_raw())
    }

    /// Convert to `nix::unistd::Pid`
    #[must_use]
    pub const fn as_nix_pid(self) -> nix::unistd::Pid {
        nix::unistd::Pid::from_raw(self.0)
    }

    /// Get raw PID value
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProcessId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let pid = s
            .parse::<i32>()
            .map_err(|e| Error::invalid_config(format!("failed to parse pid '{s}': {e}")))?;
        Self::new(pid)
    }
}

impl From<nix::unistd::Pid> for ProcessId {
    fn from(pid: nix::unistd::Pid) -> Self {
        Self(pid.as_raw())
    }
}

impl From<ProcessId> for nix::unistd::Pid {
    fn from(pid: ProcessId) -> Self {
        Self::from_raw(pid.0)
    }
}

/// Where a uid or gid to assume comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdSource {
    /// A literal numeric id
    Value(u32),
    /// The owner of the target's `/proc/<pid>` directory
    Follow,
}

impl FromStr for IdSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "follow" {
            return Ok(Self::Follow);
        }
        s.parse::<u32>()
            .map(Self::Value)
            .map_err(|e| Error::invalid_config(format!("failed to parse id '{s}': {e}")))
    }
}

impl fmt::Display for IdSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(id) => write!(f, "{id}"),
            Self::Follow => f.write_str("follow"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_id_validation() {
        assert!(ProcessId::new(1).is_ok());
        assert!(ProcessId::new(0).is_err());
        assert!(ProcessId::new(-5).is_err());
        assert!("abc".parse::<ProcessId>().is_err());
        assert_eq!("42".parse::<ProcessId>().unwrap().as_raw(), 42);
    }

    #[test]
    fn test_process_id() {
        let pid = ProcessId::from_raw(123);
        assert_eq!(pid.as_raw(), 123);

        let nix_pid = pid.as_nix_pid();
        assert_eq!(nix_pid.as_raw(), 123);
    }

    #[test]
    fn test_current_pid_matches_std() {
        assert_eq!(
            ProcessId::current().as_raw(),
            i32::try_from(std::process::id()).unwrap()
        );
    }

    #[test]
    fn test_id_source_parse() {
        assert_eq!("follow".parse::<IdSource>().unwrap(), IdSource::Follow);
        assert_eq!("1000".parse::<IdSource>().unwrap(), IdSource::Value(1000));
        assert!("-1".parse::<IdSource>().is_err());
        assert!("root".parse::<IdSource>().is_err());
    }

    #[test]
    fn test_id_source_serde() {
        let json = serde_json::to_string(&IdSource::Follow).unwrap();
        assert_eq!(json, "\"follow\"");
        let value = serde_json::to_string(&IdSource::Value(7)).unwrap();
        let back: IdSource = serde_json::from_str(&value).unwrap();
        assert_eq!(back, IdSource::Value(7));
    }
}
