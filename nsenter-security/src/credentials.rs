//! uid, gid and supplementary group changes after namespace entry

use std::fs::File;
use std::os::unix::fs::MetadataExt;

use nix::unistd::{Gid, Uid, setgid, setgroups, setuid};
use nsenter_core::{Error, IdSource, Result};
use tracing::{debug, error, warn};

fn credential_failed(operation: &str, source: nix::Error) -> Error {
    error!(operation, error = %source, "Credential change failed");
    Error::CredentialChangeFailed {
        operation: operation.to_string(),
        source,
    }
}

/// Credentials to assume before exec
///
/// An id is only changed when it is forced, either explicitly through
/// `--setuid`/`--setgid` or implicitly by entering a user namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPlan {
    uid: IdSource,
    gid: IdSource,
    force_uid: bool,
    force_gid: bool,
    setgroups_failures: u32,
}

impl Default for CredentialPlan {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl CredentialPlan {
    /// Plan from the requested ids; an unset id stays untouched and
    /// defaults to 0 if later forced
    #[must_use]
    pub fn new(uid: Option<IdSource>, gid: Option<IdSource>) -> Self {
        Self {
            force_uid: uid.is_some(),
            force_gid: gid.is_some(),
            uid: uid.unwrap_or(IdSource::Value(0)),
            gid: gid.unwrap_or(IdSource::Value(0)),
            setgroups_failures: 0,
        }
    }

    /// Plan for an invocation; entering a user namespace without
    /// `preserve` forces both ids and makes the first `setgroups` attempt
    #[must_use]
    pub fn prepare(
        user_namespace: bool,
        preserve: bool,
        uid: Option<IdSource>,
        gid: Option<IdSource>,
    ) -> Self {
        let mut plan = Self::new(uid, gid);
        if user_namespace && !preserve {
            plan.prepare_user_namespace();
        }
        plan
    }

    /// uid to assume, if forced
    #[must_use]
    pub const fn uid(&self) -> Option<IdSource> {
        if self.force_uid { Some(self.uid) } else { None }
    }

    /// gid to assume, if forced
    #[must_use]
    pub const fn gid(&self) -> Option<IdSource> {
        if self.force_gid { Some(self.gid) } else { None }
    }

    /// Whether a follow id still needs [`Self::resolve_follow`]
    #[cfg(test)]
    pub(crate) fn needs_follow(&self) -> bool {
        (self.force_uid && self.uid == IdSource::Follow)
            || (self.force_gid && self.gid == IdSource::Follow)
    }

    /// Force both ids and try to drop supplementary groups before entering
    /// a user namespace
    ///
    /// The drop is retried after entry; only a second failure is fatal.
    pub fn prepare_user_namespace(&mut self) {
        self.force_uid = true;
        self.force_gid = true;
        if let Err(e) = setgroups(&[]) {
            warn!(error = %e, "setgroups failed before entering user namespace");
            self.setgroups_failures += 1;
        }
    }

    /// Replace follow ids with the owner of `source`, the target's
    /// `/proc/<pid>` directory
    ///
    /// # Errors
    /// Returns error if `source` cannot be stat'ed.
    pub fn resolve_follow(&mut self, source: &File) -> Result<()> {
        let meta = source.metadata().map_err(|e| {
            error!(error = %e, "Cannot stat target process");
            Error::Io(e)
        })?;
        if self.uid == IdSource::Follow {
            self.uid = IdSource::Value(meta.uid());
        }
        if self.gid == IdSource::Follow {
            self.gid = IdSource::Value(meta.gid());
        }
        debug!(uid = %self.uid, gid = %self.gid, "Resolved target credentials");
        Ok(())
    }

    /// Drop supplementary groups, then `setgid`, then `setuid`
    ///
    /// # Errors
    /// Returns `CredentialChangeFailed` naming the failing call, or
    /// `InvalidConfig` if a follow id was never resolved.
    pub fn apply(&self) -> Result<()> {
        if self.force_gid {
            if let Err(e) = setgroups(&[]) {
                if self.setgroups_failures > 0 {
                    return Err(credential_failed("setgroups", e));
                }
                debug!(error = %e, "setgroups failed, ignored");
            }
            let gid = resolved(self.gid, "gid")?;
            setgid(Gid::from_raw(gid)).map_err(|e| credential_failed("setgid", e))?;
            debug!(gid, "Changed gid");
        }
        if self.force_uid {
            let uid = resolved(self.uid, "uid")?;
            setuid(Uid::from_raw(uid)).map_err(|e| credential_failed("setuid", e))?;
            debug!(uid, "Changed uid");
        }
        Ok(())
    }
}

fn resolved(id: IdSource, what: &str) -> Result<u32> {
    match id {
        IdSource::Value(id) => Ok(id),
        IdSource::Follow => Err(Error::invalid_config(format!(
            "{what} follow requested but the target was not inspected"
        ))),
    }
}
