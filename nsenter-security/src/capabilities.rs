//! Propagating permitted capabilities into the ambient set
//!
//! A program exec'd after entering a user namespace keeps the capabilities
//! it was granted there only if they are ambient. Raising them requires
//! each one to be both permitted and inheritable, so the inheritable set is
//! first widened to the permitted set.

#![allow(unsafe_code)]

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use caps::errors::CapsError;
use caps::{CapSet, Capability, CapsHashSet};
use nix::errno::Errno;
use nix::sys::statfs::{PROC_SUPER_MAGIC, fstatfs};
use nsenter_core::constants::CAP_LAST_CAP_PATH;
use nsenter_core::{Error, Result};
use tracing::{debug, error};

// unused prctl(2) arguments must be zero
const NO_ARG: libc::c_ulong = 0;

fn cap_failed(operation: &str, source: &CapsError) -> Error {
    error!(operation, error = %source, "Capability change failed");
    Error::CapabilityPropagationFailed {
        operation: operation.to_string(),
        message: source.to_string(),
    }
}

fn read_set(set: CapSet, operation: &str) -> Result<CapsHashSet> {
    caps::read(None, set).map_err(|e| cap_failed(operation, &e))
}

fn mask_of(set: &CapsHashSet) -> u64 {
    set.iter().fold(0, |mask, cap| mask | cap.bitmask())
}

/// Capability known to the `caps` crate with kernel index `index`
fn capability(index: u32) -> Option<Capability> {
    caps::all()
        .into_iter()
        .find(|cap| u32::from(cap.index()) == index)
}

/// Capability sets of the calling thread, as 64-bit masks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitySets {
    /// Effective set
    pub effective: u64,
    /// Permitted set
    pub permitted: u64,
    /// Inheritable set
    pub inheritable: u64,
    /// Ambient set
    pub ambient: u64,
}

impl CapabilitySets {
    /// Snapshot of the calling thread's sets
    ///
    /// # Errors
    /// Returns `CapabilityPropagationFailed` if a set cannot be read.
    pub fn current() -> Result<Self> {
        Ok(Self {
            effective: mask_of(&read_set(CapSet::Effective, "capget")?),
            permitted: mask_of(&read_set(CapSet::Permitted, "capget")?),
            inheritable: mask_of(&read_set(CapSet::Inheritable, "capget")?),
            ambient: mask_of(&read_set(CapSet::Ambient, "prctl(PR_CAP_AMBIENT)")?),
        })
    }

    /// Effective capabilities up to and including `last`
    pub fn effective_up_to(&self, last: u32) -> impl Iterator<Item = u32> + '_ {
        (0..64u32)
            .take_while(move |cap| *cap <= last)
            .filter(move |cap| self.effective & (1u64 << cap) != 0)
    }
}

/// Whether `cap` is known to the kernel
#[must_use]
pub fn is_valid_capability(cap: u32) -> bool {
    // SAFETY: PR_CAPBSET_READ only reads its integer argument.
    unsafe {
        libc::prctl(
            libc::PR_CAPBSET_READ,
            libc::c_ulong::from(cap),
            NO_ARG,
            NO_ARG,
            NO_ARG,
        ) >= 0
    }
}

/// Whether `cap` is in the calling thread's ambient set
#[must_use]
pub fn is_ambient(cap: u32) -> bool {
    capability(cap)
        .is_some_and(|cap| caps::has_cap(None, CapSet::Ambient, cap).unwrap_or(false))
}

/// Highest capability for which `valid` holds, found by bisection
///
/// Starts at `i32::MAX`, which is always invalid, so the upper bound is
/// known to be invalid after the first probe.
pub fn bisect_last_cap(valid: impl Fn(u32) -> bool) -> u32 {
    let mut cap = i32::MAX.unsigned_abs();
    let (mut lo, mut hi) = (0u32, cap);
    while lo < cap {
        if valid(cap) {
            lo = cap;
        } else {
            hi = cap;
        }
        cap = lo + (hi - lo) / 2;
    }
    cap
}

/// `cap_last_cap` from procfs
///
/// The file only counts if it lives on procfs and the capability after the
/// one it names is really invalid.
#[must_use]
pub fn last_cap_from_procfs(path: &Path) -> Option<u32> {
    let mut file = File::open(path).ok()?;
    let on_procfs = loop {
        match fstatfs(&file) {
            Ok(fs) => break fs.filesystem_type() == PROC_SUPER_MAGIC,
            Err(Errno::EINTR | Errno::EAGAIN) => {}
            Err(_) => break false,
        }
    };
    if !on_procfs {
        debug!(path = %path.display(), "cap_last_cap is not on procfs");
        return None;
    }

    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    let cap: u32 = contents.trim().parse().ok()?;
    (cap < i32::MAX.unsigned_abs() && !is_valid_capability(cap + 1)).then_some(cap)
}

/// Highest capability the running kernel supports
///
/// Read from procfs when trustworthy, otherwise probed; cached.
#[must_use]
pub fn cap_last_cap() -> u32 {
    static LAST_CAP: OnceLock<u32> = OnceLock::new();
    *LAST_CAP.get_or_init(|| {
        let cap = last_cap_from_procfs(Path::new(CAP_LAST_CAP_PATH))
            .unwrap_or_else(|| bisect_last_cap(is_valid_capability));
        debug!(cap, "Determined last capability");
        cap
    })
}

/// Make every effective capability ambient
///
/// The inheritable set is set to the permitted set first.
///
/// # Errors
/// Returns `CapabilityPropagationFailed` naming `capget`, `capset` or the
/// `prctl` that failed.
pub fn raise_ambient_capabilities() -> Result<()> {
    let permitted = read_set(CapSet::Permitted, "capget")?;
    caps::set(None, CapSet::Inheritable, &permitted).map_err(|e| cap_failed("capset", &e))?;

    let sets = CapabilitySets::current()?;
    let last = cap_last_cap();
    for index in sets.effective_up_to(last) {
        let Some(cap) = capability(index) else {
            debug!(cap = index, "Capability unknown to caps, not raised");
            continue;
        };
        caps::raise(None, CapSet::Ambient, cap)
            .map_err(|e| cap_failed("prctl(PR_CAP_AMBIENT)", &e))?;
    }
    debug!(effective = sets.effective, last, "Raised ambient capabilities");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bisection_finds_boundary() {
        assert_eq!(bisect_last_cap(|cap| cap <= 40), 40);
        assert_eq!(bisect_last_cap(|cap| cap <= 63), 63);
        assert_eq!(bisect_last_cap(|cap| cap == 0), 0);
    }

    #[test]
    fn test_procfs_and_bisection_agree() {
        let probed = bisect_last_cap(is_valid_capability);
        if let Some(read) = last_cap_from_procfs(Path::new(CAP_LAST_CAP_PATH)) {
            assert_eq!(read, probed);
        }
        assert_eq!(cap_last_cap(), probed);
    }

    #[test]
    fn test_non_procfs_file_is_ignored() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"40\n").unwrap();
        assert_eq!(last_cap_from_procfs(file.path()), None);
    }

    #[test]
    fn test_capability_lookup_by_index() {
        assert_eq!(capability(0), Some(Capability::CAP_CHOWN));
        assert_eq!(capability(21), Some(Capability::CAP_SYS_ADMIN));
        assert_eq!(capability(200), None);
    }

    #[test]
    fn test_effective_up_to_respects_limit() {
        let sets = CapabilitySets {
            effective: 0b1011 | (1 << 40),
            ..CapabilitySets::default()
        };
        assert_eq!(sets.effective_up_to(63).collect::<Vec<_>>(), vec![0, 1, 3, 40]);
        assert_eq!(sets.effective_up_to(2).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_current_sets_are_consistent() {
        let sets = CapabilitySets::current().unwrap();
        // effective and ambient are always subsets of permitted
        assert_eq!(sets.effective & !sets.permitted, 0);
        assert_eq!(sets.ambient & !sets.permitted, 0);
    }
}
