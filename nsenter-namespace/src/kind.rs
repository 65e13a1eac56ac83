//! Namespace kinds and masks

use serde::{Deserialize, Serialize};
use std::fmt;

/// A Linux namespace type that can be entered with `setns(2)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceKind {
    /// User namespace
    User,
    /// Cgroup namespace
    Cgroup,
    /// IPC namespace
    Ipc,
    /// UTS namespace (hostname)
    Uts,
    /// Network namespace
    Net,
    /// PID namespace
    Pid,
    /// Mount namespace
    Mount,
    /// Time namespace
    Time,
}

impl NamespaceKind {
    /// Every kind, in the order namespaces are opened and considered.
    ///
    /// This is not the order they are entered in; see the sequencer.
    pub const ALL: [Self; 8] = [
        Self::User,
        Self::Cgroup,
        Self::Ipc,
        Self::Uts,
        Self::Net,
        Self::Pid,
        Self::Mount,
        Self::Time,
    ];

    /// `CLONE_NEW*` bit for this kind
    #[must_use]
    pub const fn clone_flag(self) -> i32 {
        match self {
            Self::User => libc::CLONE_NEWUSER,
            Self::Cgroup => libc::CLONE_NEWCGROUP,
            Self::Ipc => libc::CLONE_NEWIPC,
            Self::Uts => libc::CLONE_NEWUTS,
            Self::Net => libc::CLONE_NEWNET,
            Self::Pid => libc::CLONE_NEWPID,
            Self::Mount => libc::CLONE_NEWNS,
            Self::Time => libc::CLONE_NEWTIME,
        }
    }

    /// Path of this namespace relative to `/proc/<pid>/`
    #[must_use]
    pub const fn proc_name(self) -> &'static str {
        match self {
            Self::User => "ns/user",
            Self::Cgroup => "ns/cgroup",
            Self::Ipc => "ns/ipc",
            Self::Uts => "ns/uts",
            Self::Net => "ns/net",
            Self::Pid => "ns/pid",
            Self::Mount => "ns/mnt",
            Self::Time => "ns/time",
        }
    }

    /// Short name as used by the kernel (`mnt`, `net`, ...)
    #[must_use]
    pub fn short_name(self) -> &'static str {
        self.proc_name().trim_start_matches("ns/")
    }

    /// Position in [`Self::ALL`]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Mask containing only this kind
    #[must_use]
    pub const fn mask(self) -> NamespaceMask {
        NamespaceMask(self.clone_flag())
    }
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Set of namespace kinds as a `CLONE_NEW*` bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceMask(i32);

impl NamespaceMask {
    /// No namespaces
    pub const NONE: Self = Self(0);

    /// Every known namespace
    #[must_use]
    pub fn all() -> Self {
        NamespaceKind::ALL.into_iter().collect()
    }

    /// Create from raw `CLONE_NEW*` bits
    #[must_use]
    pub const fn from_bits(bits: i32) -> Self {
        Self(bits)
    }

    /// Get raw value
    #[must_use]
    pub const fn bits(self) -> i32 {
        self.0
    }

    /// Check if no kind is set
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Check if `kind` is set
    #[must_use]
    pub const fn contains(self, kind: NamespaceKind) -> bool {
        self.0 & kind.clone_flag() != 0
    }

    /// Check if any kind of `other` is set
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// This mask with `kind` removed
    #[must_use]
    pub const fn without(self, kind: NamespaceKind) -> Self {
        Self(self.0 & !kind.clone_flag())
    }

    /// Kinds in this mask, in [`NamespaceKind::ALL`] order
    pub fn kinds(self) -> impl Iterator<Item = NamespaceKind> + Clone {
        NamespaceKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

impl std::ops::BitOr for NamespaceMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for NamespaceMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for NamespaceMask {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl From<NamespaceKind> for NamespaceMask {
    fn from(kind: NamespaceKind) -> Self {
        kind.mask()
    }
}

impl FromIterator<NamespaceKind> for NamespaceMask {
    fn from_iter<I: IntoIterator<Item = NamespaceKind>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, |acc, kind| acc | kind.mask())
    }
}

impl fmt::Display for NamespaceMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.kinds().map(NamespaceKind::short_name).collect();
        f.write_str(&names.join("+"))
    }
}
