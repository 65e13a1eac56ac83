//! Fixed-order table of namespace entries

use std::fs::File;
use std::io;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::path::Path;

use tracing::debug;

use crate::kind::{NamespaceKind, NamespaceMask};

/// One namespace the invocation may enter
///
/// When `enabled` is false the entry holds no descriptor.
#[derive(Debug)]
pub struct NamespaceEntry {
    kind: NamespaceKind,
    fd: Option<OwnedFd>,
    enabled: bool,
}

impl NamespaceEntry {
    const fn new(kind: NamespaceKind) -> Self {
        Self {
            kind,
            fd: None,
            enabled: false,
        }
    }

    /// Namespace kind
    #[must_use]
    pub const fn kind(&self) -> NamespaceKind {
        self.kind
    }

    /// Path relative to `/proc/<pid>/`
    #[must_use]
    pub const fn proc_name(&self) -> &'static str {
        self.kind.proc_name()
    }

    /// Whether this namespace is still to be entered
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Open descriptor, if resolved
    #[must_use]
    pub fn fd(&self) -> Option<BorrowedFd<'_>> {
        self.fd.as_ref().map(AsFd::as_fd)
    }

    /// Whether a descriptor is held
    #[must_use]
    pub const fn has_fd(&self) -> bool {
        self.fd.is_some()
    }

    /// Install `fd`, closing any previous one, and enable the entry
    pub fn install(&mut self, fd: OwnedFd) {
        self.fd = Some(fd);
        self.enabled = true;
    }

    /// Enable without a descriptor; it is resolved against the target later
    pub fn mark_enabled(&mut self) {
        self.enabled = true;
    }

    /// Close the descriptor and disable
    pub fn disable(&mut self) {
        self.fd = None;
        self.enabled = false;
    }
}

/// Table with exactly one entry per [`NamespaceKind`], in table order
#[derive(Debug)]
pub struct NamespaceRegistry {
    entries: [NamespaceEntry; NamespaceKind::ALL.len()],
}

impl Default for NamespaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceRegistry {
    /// Create a registry with every entry disabled
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: NamespaceKind::ALL.map(NamespaceEntry::new),
        }
    }

    /// Entry for `kind`
    #[must_use]
    pub fn entry(&self, kind: NamespaceKind) -> &NamespaceEntry {
        &self.entries[kind.index()]
    }

    /// Mutable entry for `kind`
    pub fn entry_mut(&mut self, kind: NamespaceKind) -> &mut NamespaceEntry {
        &mut self.entries[kind.index()]
    }

    /// Enable `kind`, opening `path` read-only if given
    ///
    /// # Errors
    /// Returns the open error (typically `NotFound`) if `path` cannot be
    /// opened; the entry is left unchanged.
    pub fn enable(&mut self, kind: NamespaceKind, path: Option<&Path>) -> io::Result<()> {
        let entry = self.entry_mut(kind);
        match path {
            Some(path) => {
                let file = File::open(path).map_err(|e| {
                    io::Error::new(e.kind(), format!("cannot open {}: {e}", path.display()))
                })?;
                debug!(namespace = %kind, path = %path.display(), "Opened namespace file");
                entry.install(OwnedFd::from(file));
            }
            None => entry.mark_enabled(),
        }
        Ok(())
    }

    /// Close any descriptor of `kind` and disable it
    pub fn disable(&mut self, kind: NamespaceKind) {
        self.entry_mut(kind).disable();
    }

    /// Disable every enabled entry in `mask`
    pub fn disable_mask(&mut self, mask: NamespaceMask) {
        for entry in &mut self.entries {
            if entry.enabled && mask.contains(entry.kind) {
                entry.disable();
            }
        }
    }

    /// Entries whose kind is in `mask` (empty mask: all kinds), optionally
    /// only the enabled ones
    pub fn iter(
        &self,
        mask: NamespaceMask,
        enabled_only: bool,
    ) -> impl Iterator<Item = &NamespaceEntry> + Clone {
        self.entries.iter().filter(move |entry| {
            (mask.is_empty() || mask.contains(entry.kind)) && (!enabled_only || entry.enabled)
        })
    }

    /// OR of the kinds [`Self::iter`] would yield over all kinds
    #[must_use]
    pub fn mask_of(&self, enabled_only: bool) -> NamespaceMask {
        self.iter(NamespaceMask::NONE, enabled_only)
            .map(NamespaceEntry::kind)
            .collect()
    }

    /// Enabled kinds that still have no descriptor
    #[must_use]
    pub fn mask_without_fd(&self) -> NamespaceMask {
        self.iter(NamespaceMask::NONE, true)
            .filter(|entry| !entry.has_fd())
            .map(NamespaceEntry::kind)
            .collect()
    }
}
