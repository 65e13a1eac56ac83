//! Entering the namespaces of another process
//!
//! This crate resolves which namespaces to enter and enters them:
//! - [`kind`] - the eight namespace kinds, in entry order
//! - [`registry`] - one entry per kind, with its descriptor
//! - [`resolver`] - opening namespace files, pidfds and derived namespaces
//! - [`sequencer`] - two-phase `setns(2)`
//! - [`directory`], [`environ`] - root, working directory and environment
//! - [`relay`], [`executor`] - optional fork, then exec

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod directory;
pub mod environ;
pub mod executor;
pub mod kind;
pub mod plan;
pub mod procfs;
pub mod registry;
pub mod relay;
pub mod resolver;
pub mod sequencer;
mod sys;

pub use directory::DirectorySwitch;
pub use executor::exec_program;
pub use kind::{NamespaceKind, NamespaceMask};
pub use plan::{DirSource, EnterOptions, ForkMode, NamespacePlan};
pub use procfs::{NamespaceIdentity, ProcFs};
pub use registry::{NamespaceEntry, NamespaceRegistry};
pub use relay::{ChildExit, ChildSupervisor, Continuation};
pub use resolver::{NamespaceResolver, is_usable_namespace};
pub use sequencer::{EntrySequencer, EntryState};
