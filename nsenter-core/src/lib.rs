//! nsenter Core - Foundation types, errors, and utilities
//!
//! This crate provides the core abstractions shared by the namespace,
//! cgroup, security, and CLI crates.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod constants;
pub mod error;
pub mod io;
pub mod types;

pub use error::{Error, Result};
pub use types::{IdSource, ProcessId};
