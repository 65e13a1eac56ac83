//! Joining the cgroup v2 group of a target process
//!
//! The target's `cgroup.procs` is located and opened up front through
//! [`CgroupController`]; the caller is moved into it late through
//! [`CgroupJoiner`].

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod controller;
pub mod joiner;

pub use controller::{CgroupController, parse_cgroup_path};
pub use joiner::CgroupJoiner;
