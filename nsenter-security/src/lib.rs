//! Credentials and capabilities for the entered process
//!
//! This crate provides:
//! - uid/gid/supplementary group changes, with target-following ids
//! - propagation of permitted capabilities into the ambient set

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod capabilities;
pub mod credentials;

pub use capabilities::{CapabilitySets, cap_last_cap, raise_ambient_capabilities};
pub use credentials::CredentialPlan;
