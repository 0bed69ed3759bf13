//! Shared foundation for the PDS harvest pipeline.
//!
//! This crate provides the pieces every other crate in the workspace needs:
//! the common error type, logging initialization, checksum helpers and the
//! collection fingerprint that all storage keys derive from.

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

pub use error::{HarvestError, Result};
pub use types::{ChecksumAlgorithm, Fingerprint};
