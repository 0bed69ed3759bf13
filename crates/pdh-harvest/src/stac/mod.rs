//! STAC transformation
//!
//! Builds and merges the STAC tree (root → mission → instrument host →
//! instrument → collection → items) from ODE records and parsed PDS3
//! catalogs. Parent catalogs are deduplicated across collections by their
//! deterministic identifiers; links are regenerated on every write so
//! reruns are idempotent.

pub mod catalogs;
pub mod ids;
pub mod models;
pub mod records;
pub mod tree;

pub use catalogs::transform_pds3;
pub use records::transform_records;
pub use tree::StacTree;
