//! ETL core for harvesting planetary data descriptions into a STAC tree.
//!
//! The pipeline extracts collection and record metadata from the ODE web
//! service, scrapes PDS3 catalog objects from the archive website, parses
//! them into typed models, and materializes everything as a STAC 1.0 tree
//! on local storage.
//!
//! # Architecture
//!
//! - **config**: explicit context object threaded through all phases
//! - **store**: registry store (collection descriptors) + per-collection
//!   file store (record pages, PDS3 files, STAC tree)
//! - **fetch**: bounded-concurrency HTTP downloader with retry and resume
//! - **ode**: discovery of georeferenced collections and paginated record
//!   extraction from the ODE web service
//! - **website**: volume-index scraping for PDS3 catalog files
//! - **pds3**: grammar-driven parser for the eight PDS3 catalog classes
//! - **stac**: STAC models and the records/catalogs transformers
//! - **etl**: phase driver
//! - **report**: per-collection failure reports and phase summaries

pub mod config;
pub mod etl;
pub mod fetch;
pub mod ode;
pub mod pds3;
pub mod report;
pub mod stac;
pub mod store;
pub mod website;

pub use config::{HarvestConfig, HttpConfig};
pub use etl::{HarvestEtl, Selection};
pub use pdh_common::{Fingerprint, HarvestError, Result};
