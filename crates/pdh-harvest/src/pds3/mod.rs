//! Grammar-driven parser for PDS3 catalog objects
//!
//! Eight classes of human-edited, loosely specified ODL-like text files are
//! turned into typed variants. The layers:
//!
//! - `lex`: tokens with line/column positions, comment handling, quoted
//!   multi-line strings
//! - `ast`: the shared property grammar (key = value) and the generic
//!   `OBJECT … END_OBJECT` block reader
//! - `dates`: the date/datetime sub-grammar shared by all files
//! - `grammar`: per-kind sub-object rules (cardinalities, aliases) and
//!   their enforcement
//! - `models`: the eight typed variants with their STAC projections and an
//!   ODL writer for round-trip testing
//! - `factory`: filename heuristic and root-object fallback selecting the
//!   grammar to apply

pub mod ast;
pub mod dates;
pub mod factory;
pub mod grammar;
pub mod lex;
pub mod models;

pub use ast::{ObjectBlock, ParseError, Value};
pub use factory::{parse_auto, parse_str, CatalogKind};
pub use models::Pds3Catalog;
