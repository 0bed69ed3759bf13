//! ODE web service extraction
//!
//! Two halves: `discovery` queries the iipt endpoint for georeferenced
//! collections and writes descriptors through to the registry store;
//! `records` enumerates paginated product listings for one collection and
//! persists the raw pages into the file store.

pub mod discovery;
pub mod models;
pub mod records;

pub use discovery::Discovery;
pub use models::{CollectionDescriptor, ProductFile, Record};
pub use records::RecordsExtractor;
