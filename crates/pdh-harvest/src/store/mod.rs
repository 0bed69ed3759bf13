//! On-disk stores
//!
//! Two stores back the pipeline: the registry store (a keyed table of
//! collection descriptors) and the file store (one self-contained directory
//! tree per collection). The storage layer owns all persistent state;
//! every other component holds only transient in-memory views.

pub mod collection;
pub mod registry;

pub use collection::{CollectionStore, Pds3File, ResetScope};
pub use registry::RegistryStore;
