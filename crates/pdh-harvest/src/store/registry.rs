//! Registry store: keyed table of collection descriptors
//!
//! Backed by a single JSON document at `<root>/registry.json`. Writes go
//! through a temp sibling and an atomic rename so a prior snapshot is never
//! corrupted; a `registry.lock` lock file serializes writers. Readers never
//! take the lock and always see the last complete snapshot.

use crate::ode::models::CollectionDescriptor;
use pdh_common::{Fingerprint, HarvestError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const REGISTRY_FILE: &str = "registry.json";
const LOCK_FILE: &str = "registry.lock";

/// Serialized registry document
#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryDocument {
    version: u32,
    /// Descriptors keyed by fingerprint key; BTreeMap keeps output stable
    collections: BTreeMap<String, CollectionDescriptor>,
}

/// Exclusive writer lock held for the duration of a registry mutation
struct RegistryLock {
    path: PathBuf,
}

impl RegistryLock {
    fn acquire(path: PathBuf) -> Result<Self> {
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(HarvestError::RegistryLocked {
                    path: path.display().to_string(),
                })
            },
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %err, "Failed to remove registry lock");
        }
    }
}

/// Registry of discovered collections
pub struct RegistryStore {
    root_dir: PathBuf,
}

impl RegistryStore {
    /// Open (and create if needed) the registry under the storage root
    pub fn open(root_dir: impl AsRef<Path>) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        fs::create_dir_all(&root_dir)?;
        Ok(Self { root_dir })
    }

    pub fn path(&self) -> PathBuf {
        self.root_dir.join(REGISTRY_FILE)
    }

    fn lock_path(&self) -> PathBuf {
        self.root_dir.join(LOCK_FILE)
    }

    fn load_document(&self) -> Result<RegistryDocument> {
        let path = self.path();
        if !path.exists() {
            return Ok(RegistryDocument {
                version: 1,
                collections: BTreeMap::new(),
            });
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn store_document(&self, document: &RegistryDocument) -> Result<()> {
        let path = self.path();
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(document)?;
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Insert-or-replace one descriptor
    pub fn upsert(&self, descriptor: &CollectionDescriptor) -> Result<()> {
        self.upsert_all(std::slice::from_ref(descriptor))
    }

    /// Insert-or-replace a batch of descriptors under one lock
    pub fn upsert_all(&self, descriptors: &[CollectionDescriptor]) -> Result<()> {
        if descriptors.is_empty() {
            return Ok(());
        }
        let _lock = RegistryLock::acquire(self.lock_path())?;
        let mut document = self.load_document()?;

        let mut inserted = 0usize;
        let mut replaced = 0usize;
        for descriptor in descriptors {
            let key = descriptor.fingerprint().key();
            match document.collections.insert(key, descriptor.clone()) {
                Some(previous) if &previous != descriptor => replaced += 1,
                Some(_) => {},
                None => inserted += 1,
            }
        }
        self.store_document(&document)?;
        info!(
            inserted,
            replaced,
            total = document.collections.len(),
            "Registry updated"
        );
        Ok(())
    }

    /// All descriptors, optionally filtered by target body (case-insensitive)
    pub fn iter(
        &self,
        target: Option<&str>,
    ) -> Result<impl Iterator<Item = CollectionDescriptor>> {
        let document = self.load_document()?;
        let filter = target.map(str::to_lowercase);
        Ok(document
            .collections
            .into_values()
            .filter(move |descriptor| match &filter {
                Some(target) => descriptor.ode_meta_db.to_lowercase() == *target,
                None => true,
            }))
    }

    /// Look up one descriptor by dataset id (case-insensitive)
    pub fn find_by_dataset_id(&self, dataset_id: &str) -> Result<Option<CollectionDescriptor>> {
        let wanted = dataset_id.to_uppercase();
        Ok(self
            .iter(None)?
            .find(|descriptor| descriptor.dataset_id.to_uppercase() == wanted))
    }

    /// Look up one descriptor by its full fingerprint
    pub fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CollectionDescriptor>> {
        let document = self.load_document()?;
        Ok(document.collections.get(&fingerprint.key()).cloned())
    }

    /// Number of registered collections
    pub fn len(&self) -> Result<usize> {
        Ok(self.load_document()?.collections.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Break a stale lock left behind by a crashed writer
    pub fn break_stale_lock(&self) -> Result<bool> {
        let lock = self.lock_path();
        if lock.exists() {
            debug!(path = %lock.display(), "Breaking stale registry lock");
            fs::remove_file(&lock)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
