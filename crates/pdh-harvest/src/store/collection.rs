//! Per-collection file store
//!
//! Each collection owns a self-contained directory
//! `<root>/<target>/<mission>/<host>/<instrument>/<dataset_id>/` holding
//! record pages, PDS3 catalog files, its STAC subtree and a quarantine
//! area. Pages are written through a temp sibling and an atomic rename so a
//! crash can never leave a partial page behind.

use crate::pds3::CatalogKind;
use pdh_common::{Fingerprint, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const RECORDS_DIR: &str = "records";
const PDS3_DIR: &str = "pds3";
const STAC_DIR: &str = "stac";
const QUARANTINE_DIR: &str = "quarantine";

/// Scoped deletion targets for [`CollectionStore::reset`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    /// Downloaded files (record pages, PDS3 catalogs, quarantine)
    Files,
    /// The collection's STAC subtree
    Stac,
    /// The whole collection directory
    Collection,
}

/// One PDS3 catalog file on disk, tagged with its recognized kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pds3File {
    pub kind: CatalogKind,
    pub path: PathBuf,
}

/// Handle on one collection's directory tree
#[derive(Debug, Clone)]
pub struct CollectionStore {
    fingerprint: Fingerprint,
    directory: PathBuf,
}

impl CollectionStore {
    /// Open the store for a collection, creating its directory
    pub fn open(root_dir: impl AsRef<Path>, fingerprint: &Fingerprint) -> Result<Self> {
        let directory = root_dir.as_ref().join(fingerprint.relative_dir());
        fs::create_dir_all(&directory)?;
        Ok(Self {
            fingerprint: fingerprint.clone(),
            directory,
        })
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn records_dir(&self) -> PathBuf {
        self.directory.join(RECORDS_DIR)
    }

    pub fn pds3_dir(&self) -> PathBuf {
        self.directory.join(PDS3_DIR)
    }

    pub fn stac_dir(&self) -> PathBuf {
        self.directory.join(STAC_DIR)
    }

    pub fn quarantine_dir(&self) -> PathBuf {
        self.directory.join(QUARANTINE_DIR)
    }

    /// Path of the human-readable failure report
    pub fn report_path(&self) -> PathBuf {
        self.stac_dir().join("report.txt")
    }

    // ------------------------------------------------------------------
    // Record pages
    // ------------------------------------------------------------------

    /// Deterministic page file name (zero-based, three digits)
    pub fn page_filename(index: usize) -> String {
        format!("page_{:03}.json", index)
    }

    pub fn page_path(&self, index: usize) -> PathBuf {
        self.records_dir().join(Self::page_filename(index))
    }

    pub fn has_page(&self, index: usize) -> bool {
        self.page_path(index).is_file()
    }

    /// Atomically persist one page; on failure the prior content is intact
    pub fn write_page(&self, index: usize, bytes: &[u8]) -> Result<()> {
        let path = self.page_path(index);
        fs::create_dir_all(self.records_dir())?;
        let tmp = path.with_extension("json.part");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn read_page(&self, index: usize) -> Result<Vec<u8>> {
        Ok(fs::read(self.page_path(index))?)
    }

    /// Page indices still missing out of `total_pages`; drives resumption
    pub fn list_missing_pages(&self, total_pages: usize) -> Vec<usize> {
        (0..total_pages).filter(|i| !self.has_page(*i)).collect()
    }

    /// Present pages sorted by index. Readers must not assume completion
    /// order, so the listing sorts regardless of directory order.
    pub fn list_pages(&self) -> Result<Vec<(usize, PathBuf)>> {
        let dir = self.records_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut pages = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(index) = name
                .strip_prefix("page_")
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(|digits| digits.parse::<usize>().ok())
            {
                pages.push((index, entry.path()));
            }
        }
        pages.sort_by_key(|(index, _)| *index);
        Ok(pages)
    }

    /// Move a malformed page under `quarantine/` and keep the bytes
    pub fn quarantine_page(&self, index: usize, reason: &str) -> Result<()> {
        let from = self.page_path(index);
        fs::create_dir_all(self.quarantine_dir())?;
        let to = self.quarantine_dir().join(Self::page_filename(index));
        fs::rename(&from, &to)?;
        warn!(
            collection = %self.fingerprint,
            page = index,
            reason,
            "Page quarantined"
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // PDS3 catalog files
    // ------------------------------------------------------------------

    pub fn pds3_path(&self, filename: &str) -> PathBuf {
        self.pds3_dir().join(filename.to_lowercase())
    }

    pub fn has_pds3(&self, filename: &str) -> bool {
        self.pds3_path(filename).is_file()
    }

    /// Atomically persist one catalog file under its upstream name
    pub fn write_pds3(&self, filename: &str, bytes: &[u8]) -> Result<()> {
        let path = self.pds3_path(filename);
        fs::create_dir_all(self.pds3_dir())?;
        let tmp = path.with_extension("part");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// All PDS3 files present, tagged with the catalog kind recognized from
    /// the filename. Files no grammar claims are skipped with a warning.
    pub fn list_pds3(&self) -> Result<Vec<Pds3File>> {
        let dir = self.pds3_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            match CatalogKind::from_filename(&name) {
                Some(kind) => files.push(Pds3File {
                    kind,
                    path: entry.path(),
                }),
                None => {
                    warn!(file = %name, "Unrecognized PDS3 catalog file, skipped");
                },
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    // ------------------------------------------------------------------
    // Reset
    // ------------------------------------------------------------------

    /// Scoped deletion; absent directories are fine
    pub fn reset(&self, scope: ResetScope) -> Result<()> {
        let targets: Vec<PathBuf> = match scope {
            ResetScope::Files => vec![
                self.records_dir(),
                self.pds3_dir(),
                self.quarantine_dir(),
            ],
            ResetScope::Stac => vec![self.stac_dir()],
            ResetScope::Collection => vec![self.directory.clone()],
        };
        for target in targets {
            if target.exists() {
                fs::remove_dir_all(&target)?;
                info!(path = %target.display(), "Removed");
            }
        }
        Ok(())
    }

    /// Total size in bytes of all record pages; used by extraction checks
    pub fn records_size(&self) -> Result<u64> {
        let mut total = 0u64;
        for (_, path) in self.list_pages()? {
            total += fs::metadata(&path)?.len();
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint() -> Fingerprint {
        Fingerprint::new("MARS", "MGS", "MGS", "MOLA", "MGS-M-MOLA-3-PEDR-L1A-V1.0")
    }

    #[test]
    fn test_page_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = CollectionStore::open(dir.path(), &fingerprint()).unwrap();

        assert!(!store.has_page(0));
        store.write_page(0, b"{\"a\":1}").unwrap();
        assert!(store.has_page(0));
        assert_eq!(store.read_page(0).unwrap(), b"{\"a\":1}");
        assert_eq!(CollectionStore::page_filename(0), "page_000.json");
        assert_eq!(CollectionStore::page_filename(42), "page_042.json");
    }

    #[test]
    fn test_list_missing_pages() {
        let dir = tempfile::tempdir().unwrap();
        let store = CollectionStore::open(dir.path(), &fingerprint()).unwrap();

        store.write_page(0, b"{}").unwrap();
        store.write_page(2, b"{}").unwrap();
        assert_eq!(store.list_missing_pages(4), vec![1, 3]);
        assert!(store.list_missing_pages(1).is_empty());
    }

    #[test]
    fn test_pages_sorted_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = CollectionStore::open(dir.path(), &fingerprint()).unwrap();

        store.write_page(10, b"{}").unwrap();
        store.write_page(2, b"{}").unwrap();
        store.write_page(7, b"{}").unwrap();
        let indices: Vec<usize> = store.list_pages().unwrap().into_iter().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![2, 7, 10]);
    }

    #[test]
    fn test_crash_between_temp_write_and_rename_preserves_prior_page() {
        let dir = tempfile::tempdir().unwrap();
        let store = CollectionStore::open(dir.path(), &fingerprint()).unwrap();

        store.write_page(0, b"first").unwrap();

        // Simulate a writer killed after staging the temp file
        let stranded = store.page_path(0).with_extension("json.part");
        fs::write(&stranded, b"second-but-never-committed").unwrap();

        assert_eq!(store.read_page(0).unwrap(), b"first");
        assert_eq!(store.list_missing_pages(1), Vec::<usize>::new());

        // A rerun overwrites the stranded temp and commits cleanly
        store.write_page(0, b"second").unwrap();
        assert_eq!(store.read_page(0).unwrap(), b"second");
    }

    #[test]
    fn test_quarantine_moves_page() {
        let dir = tempfile::tempdir().unwrap();
        let store = CollectionStore::open(dir.path(), &fingerprint()).unwrap();

        store.write_page(1, b"<html>not json</html>").unwrap();
        store.quarantine_page(1, "not JSON").unwrap();

        assert!(!store.has_page(1));
        assert!(store.quarantine_dir().join("page_001.json").is_file());
    }

    #[test]
    fn test_pds3_files_are_lowercased_and_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let store = CollectionStore::open(dir.path(), &fingerprint()).unwrap();

        store.write_pds3("MISSION.CAT", b"PDS_VERSION_ID = PDS3").unwrap();
        store.write_pds3("VOLDESC.CAT", b"PDS_VERSION_ID = PDS3").unwrap();

        let files = store.list_pds3().unwrap();
        assert_eq!(files.len(), 2);
        assert!(files
            .iter()
            .any(|f| f.kind == CatalogKind::Mission
                && f.path.file_name().unwrap() == "mission.cat"));
        assert!(files
            .iter()
            .any(|f| f.kind == CatalogKind::VolumeDescriptor));
    }

    #[test]
    fn test_reset_scopes() {
        let dir = tempfile::tempdir().unwrap();
        let store = CollectionStore::open(dir.path(), &fingerprint()).unwrap();

        store.write_page(0, b"{}").unwrap();
        store.write_pds3("mission.cat", b"x").unwrap();
        fs::create_dir_all(store.stac_dir()).unwrap();
        fs::write(store.stac_dir().join("collection.json"), b"{}").unwrap();

        store.reset(ResetScope::Files).unwrap();
        assert!(!store.records_dir().exists());
        assert!(!store.pds3_dir().exists());
        assert!(store.stac_dir().exists());

        store.reset(ResetScope::Stac).unwrap();
        assert!(!store.stac_dir().exists());

        store.reset(ResetScope::Collection).unwrap();
        assert!(!store.directory().exists());
    }
}
