//! Failure reporting
//!
//! One human-readable report per collection (category, count, first three
//! messages) under the collection's `stac/` directory, and one
//! machine-readable summary per phase at the root of the storage tree.
//! Per-collection failures never fail the phase; they end up here.

use crate::store::CollectionStore;
use pdh_common::{Fingerprint, HarvestError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Failure classes, mirroring the retry/continue policy of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Network failure that exhausted its retries
    TransientIo,
    /// Non-retriable HTTP failure
    PermanentIo,
    /// Upstream response the decoder rejected; file quarantined
    Malformed,
    /// PDS3 grammar rejection
    Parse,
    /// Disk-level failure
    Storage,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::TransientIo => "transient_io",
            ErrorCategory::PermanentIo => "permanent_io",
            ErrorCategory::Malformed => "malformed",
            ErrorCategory::Parse => "parse",
            ErrorCategory::Storage => "storage",
        }
    }

    /// Category for a pipeline error
    pub fn for_error(error: &HarvestError) -> Self {
        match error {
            HarvestError::Network { .. } => ErrorCategory::TransientIo,
            HarvestError::Malformed { .. } => ErrorCategory::Malformed,
            HarvestError::Parse { .. } => ErrorCategory::Parse,
            HarvestError::Io(_) => ErrorCategory::Storage,
            _ => ErrorCategory::PermanentIo,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub category: ErrorCategory,
    pub resource: String,
    pub message: String,
}

/// Failures collected while processing one collection
#[derive(Debug, Clone)]
pub struct CollectionReport {
    pub fingerprint: Fingerprint,
    pub entries: Vec<ReportEntry>,
}

impl CollectionReport {
    pub fn new(fingerprint: Fingerprint) -> Self {
        Self {
            fingerprint,
            entries: Vec::new(),
        }
    }

    pub fn add(
        &mut self,
        category: ErrorCategory,
        resource: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.entries.push(ReportEntry {
            category,
            resource: resource.into(),
            message: message.into(),
        });
    }

    pub fn add_error(&mut self, resource: impl Into<String>, error: &HarvestError) {
        self.add(ErrorCategory::for_error(error), resource, error.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Human-readable summary: per category, the count and the first
    /// three messages
    pub fn render(&self) -> String {
        let mut by_category: BTreeMap<ErrorCategory, Vec<&ReportEntry>> = BTreeMap::new();
        for entry in &self.entries {
            by_category.entry(entry.category).or_default().push(entry);
        }

        let mut out = format!("Failure report for {}\n\n", self.fingerprint);
        for (category, entries) in by_category {
            out.push_str(&format!("[{}] {} failure(s)\n", category, entries.len()));
            for entry in entries.iter().take(3) {
                out.push_str(&format!("  - {}: {}\n", entry.resource, entry.message));
            }
            out.push('\n');
        }
        out
    }

    /// Write `stac/report.txt`, or remove a stale one when this run had
    /// no failures
    pub fn write(&self, store: &CollectionStore) -> Result<()> {
        let path = store.report_path();
        if self.is_empty() {
            if path.exists() {
                fs::remove_file(&path)?;
            }
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, self.render())?;
        Ok(())
    }
}

/// Machine-readable per-phase summary written at the storage root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub phase: String,
    pub collections: usize,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<CollectionFailures>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionFailures {
    pub collection: String,
    pub entries: Vec<ReportEntry>,
}

impl PhaseSummary {
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            collections: 0,
            succeeded: 0,
            failed: 0,
            failures: Vec::new(),
        }
    }

    /// Fold one collection's report into the summary
    pub fn absorb(&mut self, report: &CollectionReport) {
        self.collections += 1;
        if report.is_empty() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
            self.failures.push(CollectionFailures {
                collection: report.fingerprint.to_string(),
                entries: report.entries.clone(),
            });
        }
    }

    pub fn write(&self, root_dir: &Path) -> Result<()> {
        fs::create_dir_all(root_dir)?;
        let path = root_dir.join(format!("summary_{}.json", self.phase));
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint() -> Fingerprint {
        Fingerprint::new("MARS", "MGS", "MGS", "MOLA", "MGS-M-MOLA-3-PEDR-L1A-V1.0")
    }

    #[test]
    fn test_render_groups_and_truncates() {
        let mut report = CollectionReport::new(fingerprint());
        for index in 0..5 {
            report.add(
                ErrorCategory::Malformed,
                format!("page_{:03}.json", index),
                "not JSON",
            );
        }
        report.add(ErrorCategory::Parse, "mission.cat", "unclosed OBJECT");

        let rendered = report.render();
        assert!(rendered.contains("[malformed] 5 failure(s)"));
        assert!(rendered.contains("[parse] 1 failure(s)"));
        // Only the first three malformed messages survive
        assert!(rendered.contains("page_000.json"));
        assert!(rendered.contains("page_002.json"));
        assert!(!rendered.contains("page_003.json"));
    }

    #[test]
    fn test_write_and_clear_report() {
        let dir = tempfile::tempdir().unwrap();
        let store = CollectionStore::open(dir.path(), &fingerprint()).unwrap();

        let mut report = CollectionReport::new(fingerprint());
        report.add(ErrorCategory::Parse, "mission.cat", "bad");
        report.write(&store).unwrap();
        assert!(store.report_path().is_file());

        // A clean rerun removes the stale report
        let clean = CollectionReport::new(fingerprint());
        clean.write(&store).unwrap();
        assert!(!store.report_path().exists());
    }

    #[test]
    fn test_phase_summary() {
        let dir = tempfile::tempdir().unwrap();

        let mut summary = PhaseSummary::new("transform_records");
        let clean = CollectionReport::new(fingerprint());
        let mut dirty = CollectionReport::new(fingerprint());
        dirty.add(ErrorCategory::Storage, "stac", "disk full");

        summary.absorb(&clean);
        summary.absorb(&dirty);
        summary.write(dir.path()).unwrap();

        let content =
            std::fs::read_to_string(dir.path().join("summary_transform_records.json")).unwrap();
        let back: PhaseSummary = serde_json::from_str(&content).unwrap();
        assert_eq!(back.collections, 2);
        assert_eq!(back.succeeded, 1);
        assert_eq!(back.failed, 1);
    }

    #[test]
    fn test_category_for_error() {
        assert_eq!(
            ErrorCategory::for_error(&HarvestError::network("u", "r")),
            ErrorCategory::TransientIo
        );
        assert_eq!(
            ErrorCategory::for_error(&HarvestError::malformed("f", "r")),
            ErrorCategory::Malformed
        );
        assert_eq!(
            ErrorCategory::for_error(&HarvestError::parse("f", 1, 1, "r")),
            ErrorCategory::Parse
        );
    }
}
