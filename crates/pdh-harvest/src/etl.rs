//! ETL driver
//!
//! Coordinates the phases in the order discover → extract_records →
//! extract_pds3 → transform_pds3 → transform_records. The driver keeps no
//! state of its own; phase idempotence comes from the storage layer.
//! Per-collection failures are reported and the driver continues with the
//! next collection; only fatal configuration errors abort a phase.

use crate::config::HarvestConfig;
use crate::fetch::Fetcher;
use crate::ode::discovery::Discovery;
use crate::ode::models::CollectionDescriptor;
use crate::ode::records::{self, RecordsExtractor};
use crate::report::{CollectionReport, ErrorCategory, PhaseSummary};
use crate::stac::{self, StacTree};
use crate::store::{CollectionStore, RegistryStore, ResetScope};
use crate::website::WebsiteExtractor;
use pdh_common::{Fingerprint, HarvestError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Which collections a phase operates on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every registered collection (optionally planet-filtered)
    All,
    /// One collection by its dataset id
    Dataset(String),
}

impl Selection {
    pub fn from_dataset_id(dataset_id: Option<&str>) -> Self {
        match dataset_id {
            Some(id) => Selection::Dataset(id.to_string()),
            None => Selection::All,
        }
    }
}

/// Extraction completeness for one collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckEntry {
    pub collection: String,
    pub total_pages: usize,
    pub missing_pages: Vec<usize>,
    pub pds3_files: usize,
    pub has_collection_document: bool,
}

/// `check_extract` result over the selected collections
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckReport {
    pub entries: Vec<CheckEntry>,
}

impl CheckReport {
    pub fn missing_page_total(&self) -> usize {
        self.entries.iter().map(|e| e.missing_pages.len()).sum()
    }

    /// Collections present in the registry but absent from the STAC tree
    pub fn untransformed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !e.has_collection_document)
            .count()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&format!(
                "{}: {}/{} pages, {} PDS3 file(s), STAC {}\n",
                entry.collection,
                entry.total_pages - entry.missing_pages.len(),
                entry.total_pages,
                entry.pds3_files,
                if entry.has_collection_document {
                    "present"
                } else {
                    "absent"
                },
            ));
            if !entry.missing_pages.is_empty() {
                out.push_str(&format!("  missing pages: {:?}\n", entry.missing_pages));
            }
        }
        out.push_str(&format!(
            "Total: {} collection(s), {} missing page(s), {} not transformed\n",
            self.entries.len(),
            self.missing_page_total(),
            self.untransformed(),
        ));
        out
    }
}

/// The pipeline driver. Owns the configuration context; all persistent
/// state lives in the stores.
pub struct HarvestEtl {
    config: HarvestConfig,
    registry: RegistryStore,
    tree: StacTree,
    cancel: Arc<AtomicBool>,
}

impl HarvestEtl {
    pub fn new(config: HarvestConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|message| HarvestError::config(message, "adjust the harvest configuration"))?;
        let registry = RegistryStore::open(&config.root_dir)?;
        let tree = StacTree::new(&config.root_dir);
        Ok(Self {
            config,
            registry,
            tree,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn registry(&self) -> &RegistryStore {
        &self.registry
    }

    /// Cooperative cancellation: the fetcher finishes in-flight downloads
    /// to a safe boundary and returns
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn fetcher(&self) -> Result<Fetcher> {
        Ok(Fetcher::new(&self.config.http)?.with_cancel_flag(self.cancel.clone()))
    }

    fn store_for(&self, fingerprint: &Fingerprint) -> Result<CollectionStore> {
        CollectionStore::open(&self.config.root_dir, fingerprint)
    }

    /// Selected collections, loaded from the registry
    pub fn select(
        &self,
        planet: Option<&str>,
        selection: &Selection,
    ) -> Result<Vec<CollectionDescriptor>> {
        let descriptors: Vec<_> = self.registry.iter(planet)?.collect();
        match selection {
            Selection::All => Ok(descriptors),
            Selection::Dataset(dataset_id) => {
                let wanted = dataset_id.to_uppercase();
                let matched: Vec<_> = descriptors
                    .into_iter()
                    .filter(|d| d.dataset_id.to_uppercase() == wanted)
                    .collect();
                if matched.is_empty() {
                    return Err(HarvestError::collection_not_found(
                        self.registry.path().display().to_string(),
                        dataset_id.clone(),
                    ));
                }
                Ok(matched)
            },
        }
    }

    // ------------------------------------------------------------------
    // Extract phases
    // ------------------------------------------------------------------

    /// Query the discovery endpoint; optionally persist the descriptors
    pub async fn discover(
        &self,
        planet: Option<&str>,
        dataset_id: Option<&str>,
        save: bool,
    ) -> Result<Vec<CollectionDescriptor>> {
        let discovery = Discovery::new(&self.config)?;
        if save {
            discovery
                .discover_and_save(planet, dataset_id, &self.registry)
                .await
        } else {
            discovery.discover(planet, dataset_id).await
        }
    }

    /// Download the missing record pages for the selected collections
    pub async fn extract_records(
        &self,
        planet: Option<&str>,
        selection: &Selection,
    ) -> Result<PhaseSummary> {
        let descriptors = self.select(planet, selection)?;
        let fetcher = self.fetcher()?;
        let extractor = RecordsExtractor::new(&self.config);
        let mut summary = PhaseSummary::new("extract_records");

        for descriptor in descriptors {
            if self.is_cancelled() {
                warn!("Extraction cancelled");
                break;
            }
            let fingerprint = descriptor.fingerprint();
            let mut report = CollectionReport::new(fingerprint.clone());

            match self.store_for(&fingerprint) {
                Ok(store) => {
                    match extractor
                        .extract(&fetcher, &descriptor, &store, self.config.sample_pages)
                        .await
                    {
                        Ok(outcome) => {
                            for (url, reason) in &outcome.failed {
                                report.add(ErrorCategory::TransientIo, url.clone(), reason.clone());
                            }
                        },
                        Err(err) => report.add_error(fingerprint.to_string(), &err),
                    }
                },
                Err(err) => {
                    error!(collection = %fingerprint, error = %err, "Storage failure");
                    report.add_error(fingerprint.to_string(), &err);
                },
            }
            summary.absorb(&report);
        }

        summary.write(&self.config.root_dir)?;
        Ok(summary)
    }

    /// Scrape and download the PDS3 catalog files for the selected
    /// collections. Requires at least one record page per collection (the
    /// volume id comes from a record).
    pub async fn extract_pds3(
        &self,
        planet: Option<&str>,
        selection: &Selection,
    ) -> Result<PhaseSummary> {
        let descriptors = self.select(planet, selection)?;
        let fetcher = self.fetcher()?;
        let website = WebsiteExtractor::new(&self.config)?;
        let mut summary = PhaseSummary::new("extract_pds3");

        for descriptor in descriptors {
            if self.is_cancelled() {
                warn!("Extraction cancelled");
                break;
            }
            let fingerprint = descriptor.fingerprint();
            let mut report = CollectionReport::new(fingerprint.clone());

            if let Err(err) = self
                .extract_pds3_for(&website, &fetcher, &descriptor, &mut report)
                .await
            {
                report.add_error(fingerprint.to_string(), &err);
            }
            summary.absorb(&report);
        }

        summary.write(&self.config.root_dir)?;
        Ok(summary)
    }

    async fn extract_pds3_for(
        &self,
        website: &WebsiteExtractor,
        fetcher: &Fetcher,
        descriptor: &CollectionDescriptor,
        report: &mut CollectionReport,
    ) -> Result<()> {
        let fingerprint = descriptor.fingerprint();
        let store = self.store_for(&fingerprint)?;

        let Some(record) = records::first_record(&store)? else {
            report.add(
                ErrorCategory::Malformed,
                fingerprint.to_string(),
                "no record page extracted yet; run extract --type_extract ode_records first",
            );
            return Ok(());
        };

        let targets = website.discover_catalogs(descriptor, &record).await?;
        let requests = website.plan_downloads(&store, &targets);
        let outcome = fetcher.fetch_all(requests, None).await;
        for (url, reason) in &outcome.failed {
            report.add(ErrorCategory::TransientIo, url.clone(), reason.clone());
        }
        info!(
            collection = %fingerprint,
            catalogs = outcome.completed.len(),
            skipped = outcome.skipped,
            "PDS3 catalog files extracted"
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Transform phases
    // ------------------------------------------------------------------

    /// Convert stored record pages into STAC items and shallow parents
    pub fn transform_records(
        &self,
        planet: Option<&str>,
        selection: &Selection,
    ) -> Result<PhaseSummary> {
        let descriptors = self.select(planet, selection)?;
        let mut summary = PhaseSummary::new("transform_records");

        for descriptor in descriptors {
            let fingerprint = descriptor.fingerprint();
            let mut report = CollectionReport::new(fingerprint.clone());

            let result = self.store_for(&fingerprint).and_then(|store| {
                let outcome =
                    stac::transform_records(&descriptor, &store, &self.tree, &mut report)?;
                report.write(&store)?;
                Ok(outcome)
            });
            if let Err(err) = result {
                // Storage errors are fatal for this collection only
                error!(collection = %fingerprint, error = %err, "Transform failed");
                report.add_error(fingerprint.to_string(), &err);
            }
            summary.absorb(&report);
        }

        summary.write(&self.config.root_dir)?;
        Ok(summary)
    }

    /// Enrich parent catalogs and collection documents from PDS3 objects
    pub fn transform_pds3(
        &self,
        planet: Option<&str>,
        selection: &Selection,
    ) -> Result<PhaseSummary> {
        let descriptors = self.select(planet, selection)?;
        let mut summary = PhaseSummary::new("transform_pds3");

        for descriptor in descriptors {
            let fingerprint = descriptor.fingerprint();
            let mut report = CollectionReport::new(fingerprint.clone());

            let result = self.store_for(&fingerprint).and_then(|store| {
                let outcome = stac::transform_pds3(&descriptor, &store, &self.tree, &mut report)?;
                report.write(&store)?;
                Ok(outcome)
            });
            if let Err(err) = result {
                error!(collection = %fingerprint, error = %err, "Enrichment failed");
                report.add_error(fingerprint.to_string(), &err);
            }
            summary.absorb(&report);
        }

        summary.write(&self.config.root_dir)?;
        Ok(summary)
    }

    // ------------------------------------------------------------------
    // Checks and maintenance
    // ------------------------------------------------------------------

    /// Report missing pages and PDS3 files per collection
    pub fn check_extract(
        &self,
        planet: Option<&str>,
        selection: &Selection,
    ) -> Result<CheckReport> {
        let descriptors = self.select(planet, selection)?;
        let extractor = RecordsExtractor::new(&self.config);
        let mut check = CheckReport::default();

        for descriptor in descriptors {
            let fingerprint = descriptor.fingerprint();
            let store = self.store_for(&fingerprint)?;
            let total_pages = extractor.page_count(&descriptor, self.config.sample_pages);
            check.entries.push(CheckEntry {
                collection: fingerprint.to_string(),
                total_pages,
                missing_pages: store.list_missing_pages(total_pages),
                pds3_files: store.list_pds3()?.len(),
                has_collection_document: store.stac_dir().join("collection.json").is_file(),
            });
        }
        Ok(check)
    }

    /// Scoped deletion across the tree
    pub fn reset(&self, scope: ResetScope, planet: Option<&str>) -> Result<()> {
        match scope {
            ResetScope::Stac => {
                self.tree.reset()?;
                for descriptor in self.registry.iter(planet)? {
                    self.store_for(&descriptor.fingerprint())?
                        .reset(ResetScope::Stac)?;
                }
            },
            ResetScope::Files | ResetScope::Collection => {
                for descriptor in self.registry.iter(planet)? {
                    self.store_for(&descriptor.fingerprint())?.reset(scope)?;
                }
            },
        }
        Ok(())
    }

    /// Remove one collection's directory so the next run reharvests it
    pub fn reset_collection(&self, dataset_id: &str) -> Result<()> {
        let descriptors = self.select(None, &Selection::Dataset(dataset_id.to_string()))?;
        for descriptor in descriptors {
            self.store_for(&descriptor.fingerprint())?
                .reset(ResetScope::Collection)?;
        }
        Ok(())
    }
}
