//! Paginated record extraction for one collection
//!
//! The page count derives from the descriptor's product count; only the
//! pages missing from the file store are fetched, which is what makes the
//! extraction resumable. Raw JSON responses are persisted verbatim; they
//! are only decoded at transform time.

use crate::config::HarvestConfig;
use crate::fetch::{FetchOutcome, FetchRequest, Fetcher, RequestClass};
use crate::ode::models::{self, CollectionDescriptor, Record};
use crate::store::CollectionStore;
use pdh_common::{HarvestError, Result};
use reqwest::Url;
use tracing::{debug, info};

/// Extracts record pages from the ODE product query
pub struct RecordsExtractor {
    config: HarvestConfig,
}

impl RecordsExtractor {
    pub fn new(config: &HarvestConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Records query URL for one page. ODE offsets are 1-based.
    pub fn records_url(
        &self,
        descriptor: &CollectionDescriptor,
        page_index: usize,
    ) -> Result<Url> {
        let offset = 1 + page_index * self.config.page_size;
        let mut url = Url::parse(&self.config.ode_service_url)
            .map_err(|err| HarvestError::config(err.to_string(), "check ode_service_url"))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("query", "product");
            query.append_pair("target", &descriptor.ode_meta_db.to_lowercase());
            query.append_pair("results", "copmf");
            query.append_pair("ihid", &descriptor.ihid);
            query.append_pair("iid", &descriptor.iid);
            query.append_pair("pt", &descriptor.pt);
            query.append_pair("offset", &offset.to_string());
            query.append_pair("limit", &self.config.page_size.to_string());
            query.append_pair("output", "JSON");
        }
        Ok(url)
    }

    /// Number of pages to extract, honoring the sample limit
    pub fn page_count(&self, descriptor: &CollectionDescriptor, sample: Option<usize>) -> usize {
        let total = descriptor.page_count(self.config.page_size);
        match sample {
            Some(limit) => total.min(limit),
            None => total,
        }
    }

    /// Fetch requests for the pages still missing from the store
    pub fn plan_missing(
        &self,
        descriptor: &CollectionDescriptor,
        store: &CollectionStore,
        sample: Option<usize>,
    ) -> Result<Vec<FetchRequest>> {
        let total = self.page_count(descriptor, sample);
        let missing = store.list_missing_pages(total);
        debug!(
            collection = %store.fingerprint(),
            total,
            missing = missing.len(),
            "Record extraction plan"
        );
        missing
            .into_iter()
            .map(|index| {
                Ok(FetchRequest::new(
                    self.records_url(descriptor, index)?.to_string(),
                    store.page_path(index),
                    RequestClass::Json,
                ))
            })
            .collect()
    }

    /// Extract all missing pages for one collection.
    ///
    /// Pages are fetched in increasing index order but may complete out of
    /// order; completion order is irrelevant because readers sort by page
    /// index.
    pub async fn extract(
        &self,
        fetcher: &Fetcher,
        descriptor: &CollectionDescriptor,
        store: &CollectionStore,
        sample: Option<usize>,
    ) -> Result<FetchOutcome> {
        let requests = self.plan_missing(descriptor, store, sample)?;
        if requests.is_empty() {
            info!(collection = %store.fingerprint(), "All record pages present");
            return Ok(FetchOutcome::default());
        }
        info!(
            collection = %store.fingerprint(),
            pages = requests.len(),
            "Extracting record pages"
        );
        Ok(fetcher.fetch_all(requests, None).await)
    }
}

/// Decode one stored page into records
pub fn decode_stored_page(store: &CollectionStore, index: usize) -> Result<Vec<Record>> {
    let bytes = store.read_page(index)?;
    models::decode_records_page(&CollectionStore::page_filename(index), &bytes)
}

/// Stream all stored pages in page order.
///
/// Yields `(page_index, decode result)` so the caller can quarantine
/// malformed pages without aborting the collection.
pub fn stream_pages(
    store: &CollectionStore,
) -> Result<impl Iterator<Item = (usize, Result<Vec<Record>>)> + '_> {
    let pages = store.list_pages()?;
    Ok(pages
        .into_iter()
        .map(move |(index, _)| (index, decode_stored_page(store, index))))
}

/// The first record of the collection, needed for its volume identifier
pub fn first_record(store: &CollectionStore) -> Result<Option<Record>> {
    for (_, decoded) in stream_pages(store)? {
        if let Ok(records) = decoded {
            if let Some(record) = records.into_iter().next() {
                return Ok(Some(record));
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdh_common::Fingerprint;

    fn descriptor(products: i64) -> CollectionDescriptor {
        serde_json::from_value(serde_json::json!({
            "ODEMetaDB": "MARS", "IHID": "MGS", "IID": "MOLA", "PT": "PEDR",
            "DataSetId": "MGS-M-MOLA-3-PEDR-L1A-V1.0",
            "NumberProducts": products, "ValidFootprints": "T",
        }))
        .unwrap()
    }

    fn config() -> HarvestConfig {
        HarvestConfig::new("unused").with_page_size(100)
    }

    fn page_body(ode_id: &str) -> Vec<u8> {
        serde_json::json!({
            "ODEResults": {"Count": "1", "Products": {"Product": {
                "ode_id": ode_id, "pdsid": "P", "ihid": "MGS", "iid": "MOLA", "pt": "PEDR",
                "Target_name": "MARS", "Data_Set_Id": "MGS-M-MOLA-3-PEDR-L1A-V1.0",
                "PDSVolume_Id": "MGSL_0001",
                "Footprint_geometry": "POLYGON ((0 0, 1 0, 1 1, 0 0))",
                "Footprint_C0_geometry": "POLYGON ((0 0, 1 0, 1 1, 0 0))",
            }}}
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_records_url_pagination() {
        let extractor = RecordsExtractor::new(&config());
        let d = descriptor(1000);

        let url = extractor.records_url(&d, 0).unwrap();
        assert!(url.query().unwrap().contains("offset=1"));
        assert!(url.query().unwrap().contains("limit=100"));
        assert!(url.query().unwrap().contains("query=product"));
        assert!(url.query().unwrap().contains("ihid=MGS"));

        let url = extractor.records_url(&d, 3).unwrap();
        assert!(url.query().unwrap().contains("offset=301"));
    }

    #[test]
    fn test_page_count_with_sample() {
        let extractor = RecordsExtractor::new(&config());
        let d = descriptor(1000);
        assert_eq!(extractor.page_count(&d, None), 10);
        assert_eq!(extractor.page_count(&d, Some(2)), 2);
        assert_eq!(extractor.page_count(&d, Some(50)), 10);
    }

    #[test]
    fn test_plan_skips_present_pages() {
        let dir = tempfile::tempdir().unwrap();
        let fp = Fingerprint::new("MARS", "MGS", "MGS", "MOLA", "MGS-M-MOLA-3-PEDR-L1A-V1.0");
        let store = CollectionStore::open(dir.path(), &fp).unwrap();
        let extractor = RecordsExtractor::new(&config());
        let d = descriptor(500);

        store.write_page(0, &page_body("1")).unwrap();
        store.write_page(3, &page_body("2")).unwrap();

        let plan = extractor.plan_missing(&d, &store, None).unwrap();
        assert_eq!(plan.len(), 3);
        assert!(plan[0].url.contains("offset=101"));
        assert!(plan
            .iter()
            .all(|r| !r.dest.ends_with("page_000.json") && !r.dest.ends_with("page_003.json")));
    }

    #[test]
    fn test_sample_plan_only_first_pages() {
        let dir = tempfile::tempdir().unwrap();
        let fp = Fingerprint::new("MARS", "MGS", "MGS", "MOLA", "MGS-M-MOLA-3-PEDR-L1A-V1.0");
        let store = CollectionStore::open(dir.path(), &fp).unwrap();
        let extractor = RecordsExtractor::new(&config());
        let d = descriptor(1000);

        // Sample of two pages
        let plan = extractor.plan_missing(&d, &store, Some(2)).unwrap();
        assert_eq!(plan.len(), 2);

        store.write_page(0, &page_body("1")).unwrap();
        store.write_page(1, &page_body("2")).unwrap();

        // Widening the sample to five fetches only the three new pages
        let plan = extractor.plan_missing(&d, &store, Some(5)).unwrap();
        assert_eq!(plan.len(), 3);
        assert!(plan[0].url.contains("offset=201"));
    }

    #[test]
    fn test_stream_pages_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let fp = Fingerprint::new("MARS", "MGS", "MGS", "MOLA", "MGS-M-MOLA-3-PEDR-L1A-V1.0");
        let store = CollectionStore::open(dir.path(), &fp).unwrap();

        store.write_page(2, &page_body("third")).unwrap();
        store.write_page(0, &page_body("first")).unwrap();
        store.write_page(1, &page_body("second")).unwrap();

        let ids: Vec<String> = stream_pages(&store)
            .unwrap()
            .map(|(_, decoded)| decoded.unwrap()[0].ode_id.clone())
            .collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_first_record_skips_malformed_pages() {
        let dir = tempfile::tempdir().unwrap();
        let fp = Fingerprint::new("MARS", "MGS", "MGS", "MOLA", "MGS-M-MOLA-3-PEDR-L1A-V1.0");
        let store = CollectionStore::open(dir.path(), &fp).unwrap();

        store.write_page(0, b"<html>broken</html>").unwrap();
        store.write_page(1, &page_body("good")).unwrap();

        let record = first_record(&store).unwrap().unwrap();
        assert_eq!(record.ode_id, "good");
    }
}
