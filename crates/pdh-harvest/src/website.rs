//! Website extractor
//!
//! Scrapes a collection's Dataset Explorer volume index to find its PDS3
//! catalog files. The volume descriptor (`voldesc.cat`) is located first;
//! its CATALOG object names the per-kind catalog files, which are then
//! matched case-insensitively against the anchors of the `catalog/`
//! directory listing. The first match per catalog kind wins; unknown
//! anchors are ignored.

use crate::config::HarvestConfig;
use crate::fetch::{FetchRequest, RequestClass};
use crate::ode::models::{CollectionDescriptor, Record};
use crate::pds3::models::{Pds3Catalog, VolumeDescriptor};
use crate::pds3::{self, CatalogKind};
use crate::store::CollectionStore;
use pdh_common::{HarvestError, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};

const VOLDESC_FILENAME: &str = "voldesc.cat";

/// One anchor from a volume index page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexLink {
    pub name: String,
    pub url: String,
}

/// A catalog file chosen for download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTarget {
    pub kind: CatalogKind,
    pub filename: String,
    pub url: String,
}

/// Scraper for the Dataset Explorer volume pages
pub struct WebsiteExtractor {
    client: Client,
    config: HarvestConfig,
}

impl WebsiteExtractor {
    pub fn new(config: &HarvestConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.http.connect_timeout_secs))
            .timeout(Duration::from_secs(config.http.read_timeout_secs))
            .user_agent(config.http.user_agent.clone())
            .build()
            .map_err(|err| HarvestError::network("client", err.to_string()))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Volume index URL for a collection, using the volume id carried by
    /// one of its already-fetched records
    pub fn volume_index_url(&self, descriptor: &CollectionDescriptor, record: &Record) -> String {
        let volume_id = record.pds_volume_id.as_deref().unwrap_or_default();
        format!(
            "{}/{}/DataSetExplorer.aspx?target={}&instrumenthost={}&instrumentid={}&datasetid={}&volumeid={}",
            self.config.explorer_url.trim_end_matches('/'),
            descriptor.ode_meta_db.to_lowercase(),
            descriptor.ode_meta_db.to_lowercase(),
            record.ihid,
            record.iid,
            record.dataset_id,
            volume_id,
        )
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        debug!(url, "Fetching volume index page");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| HarvestError::network(url, err.to_string()))?;
        if !response.status().is_success() {
            return Err(HarvestError::network(
                url,
                format!("HTTP {}", response.status()),
            ));
        }
        response
            .text()
            .await
            .map_err(|err| HarvestError::network(url, err.to_string()))
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.fetch_page(url).await
    }

    /// Discover the catalog files for one collection.
    ///
    /// Returns the voldesc target plus one target per catalog kind the
    /// volume declares and the index page actually serves.
    pub async fn discover_catalogs(
        &self,
        descriptor: &CollectionDescriptor,
        record: &Record,
    ) -> Result<Vec<CatalogTarget>> {
        let index_url = self.volume_index_url(descriptor, record);
        let index_html = self.fetch_page(&index_url).await?;
        let index_links = parse_index_links(&index_html);

        let Some(voldesc_link) = find_link(&index_links, VOLDESC_FILENAME) else {
            return Err(HarvestError::malformed(
                index_url,
                format!("{} not found in volume index", VOLDESC_FILENAME),
            ));
        };
        info!(url = %voldesc_link.url, "Volume descriptor located");

        // The voldesc names the catalog files for each kind
        let voldesc_text = self.fetch_text(&voldesc_link.url).await?;
        let volume = parse_voldesc(&voldesc_link.url, &voldesc_text)?;

        let catalog_url = format!("{}&pathtovol=catalog/", index_url);
        let catalog_html = self.fetch_page(&catalog_url).await?;
        let catalog_links = parse_index_links(&catalog_html);

        let mut targets = vec![CatalogTarget {
            kind: CatalogKind::VolumeDescriptor,
            filename: VOLDESC_FILENAME.to_string(),
            url: voldesc_link.url.clone(),
        }];
        targets.extend(match_catalogs(&catalog_links, &volume));
        Ok(targets)
    }

    /// Fetch requests placing each target in the collection's `pds3/` dir
    pub fn plan_downloads(
        &self,
        store: &CollectionStore,
        targets: &[CatalogTarget],
    ) -> Vec<FetchRequest> {
        targets
            .iter()
            .map(|target| {
                FetchRequest::new(
                    target.url.clone(),
                    store.pds3_path(&target.filename),
                    RequestClass::Pds3,
                )
            })
            .collect()
    }
}

/// Parse the anchors of a volume index page.
///
/// The explorer renders the listing as the last table on the page;
/// navigation anchors carry a `title` attribute and are skipped.
pub fn parse_index_links(html: &str) -> Vec<IndexLink> {
    let document = Html::parse_document(html);
    let table_selector = Selector::parse("table").expect("static selector");
    let anchor_selector = Selector::parse("a[href]").expect("static selector");

    let Some(table) = document.select(&table_selector).last() else {
        return Vec::new();
    };

    let mut links = Vec::new();
    for anchor in table.select(&anchor_selector) {
        if anchor.value().attr("title").is_some() {
            continue;
        }
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let name = anchor.text().collect::<String>().trim().to_string();
        if name.is_empty() {
            continue;
        }
        links.push(IndexLink {
            name,
            url: href.to_string(),
        });
    }
    links
}

/// First link whose text matches `name` case-insensitively
fn find_link<'a>(links: &'a [IndexLink], name: &str) -> Option<&'a IndexLink> {
    let wanted = name.to_lowercase();
    links.iter().find(|link| link.name.to_lowercase() == wanted)
}

fn parse_voldesc(url: &str, content: &str) -> Result<VolumeDescriptor> {
    match pds3::parse_str(url, content, CatalogKind::VolumeDescriptor)? {
        Pds3Catalog::VolumeDescriptor(volume) => Ok(volume),
        _ => unreachable!("volume grammar produced another kind"),
    }
}

/// Match catalog-directory anchors against the file names declared by the
/// volume descriptor. The first anchor per catalog kind wins; anchors the
/// volume does not declare fall back to the filename roster, and anchors
/// neither recognizes are ignored.
pub fn match_catalogs(links: &[IndexLink], volume: &VolumeDescriptor) -> Vec<CatalogTarget> {
    let mut targets = Vec::new();
    let mut taken_kinds = BTreeSet::new();
    let mut taken_files = BTreeSet::new();

    // Pass 1: files the volume descriptor declares, kind by kind
    for (kind, filename) in volume.catalog.entries() {
        if let Some(link) = find_link(links, &filename) {
            if taken_files.insert(link.name.to_lowercase()) {
                taken_kinds.insert(kind);
                targets.push(CatalogTarget {
                    kind,
                    filename: link.name.to_lowercase(),
                    url: link.url.clone(),
                });
            }
        } else {
            warn!(file = %filename, "Declared catalog file missing from index page");
        }
    }

    // Pass 2: roster fallback for kinds the voldesc does not declare
    for link in links {
        let Some(kind) = CatalogKind::from_filename(&link.name) else {
            continue;
        };
        if kind == CatalogKind::VolumeDescriptor {
            continue;
        }
        if taken_kinds.contains(&kind) || taken_files.contains(&link.name.to_lowercase()) {
            continue;
        }
        taken_kinds.insert(kind);
        taken_files.insert(link.name.to_lowercase());
        targets.push(CatalogTarget {
            kind,
            filename: link.name.to_lowercase(),
            url: link.url.clone(),
        });
    }

    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_HTML: &str = r#"
        <html><body>
        <table><tr><td><a href="/nav" title="Navigation">Home</a></td></tr></table>
        <table>
          <tr><td><a href="https://pds/mgsl_0001/voldesc.cat">VOLDESC.CAT</a></td></tr>
          <tr><td><a href="https://pds/mgsl_0001/catalog/">catalog</a></td></tr>
          <tr><td><a href="https://pds/mgsl_0001/aareadme.txt">AAREADME.TXT</a></td></tr>
        </table>
        </body></html>
    "#;

    const CATALOG_HTML: &str = r#"
        <html><body>
        <table>
          <tr><td><a href="https://pds/cat/mission.cat">MISSION.CAT</a></td></tr>
          <tr><td><a href="https://pds/cat/insthost.cat">INSTHOST.CAT</a></td></tr>
          <tr><td><a href="https://pds/cat/inst.cat">INST.CAT</a></td></tr>
          <tr><td><a href="https://pds/cat/ds.cat">DS.CAT</a></td></tr>
          <tr><td><a href="https://pds/cat/person.cat">PERSON.CAT</a></td></tr>
          <tr><td><a href="https://pds/cat/ref.cat">REF.CAT</a></td></tr>
          <tr><td><a href="https://pds/cat/dsmap.cat">DSMAP.CAT</a></td></tr>
          <tr><td><a href="https://pds/cat/unrelated.lbl">UNRELATED.LBL</a></td></tr>
        </table>
        </body></html>
    "#;

    fn sample_volume() -> VolumeDescriptor {
        let catalog = crate::pds3::parse_str(
            "voldesc.cat",
            crate::pds3::models::tests::VOLDESC_CAT,
            CatalogKind::VolumeDescriptor,
        )
        .unwrap();
        match catalog {
            Pds3Catalog::VolumeDescriptor(volume) => volume,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_parse_index_links_uses_last_table() {
        let links = parse_index_links(INDEX_HTML);
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].name, "VOLDESC.CAT");
        // The titled navigation anchor from the first table is absent
        assert!(links.iter().all(|l| l.name != "Home"));
    }

    #[test]
    fn test_find_link_is_case_insensitive() {
        let links = parse_index_links(INDEX_HTML);
        let voldesc = find_link(&links, "voldesc.cat").unwrap();
        assert_eq!(voldesc.url, "https://pds/mgsl_0001/voldesc.cat");
    }

    #[test]
    fn test_match_catalogs_takes_declared_files() {
        let links = parse_index_links(CATALOG_HTML);
        let targets = match_catalogs(&links, &sample_volume());

        // Six declared kinds plus the roster-matched projection catalog
        assert_eq!(targets.len(), 7);
        assert!(targets
            .iter()
            .any(|t| t.kind == CatalogKind::Mission && t.filename == "mission.cat"));
        assert!(targets
            .iter()
            .any(|t| t.kind == CatalogKind::DataSetMapProjection && t.filename == "dsmap.cat"));
        // Unknown anchors are ignored
        assert!(targets.iter().all(|t| t.filename != "unrelated.lbl"));
    }

    #[test]
    fn test_first_match_per_kind_wins() {
        let html = r#"
            <table>
              <tr><td><a href="https://pds/cat/ref1.cat">REF1.CAT</a></td></tr>
              <tr><td><a href="https://pds/cat/ref2.cat">REF2.CAT</a></td></tr>
            </table>
        "#;
        let links = parse_index_links(html);
        let mut volume = sample_volume();
        volume.catalog = Default::default();

        let targets = match_catalogs(&links, &volume);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].filename, "ref1.cat");
        assert_eq!(targets[0].kind, CatalogKind::Reference);
    }

    #[test]
    fn test_volume_index_url_shape() {
        let config = HarvestConfig::default();
        let extractor = WebsiteExtractor::new(&config).unwrap();

        let descriptor: CollectionDescriptor = serde_json::from_value(serde_json::json!({
            "ODEMetaDB": "MARS", "IHID": "MGS", "IID": "MOLA", "PT": "PEDR",
            "DataSetId": "MGS-M-MOLA-3-PEDR-L1A-V1.0",
            "NumberProducts": 10, "ValidFootprints": "T",
        }))
        .unwrap();
        let record: Record = serde_json::from_value(serde_json::json!({
            "ode_id": "1", "pdsid": "X", "ihid": "MGS", "iid": "MOLA", "pt": "PEDR",
            "Target_name": "MARS", "Data_Set_Id": "MGS-M-MOLA-3-PEDR-L1A-V1.0",
            "PDSVolume_Id": "MGSL_0001",
            "Footprint_geometry": "POLYGON ((0 0, 1 0, 1 1, 0 0))",
        }))
        .unwrap();

        let url = extractor.volume_index_url(&descriptor, &record);
        assert!(url.starts_with("https://ode.rsl.wustl.edu/mars/DataSetExplorer.aspx?"));
        assert!(url.contains("target=mars"));
        assert!(url.contains("instrumenthost=MGS"));
        assert!(url.contains("instrumentid=MOLA"));
        assert!(url.contains("datasetid=MGS-M-MOLA-3-PEDR-L1A-V1.0"));
        assert!(url.contains("volumeid=MGSL_0001"));
    }
}
