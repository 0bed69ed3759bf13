//! On-disk STAC tree
//!
//! Parent catalogs live under `<root>/stac/<mission>/<host>/<instrument>/`;
//! each collection document and its items live inside the collection's own
//! directory in the file store. All hrefs are relative and recomputed from
//! the layout on every write, child links are kept sorted, and JSON is
//! written through a temp sibling, so rewriting an unchanged tree is
//! byte-identical.

use crate::ode::models::CollectionDescriptor;
use crate::stac::ids::normalize_id;
use crate::stac::models::{rel, Catalog, Link};
use pdh_common::{Fingerprint, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const ROOT_ID: &str = "pds";
const ROOT_TITLE: &str = "Planetary Data System";
const ROOT_DESCRIPTION: &str =
    "Georeferenced PDS collections harvested from the ODE web service and PDS3 archives";

/// Deterministic identifiers and titles for a collection's parent chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeIds {
    pub mission_id: String,
    pub mission_title: String,
    pub host_id: String,
    pub host_title: String,
    pub instrument_id: String,
    pub instrument_title: String,
    pub collection_id: String,
    pub collection_title: String,
}

impl TreeIds {
    /// Ids derived from an ODE descriptor. The mission id is the
    /// normalized mission (host) name so the PDS3 enrichment finds the
    /// same catalog again.
    pub fn from_descriptor(descriptor: &CollectionDescriptor) -> Self {
        let mission_title = if descriptor.ihname.is_empty() {
            descriptor.ihid.clone()
        } else {
            descriptor.ihname.clone()
        };
        let instrument_title = if descriptor.iname.is_empty() {
            descriptor.iid.clone()
        } else {
            descriptor.iname.clone()
        };
        Self {
            mission_id: normalize_id(&mission_title),
            mission_title,
            host_id: normalize_id(&descriptor.ihid),
            host_title: descriptor.ihid.clone(),
            instrument_id: normalize_id(&descriptor.iid),
            instrument_title,
            collection_id: normalize_id(&descriptor.dataset_id),
            collection_title: descriptor.dataset_id.clone(),
        }
    }
}

/// Handle on the tree under one storage root
pub struct StacTree {
    root_dir: PathBuf,
}

impl StacTree {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn stac_dir(&self) -> PathBuf {
        self.root_dir.join("stac")
    }

    pub fn root_catalog_path(&self) -> PathBuf {
        self.stac_dir().join("catalog.json")
    }

    pub fn mission_dir(&self, ids: &TreeIds) -> PathBuf {
        self.stac_dir().join(&ids.mission_id)
    }

    pub fn host_dir(&self, ids: &TreeIds) -> PathBuf {
        self.mission_dir(ids).join(&ids.host_id)
    }

    pub fn instrument_dir(&self, ids: &TreeIds) -> PathBuf {
        self.host_dir(ids).join(&ids.instrument_id)
    }

    /// Href from the instrument catalog to a collection document
    pub fn collection_href(fingerprint: &Fingerprint) -> String {
        format!(
            "../../../../{}/stac/collection.json",
            fingerprint.relative_dir().display()
        )
    }

    /// Structural links of the collection document
    pub fn collection_links(ids: &TreeIds) -> Vec<Link> {
        vec![
            Link::new(rel::ROOT, "../../../../../../stac/catalog.json"),
            Link::new(
                rel::PARENT,
                format!(
                    "../../../../../../stac/{}/{}/{}/catalog.json",
                    ids.mission_id, ids.host_id, ids.instrument_id
                ),
            ),
        ]
    }

    /// Structural links of an item document
    pub fn item_links(collection_id: &str) -> Vec<Link> {
        vec![
            Link::new(rel::ROOT, "../../../../../../../stac/catalog.json"),
            Link::new(rel::PARENT, "../collection.json"),
            Link::new(rel::COLLECTION, "../collection.json").with_title(collection_id.to_string()),
        ]
    }

    // ------------------------------------------------------------------
    // JSON I/O
    // ------------------------------------------------------------------

    /// Atomic pretty-printed JSON write
    pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut content = serde_json::to_string_pretty(value)?;
        content.push('\n');
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    // ------------------------------------------------------------------
    // Catalog maintenance
    // ------------------------------------------------------------------

    /// Replace the structural links of a catalog and keep its child links
    /// (sorted by href). Links the transformer did not emit are dropped.
    pub fn regenerate_links(catalog: &mut Catalog, structural: Vec<Link>) {
        let mut children: Vec<Link> = catalog
            .links
            .drain(..)
            .filter(|link| link.rel == rel::CHILD)
            .collect();
        children.sort_by(|a, b| a.href.cmp(&b.href));
        children.dedup_by(|a, b| a.href == b.href);
        catalog.links = structural;
        catalog.links.extend(children);
    }

    /// Add a child link when no link with the same href exists
    pub fn upsert_child(catalog: &mut Catalog, href: impl Into<String>, title: &str) {
        let href = href.into();
        if catalog
            .links
            .iter()
            .any(|link| link.rel == rel::CHILD && link.href == href)
        {
            return;
        }
        catalog
            .links
            .push(Link::new(rel::CHILD, href).with_title(title.to_string()));
    }

    fn load_or_new(path: &Path, id: &str, title: &str) -> Result<Catalog> {
        match Self::read_json::<Catalog>(path)? {
            Some(catalog) => Ok(catalog),
            None => Ok(Catalog::new(id, "").with_title(title.to_string())),
        }
    }

    /// Create-or-merge the parent chain for one collection: root catalog,
    /// mission, instrument host and instrument, each holding a child link
    /// to the next level and, at the bottom, to the collection document.
    pub fn ensure_parents(&self, ids: &TreeIds, fingerprint: &Fingerprint) -> Result<()> {
        // Root
        let root_path = self.root_catalog_path();
        let mut root = match Self::read_json::<Catalog>(&root_path)? {
            Some(catalog) => catalog,
            None => {
                info!("Creating STAC root catalog");
                Catalog::new(ROOT_ID, ROOT_DESCRIPTION).with_title(ROOT_TITLE.to_string())
            },
        };
        Self::upsert_child(
            &mut root,
            format!("./{}/catalog.json", ids.mission_id),
            &ids.mission_title,
        );
        Self::regenerate_links(&mut root, vec![Link::new(rel::ROOT, "./catalog.json")]);
        Self::write_json(&root_path, &root)?;

        // Mission
        let mission_path = self.mission_dir(ids).join("catalog.json");
        let mut mission = Self::load_or_new(&mission_path, &ids.mission_id, &ids.mission_title)?;
        Self::upsert_child(
            &mut mission,
            format!("./{}/catalog.json", ids.host_id),
            &ids.host_title,
        );
        Self::regenerate_links(
            &mut mission,
            vec![
                Link::new(rel::ROOT, "../catalog.json"),
                Link::new(rel::PARENT, "../catalog.json"),
            ],
        );
        Self::write_json(&mission_path, &mission)?;

        // Instrument host
        let host_path = self.host_dir(ids).join("catalog.json");
        let mut host = Self::load_or_new(&host_path, &ids.host_id, &ids.host_title)?;
        Self::upsert_child(
            &mut host,
            format!("./{}/catalog.json", ids.instrument_id),
            &ids.instrument_title,
        );
        Self::regenerate_links(
            &mut host,
            vec![
                Link::new(rel::ROOT, "../../catalog.json"),
                Link::new(rel::PARENT, "../catalog.json"),
            ],
        );
        Self::write_json(&host_path, &host)?;

        // Instrument
        let instrument_path = self.instrument_dir(ids).join("catalog.json");
        let mut instrument =
            Self::load_or_new(&instrument_path, &ids.instrument_id, &ids.instrument_title)?;
        Self::upsert_child(
            &mut instrument,
            Self::collection_href(fingerprint),
            &ids.collection_title,
        );
        Self::regenerate_links(
            &mut instrument,
            vec![
                Link::new(rel::ROOT, "../../../catalog.json"),
                Link::new(rel::PARENT, "../catalog.json"),
            ],
        );
        Self::write_json(&instrument_path, &instrument)?;

        Ok(())
    }

    /// Remove the whole parent tree (collection subtrees are reset through
    /// their own stores)
    pub fn reset(&self) -> Result<()> {
        let dir = self.stac_dir();
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
            info!(path = %dir.display(), "STAC tree removed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> CollectionDescriptor {
        serde_json::from_value(serde_json::json!({
            "ODEMetaDB": "MARS",
            "IHID": "MGS",
            "IHName": "MARS GLOBAL SURVEYOR",
            "IID": "MOLA",
            "IName": "MARS ORBITER LASER ALTIMETER",
            "PT": "PEDR",
            "PTName": "PEDR products",
            "DataSetId": "MGS-M-MOLA-3-PEDR-L1A-V1.0",
            "NumberProducts": 1000,
            "ValidFootprints": "T",
        }))
        .unwrap()
    }

    #[test]
    fn test_tree_ids_from_descriptor() {
        let ids = TreeIds::from_descriptor(&descriptor());
        assert_eq!(ids.mission_id, "mars-global-surveyor");
        assert_eq!(ids.host_id, "mgs");
        assert_eq!(ids.instrument_id, "mola");
        assert_eq!(ids.collection_id, "mgs-m-mola-3-pedr-l1a-v1-0");
    }

    #[test]
    fn test_ensure_parents_builds_chain() {
        let dir = tempfile::tempdir().unwrap();
        let tree = StacTree::new(dir.path());
        let ids = TreeIds::from_descriptor(&descriptor());
        let fp = descriptor().fingerprint();

        tree.ensure_parents(&ids, &fp).unwrap();

        let root: Catalog = StacTree::read_json(&tree.root_catalog_path()).unwrap().unwrap();
        assert_eq!(root.id, "pds");
        assert_eq!(root.child_hrefs(), vec!["./mars-global-surveyor/catalog.json"]);

        let mission: Catalog =
            StacTree::read_json(&tree.mission_dir(&ids).join("catalog.json")).unwrap().unwrap();
        assert_eq!(mission.id, "mars-global-surveyor");
        assert_eq!(mission.child_hrefs(), vec!["./mgs/catalog.json"]);

        let host: Catalog =
            StacTree::read_json(&tree.host_dir(&ids).join("catalog.json")).unwrap().unwrap();
        assert_eq!(host.child_hrefs(), vec!["./mola/catalog.json"]);

        let instrument: Catalog =
            StacTree::read_json(&tree.instrument_dir(&ids).join("catalog.json")).unwrap().unwrap();
        assert_eq!(
            instrument.child_hrefs(),
            vec!["../../../../mars/mgs/mgs/mola/mgs-m-mola-3-pedr-l1a-v1.0/stac/collection.json"]
        );
    }

    #[test]
    fn test_ensure_parents_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let tree = StacTree::new(dir.path());
        let ids = TreeIds::from_descriptor(&descriptor());
        let fp = descriptor().fingerprint();

        tree.ensure_parents(&ids, &fp).unwrap();
        let first = fs::read(tree.root_catalog_path()).unwrap();
        tree.ensure_parents(&ids, &fp).unwrap();
        let second = fs::read(tree.root_catalog_path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sibling_missions_share_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let tree = StacTree::new(dir.path());

        let mars = descriptor();
        let mut odyssey = descriptor();
        odyssey.ihid = "ODY".to_string();
        odyssey.ihname = "2001 MARS ODYSSEY".to_string();

        tree.ensure_parents(&TreeIds::from_descriptor(&mars), &mars.fingerprint())
            .unwrap();
        tree.ensure_parents(&TreeIds::from_descriptor(&odyssey), &odyssey.fingerprint())
            .unwrap();

        let root: Catalog = StacTree::read_json(&tree.root_catalog_path()).unwrap().unwrap();
        let children = root.child_hrefs();
        assert_eq!(children.len(), 2);
        // Sorted for deterministic output
        assert!(children[0] < children[1]);
    }

    #[test]
    fn test_parent_links_resolve_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let tree = StacTree::new(dir.path());
        let ids = TreeIds::from_descriptor(&descriptor());
        tree.ensure_parents(&ids, &descriptor().fingerprint()).unwrap();

        // Walk every parent/root link and require the target to exist
        for path in [
            tree.mission_dir(&ids).join("catalog.json"),
            tree.host_dir(&ids).join("catalog.json"),
            tree.instrument_dir(&ids).join("catalog.json"),
        ] {
            let catalog: Catalog = StacTree::read_json(&path).unwrap().unwrap();
            for link in catalog
                .links
                .iter()
                .filter(|l| l.rel == rel::PARENT || l.rel == rel::ROOT)
            {
                let target = path.parent().unwrap().join(&link.href);
                assert!(
                    target.canonicalize().is_ok(),
                    "{} -> {} does not resolve",
                    path.display(),
                    link.href
                );
            }
        }
    }
}
