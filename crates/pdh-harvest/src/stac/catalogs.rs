//! PDS3-to-STAC enrichment
//!
//! Loads a collection's parsed PDS3 objects and deepens the STAC parent
//! catalogs and the collection document with the richer metadata. Objects
//! are first parsed into a bundle keyed by their natural ids, then linked
//! by id lookup; references cite missions cite references, so nothing
//! links by pointer during parse. Where both a PDS3 object and the ODE
//! descriptor supply the same field, the PDS3 value wins.

use crate::ode::models::CollectionDescriptor;
use crate::pds3::models::{
    DataSet, DataSetMapProjection, Instrument, InstrumentHost, Mission, Pds3Catalog, Personnel,
    References, VolumeDescriptor,
};
use crate::pds3;
use crate::report::CollectionReport;
use crate::stac::ids::normalize_id;
use crate::stac::models::{Catalog, Collection, Provider};
use crate::stac::tree::{StacTree, TreeIds};
use crate::store::CollectionStore;
use pdh_common::Result;
use serde_json::Value;
use std::fs;
use tracing::{debug, info};

/// All PDS3 objects of one collection, keyed by their natural ids
#[derive(Debug, Default)]
pub struct Pds3Bundle {
    pub mission: Option<Mission>,
    pub host: Option<InstrumentHost>,
    pub instruments: Vec<Instrument>,
    pub datasets: Vec<DataSet>,
    pub projections: Vec<DataSetMapProjection>,
    pub personnel: Option<Personnel>,
    pub references: Option<References>,
    pub volume: Option<VolumeDescriptor>,
    /// Files the grammar rejected in this run
    pub unparsed: usize,
}

impl Pds3Bundle {
    pub fn is_empty(&self) -> bool {
        self.mission.is_none()
            && self.host.is_none()
            && self.instruments.is_empty()
            && self.datasets.is_empty()
            && self.projections.is_empty()
            && self.personnel.is_none()
            && self.references.is_none()
            && self.volume.is_none()
    }

    /// The data set matching the collection, falling back to the only one
    pub fn dataset_for(&self, dataset_id: &str) -> Option<&DataSet> {
        let wanted = dataset_id.to_uppercase();
        self.datasets
            .iter()
            .find(|d| d.dataset_id.to_uppercase() == wanted)
            .or_else(|| self.datasets.first())
    }

    /// The instrument matching the collection's instrument id
    pub fn instrument_for(&self, instrument_id: &str) -> Option<&Instrument> {
        let wanted = instrument_id.to_uppercase();
        self.instruments
            .iter()
            .find(|i| i.instrument_id.to_uppercase() == wanted)
            .or_else(|| self.instruments.first())
    }

    /// Resolve reference keys to citation texts via the reference table
    pub fn citations(&self, keys: &[String]) -> Vec<String> {
        match &self.references {
            Some(references) => references.resolve(keys),
            None => Vec::new(),
        }
    }
}

/// Parse every PDS3 file of the collection (pass one of the two-pass load)
pub fn load_bundle(store: &CollectionStore, report: &mut CollectionReport) -> Result<Pds3Bundle> {
    let mut bundle = Pds3Bundle::default();

    for file in store.list_pds3()? {
        let name = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let content = match fs::read_to_string(&file.path) {
            Ok(content) => content,
            Err(err) => {
                let err = pdh_common::HarvestError::from(err);
                report.add_error(name.clone(), &err);
                bundle.unparsed += 1;
                continue;
            },
        };
        match pds3::parse_str(&name, &content, file.kind) {
            Ok(catalog) => {
                debug!(file = %name, kind = %file.kind, id = %catalog.identifier(), "PDS3 object parsed");
                match catalog {
                    Pds3Catalog::Mission(mission) => bundle.mission = Some(mission),
                    Pds3Catalog::InstrumentHost(host) => bundle.host = Some(host),
                    Pds3Catalog::Instrument(instrument) => bundle.instruments.push(instrument),
                    Pds3Catalog::DataSet(dataset) => bundle.datasets.push(dataset),
                    Pds3Catalog::DataSetMapProjection(projection) => {
                        bundle.projections.push(projection)
                    },
                    Pds3Catalog::Personnel(personnel) => bundle.personnel = Some(personnel),
                    Pds3Catalog::Reference(references) => bundle.references = Some(references),
                    Pds3Catalog::VolumeDescriptor(volume) => bundle.volume = Some(volume),
                }
            },
            Err(err) => {
                // The variant stays unparsed; its enrichment is skipped
                report.add_error(name, &err);
                bundle.unparsed += 1;
            },
        }
    }
    Ok(bundle)
}

/// Tree ids with PDS3 identifiers taking precedence over the descriptor's
fn ids_with_pds3(descriptor: &CollectionDescriptor, bundle: &Pds3Bundle) -> TreeIds {
    let mut ids = TreeIds::from_descriptor(descriptor);
    if let Some(mission) = &bundle.mission {
        ids.mission_id = normalize_id(&mission.name);
        ids.mission_title = mission.name.clone();
    }
    if let Some(host) = &bundle.host {
        ids.host_id = normalize_id(&host.instrument_host_id);
        ids.host_title = host.information.name.clone();
    }
    if let Some(instrument) = bundle.instrument_for(&descriptor.iid) {
        ids.instrument_id = normalize_id(&instrument.instrument_id);
        ids.instrument_title = instrument.information.name.clone();
    }
    ids
}

fn enrich_mission(catalog: &mut Catalog, mission: &Mission, bundle: &Pds3Bundle) {
    catalog.title = Some(mission.name.clone());
    catalog.description = mission.information.description.clone();
    if let Some(summary) = &mission.information.objectives_summary {
        catalog
            .extra
            .insert("mission_objectives_summary".into(), Value::String(summary.clone()));
    }
    if let Some(date) = mission.information.start_date {
        catalog
            .extra
            .insert("mission_start_date".into(), Value::String(date.to_string()));
    }
    if let Some(date) = mission.information.stop_date {
        catalog
            .extra
            .insert("mission_stop_date".into(), Value::String(date.to_string()));
    }
    catalog.extra.insert(
        "ssys:targets".into(),
        Value::Array(
            mission
                .host
                .targets
                .iter()
                .map(|t| Value::String(t.clone()))
                .collect(),
        ),
    );
    let publications = bundle.citations(&mission.reference_keys);
    if !publications.is_empty() {
        catalog.extra.insert(
            "publications".into(),
            Value::Array(publications.into_iter().map(Value::String).collect()),
        );
    }
}

fn enrich_host(catalog: &mut Catalog, host: &InstrumentHost, bundle: &Pds3Bundle) {
    catalog.title = Some(host.information.name.clone());
    catalog.description = host.information.description.clone();
    catalog.extra.insert(
        "platform_type".into(),
        Value::String(host.information.host_type.clone()),
    );
    let publications = bundle.citations(&host.reference_keys);
    if !publications.is_empty() {
        catalog.extra.insert(
            "publications".into(),
            Value::Array(publications.into_iter().map(Value::String).collect()),
        );
    }
}

fn enrich_instrument(catalog: &mut Catalog, instrument: &Instrument, bundle: &Pds3Bundle) {
    catalog.title = Some(instrument.information.name.clone());
    catalog.description = instrument.information.description.clone();
    catalog.extra.insert(
        "instrument_type".into(),
        Value::String(instrument.information.instrument_type.clone()),
    );
    let publications = bundle.citations(&instrument.reference_keys);
    if !publications.is_empty() {
        catalog.extra.insert(
            "publications".into(),
            Value::Array(publications.into_iter().map(Value::String).collect()),
        );
    }
}

fn enrich_collection(
    collection: &mut Collection,
    dataset: &DataSet,
    bundle: &Pds3Bundle,
) {
    collection.title = Some(dataset.information.name.clone());
    if let Some(description) = dataset.information.best_description() {
        collection.description = description.to_string();
    }
    collection.keywords = dataset.targets.clone();

    let mut providers = Vec::new();
    for producer in &dataset.information.producers {
        providers.push(Provider::new(producer.clone(), "producer"));
    }
    if let Some(volume) = &bundle.volume {
        if let Some(name) = volume.data_producer.display_name() {
            if !providers.iter().any(|p| p.name == name) {
                providers.push(Provider::new(name.to_string(), "producer"));
            }
        }
        if let Some(supplier) = &volume.data_supplier {
            if let Some(name) = supplier.display_name() {
                providers.push(Provider::new(name.to_string(), "host"));
            }
        }
    }
    collection.providers = providers;

    // PDS3 times win over the descriptor-derived interval
    let start = dataset
        .information
        .start_time
        .map(|d| d.datetime().format("%Y-%m-%dT%H:%M:%SZ").to_string());
    let stop = dataset
        .information
        .stop_time
        .map(|d| d.datetime().format("%Y-%m-%dT%H:%M:%SZ").to_string());
    if start.is_some() || stop.is_some() {
        collection.extent.temporal.interval = vec![vec![start, stop]];
    }

    collection
        .extra
        .insert("mission".into(), Value::String(dataset.mission_name.clone()));
    if let Some(citation) = &dataset.information.citation {
        collection
            .extra
            .insert("sci:citation".into(), Value::String(citation.clone()));
    }
    let publications = bundle.citations(&dataset.reference_keys);
    if !publications.is_empty() {
        collection.extra.insert(
            "publications".into(),
            Value::Array(publications.into_iter().map(Value::String).collect()),
        );
    }
    if let Some(projection) = bundle
        .projections
        .iter()
        .find(|p| p.dataset_id.to_uppercase() == dataset.dataset_id.to_uppercase())
        .or_else(|| bundle.projections.first())
    {
        collection.extra.insert(
            "map_projection_type".into(),
            Value::String(projection.information.projection_type.clone()),
        );
    }
}

/// Outcome counters for one collection's enrichment
#[derive(Debug, Default, Clone, Copy)]
pub struct CatalogsOutcome {
    pub parsed: usize,
    pub unparsed: usize,
    pub enriched: bool,
}

/// Enrich the STAC tree of one collection from its PDS3 objects.
///
/// Items are untouched; only parent catalogs and the collection document
/// are updated, atomically and idempotently.
pub fn transform_pds3(
    descriptor: &CollectionDescriptor,
    store: &CollectionStore,
    tree: &StacTree,
    report: &mut CollectionReport,
) -> Result<CatalogsOutcome> {
    let bundle = load_bundle(store, report)?;
    let mut outcome = CatalogsOutcome {
        parsed: [
            bundle.mission.is_some(),
            bundle.host.is_some(),
            bundle.personnel.is_some(),
            bundle.references.is_some(),
            bundle.volume.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
            + bundle.instruments.len()
            + bundle.datasets.len()
            + bundle.projections.len(),
        unparsed: bundle.unparsed,
        enriched: false,
    };

    if bundle.is_empty() {
        info!(collection = %store.fingerprint(), "No parsed PDS3 object, nothing to enrich");
        return Ok(outcome);
    }

    let ids = ids_with_pds3(descriptor, &bundle);
    let fingerprint = descriptor.fingerprint();
    tree.ensure_parents(&ids, &fingerprint)?;

    if let Some(mission) = &bundle.mission {
        let path = tree.mission_dir(&ids).join("catalog.json");
        if let Some(mut catalog) = StacTree::read_json::<Catalog>(&path)? {
            enrich_mission(&mut catalog, mission, &bundle);
            StacTree::write_json(&path, &catalog)?;
        }
    }
    if let Some(host) = &bundle.host {
        let path = tree.host_dir(&ids).join("catalog.json");
        if let Some(mut catalog) = StacTree::read_json::<Catalog>(&path)? {
            enrich_host(&mut catalog, host, &bundle);
            StacTree::write_json(&path, &catalog)?;
        }
    }
    if let Some(instrument) = bundle.instrument_for(&descriptor.iid) {
        let path = tree.instrument_dir(&ids).join("catalog.json");
        if let Some(mut catalog) = StacTree::read_json::<Catalog>(&path)? {
            enrich_instrument(&mut catalog, instrument, &bundle);
            StacTree::write_json(&path, &catalog)?;
        }
    }

    let collection_path = store.stac_dir().join("collection.json");
    let mut collection = match StacTree::read_json::<Collection>(&collection_path)? {
        Some(existing) => existing,
        None => crate::stac::records::collection_from_descriptor(descriptor, &ids),
    };
    if collection.links.is_empty() {
        collection.links = StacTree::collection_links(&ids);
    }
    if let Some(dataset) = bundle.dataset_for(&descriptor.dataset_id) {
        enrich_collection(&mut collection, dataset, &bundle);
    }
    StacTree::write_json(&collection_path, &collection)?;

    outcome.enriched = true;
    info!(
        collection = %fingerprint,
        parsed = outcome.parsed,
        unparsed = outcome.unparsed,
        "PDS3 enrichment complete"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pds3::models::tests::{
        DSMAP_CAT, DS_CAT, INSTHOST_CAT, INST_CAT, MISSION_CAT, REF_CAT, VOLDESC_CAT,
    };
    use crate::report::ErrorCategory;
    use crate::stac::models::rel;

    fn descriptor() -> CollectionDescriptor {
        serde_json::from_value(serde_json::json!({
            "ODEMetaDB": "MARS",
            "IHID": "MGS",
            "IHName": "MARS GLOBAL SURVEYOR",
            "IID": "MOLA",
            "IName": "MARS ORBITER LASER ALTIMETER",
            "PT": "PEDR",
            "PTName": "Precision Experiment Data Records",
            "DataSetId": "MGS-M-MOLA-3-PEDR-L1A-V1.0",
            "NumberProducts": 2,
            "ValidFootprints": "T",
        }))
        .unwrap()
    }

    fn seed_pds3(store: &CollectionStore) {
        store.write_pds3("MISSION.CAT", MISSION_CAT.as_bytes()).unwrap();
        store.write_pds3("INSTHOST.CAT", INSTHOST_CAT.as_bytes()).unwrap();
        store.write_pds3("INST.CAT", INST_CAT.as_bytes()).unwrap();
        store.write_pds3("DS.CAT", DS_CAT.as_bytes()).unwrap();
        store.write_pds3("DSMAP.CAT", DSMAP_CAT.as_bytes()).unwrap();
        store.write_pds3("REF.CAT", REF_CAT.as_bytes()).unwrap();
        store.write_pds3("VOLDESC.CAT", VOLDESC_CAT.as_bytes()).unwrap();
    }

    fn setup() -> (tempfile::TempDir, CollectionStore, StacTree) {
        let dir = tempfile::tempdir().unwrap();
        let store = CollectionStore::open(dir.path(), &descriptor().fingerprint()).unwrap();
        let tree = StacTree::new(dir.path());
        (dir, store, tree)
    }

    #[test]
    fn test_enrichment_builds_the_parent_chain() {
        let (_dir, store, tree) = setup();
        seed_pds3(&store);

        let mut report = CollectionReport::new(descriptor().fingerprint());
        let outcome = transform_pds3(&descriptor(), &store, &tree, &mut report).unwrap();
        assert!(outcome.enriched);
        assert_eq!(outcome.unparsed, 0);
        assert!(report.is_empty());

        let ids = TreeIds::from_descriptor(&descriptor());

        let mission: Catalog = StacTree::read_json(&tree.mission_dir(&ids).join("catalog.json"))
            .unwrap()
            .unwrap();
        assert_eq!(mission.id, "mars-global-surveyor");
        assert_eq!(mission.child_hrefs(), vec!["./mgs/catalog.json"]);
        assert!(mission.description.contains("Mars Global Surveyor"));
        assert_eq!(
            mission.extra.get("mission_start_date"),
            Some(&Value::String("1994-10-12".into()))
        );
        assert!(mission.extra.contains_key("publications"));

        let host: Catalog = StacTree::read_json(&tree.host_dir(&ids).join("catalog.json"))
            .unwrap()
            .unwrap();
        assert_eq!(host.child_hrefs(), vec!["./mola/catalog.json"]);

        let instrument: Catalog =
            StacTree::read_json(&tree.instrument_dir(&ids).join("catalog.json"))
                .unwrap()
                .unwrap();
        assert_eq!(instrument.title.as_deref(), Some("MARS ORBITER LASER ALTIMETER"));
        assert_eq!(instrument.child_hrefs().len(), 1);
        assert!(instrument.child_hrefs()[0].ends_with("stac/collection.json"));

        // Collection temporal extent lies within the mission's active span
        let collection: Collection =
            StacTree::read_json(&store.stac_dir().join("collection.json"))
                .unwrap()
                .unwrap();
        let mission_start = mission.extra["mission_start_date"].as_str().unwrap();
        let collection_start = collection.extent.temporal_start().unwrap();
        assert!(collection_start >= mission_start);
        assert_eq!(collection_start, "1997-09-15T19:10:00Z");
        assert_eq!(collection.extent.temporal_end(), Some("2001-06-30T11:10:59Z"));
        // PDS3 title wins over the descriptor-derived one
        assert_eq!(
            collection.title.as_deref(),
            Some("MGS MOLA PRECISION EXPERIMENT DATA RECORDS")
        );
        // Two dataset producers; the volume's producer is one of them
        assert_eq!(collection.providers.len(), 2);
        assert_eq!(
            collection.extra.get("map_projection_type"),
            Some(&Value::String("SIMPLE CYLINDRICAL".into()))
        );
    }

    #[test]
    fn test_enrichment_is_idempotent() {
        let (_dir, store, tree) = setup();
        seed_pds3(&store);

        let mut report = CollectionReport::new(descriptor().fingerprint());
        transform_pds3(&descriptor(), &store, &tree, &mut report).unwrap();
        let ids = TreeIds::from_descriptor(&descriptor());
        let mission_path = tree.mission_dir(&ids).join("catalog.json");
        let collection_path = store.stac_dir().join("collection.json");
        let first_mission = fs::read(&mission_path).unwrap();
        let first_collection = fs::read(&collection_path).unwrap();

        let mut report = CollectionReport::new(descriptor().fingerprint());
        transform_pds3(&descriptor(), &store, &tree, &mut report).unwrap();
        assert_eq!(fs::read(&mission_path).unwrap(), first_mission);
        assert_eq!(fs::read(&collection_path).unwrap(), first_collection);
    }

    #[test]
    fn test_enrichment_preserves_items() {
        let (_dir, store, tree) = setup();
        seed_pds3(&store);

        // Write one item the records transform would have produced
        let items_dir = store.stac_dir().join("items");
        fs::create_dir_all(&items_dir).unwrap();
        fs::write(items_dir.join("100.json"), b"{\"id\":\"100\"}\n").unwrap();

        let mut report = CollectionReport::new(descriptor().fingerprint());
        transform_pds3(&descriptor(), &store, &tree, &mut report).unwrap();

        assert_eq!(
            fs::read(items_dir.join("100.json")).unwrap(),
            b"{\"id\":\"100\"}\n"
        );
    }

    #[test]
    fn test_unparsed_file_is_reported_and_skipped() {
        let (_dir, store, tree) = setup();
        store.write_pds3("MISSION.CAT", b"OBJECT = MISSION\nbroken").unwrap();
        store.write_pds3("REF.CAT", REF_CAT.as_bytes()).unwrap();

        let mut report = CollectionReport::new(descriptor().fingerprint());
        let outcome = transform_pds3(&descriptor(), &store, &tree, &mut report).unwrap();

        assert_eq!(outcome.unparsed, 1);
        assert!(outcome.enriched);
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].category, ErrorCategory::Parse);

        // The mission catalog stays shallow (descriptor title only)
        let ids = TreeIds::from_descriptor(&descriptor());
        let mission: Catalog = StacTree::read_json(&tree.mission_dir(&ids).join("catalog.json"))
            .unwrap()
            .unwrap();
        assert_eq!(mission.description, "");
        // But the structural links are in place
        assert!(mission.links.iter().any(|l| l.rel == rel::PARENT));
    }
}
