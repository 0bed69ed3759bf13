//! Records-to-STAC transformation
//!
//! Streams a collection's stored record pages and emits one STAC item per
//! record. The collection document is created from the ODE descriptor when
//! absent; parent catalogs are created-or-merged. A malformed page is
//! quarantined and reported, a failing record is skipped and reported, and
//! neither aborts the collection.

use crate::ode::models::{CollectionDescriptor, Record};
use crate::ode::records::stream_pages;
use crate::report::{CollectionReport, ErrorCategory};
use crate::stac::ids::{media_type_for, role_for};
use crate::stac::models::{rel, Asset, Collection, Extent, Item, Link};
use crate::stac::tree::{StacTree, TreeIds};
use crate::store::CollectionStore;
use chrono::NaiveDateTime;
use pdh_common::Result;
use serde_json::Value;
use std::fs;
use tracing::{info, warn};

/// Outcome counters for one collection
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordsOutcome {
    pub items_written: usize,
    pub items_failed: usize,
    pub pages_quarantined: usize,
}

fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Build one STAC item from an ODE record.
///
/// Returns a human-readable reason when the record cannot become an item
/// (no footprint, no usable timestamp).
pub fn record_to_item(record: &Record, ids: &TreeIds) -> std::result::Result<Item, String> {
    let geometry = record
        .geometry()
        .ok_or_else(|| "no usable footprint geometry".to_string())?;
    let bbox = record
        .bbox()
        .ok_or_else(|| "no footprint bounding box".to_string())?;
    let datetime = record
        .datetime()
        .ok_or_else(|| "no usable observation timestamp".to_string())?;

    let mut item = Item::new(record.id(), geometry, bbox.to_vec());
    item.collection = Some(ids.collection_id.clone());
    item.links = StacTree::item_links(&ids.collection_id);

    let properties = &mut item.properties;
    properties.insert("datetime".into(), Value::String(format_datetime(datetime)));
    if let Some(start) = record.start_datetime() {
        properties.insert(
            "start_datetime".into(),
            Value::String(format_datetime(start)),
        );
    }
    if let Some(stop) = record.stop_datetime() {
        properties.insert("end_datetime".into(), Value::String(format_datetime(stop)));
    }
    properties.insert("platform".into(), Value::String(ids.host_title.clone()));
    properties.insert(
        "instruments".into(),
        Value::Array(vec![Value::String(ids.instrument_title.clone())]),
    );
    properties.insert("mission".into(), Value::String(ids.mission_title.clone()));
    properties.insert(
        "ssys:targets".into(),
        Value::Array(vec![Value::String(record.target_name.clone())]),
    );
    properties.insert("pds:product_id".into(), Value::String(record.pdsid.clone()));
    properties.insert("pds:product_type".into(), Value::String(record.pt.clone()));
    if let Some(volume) = &record.pds_volume_id {
        properties.insert("pds:volume_id".into(), Value::String(volume.clone()));
    }
    if let Some(resolution) = record.map_resolution {
        properties.insert("gsd".into(), Value::from(resolution));
    }
    if let Some(ls) = record.solar_longitude {
        properties.insert("solar_longitude".into(), Value::from(ls));
    }
    if let Some(description) = &record.description {
        properties.insert("description".into(), Value::String(description.clone()));
    }

    // One asset per product file, typed by extension
    if let Some(files) = &record.product_files {
        for file in files {
            let Some(url) = &file.url else { continue };
            item.assets.insert(
                file.file_name.clone(),
                Asset {
                    href: url.clone(),
                    title: Some(file.file_name.clone()),
                    description: file.description.clone(),
                    media_type: media_type_for(&file.file_name).map(str::to_string),
                    roles: vec![role_for(&file.file_name).to_string()],
                },
            );
        }
    }
    let url_assets: [(&Option<String>, &str, &str); 3] = [
        (&record.label_url, "label", "metadata"),
        (&record.product_url, "product", "data"),
        (&record.browse, "browse", "overview"),
    ];
    for (url, key, role) in url_assets {
        if let Some(url) = url {
            item.assets.entry(key.to_string()).or_insert_with(|| Asset {
                href: url.clone(),
                title: None,
                description: None,
                media_type: media_type_for(url).map(str::to_string),
                roles: vec![role.to_string()],
            });
        }
    }
    if let Some(url) = &record.thumbnail {
        item.assets.entry("thumbnail".to_string()).or_insert_with(|| Asset {
            href: url.clone(),
            title: None,
            description: None,
            media_type: media_type_for(url).map(str::to_string),
            roles: vec!["thumbnail".to_string()],
        });
    }

    Ok(item)
}

/// Collection document created from the ODE descriptor alone (the shallow
/// state; PDS3 enrichment deepens it later)
pub fn collection_from_descriptor(descriptor: &CollectionDescriptor, ids: &TreeIds) -> Collection {
    let description = if descriptor.ptname.is_empty() {
        format!("{} products", descriptor.pt)
    } else {
        format!("{} products", descriptor.ptname)
    };
    let mut collection = Collection::new(&ids.collection_id, description);
    collection.title = Some(descriptor.dataset_id.clone());

    let mut keywords = descriptor.valid_target_names();
    if keywords.is_empty() {
        keywords.push(descriptor.ode_meta_db.clone());
    }
    collection.keywords = keywords;

    collection.extra.insert(
        "platform".into(),
        Value::String(ids.host_title.clone()),
    );
    collection.extra.insert(
        "instruments".into(),
        Value::Array(vec![Value::String(ids.instrument_title.clone())]),
    );
    collection
        .extra
        .insert("mission".into(), Value::String(ids.mission_title.clone()));

    let (start, stop) = descriptor.temporal_interval();
    collection.extent.temporal.interval = vec![vec![
        start.map(format_datetime),
        stop.map(format_datetime),
    ]];
    collection
}

/// Union of the extents of all item files on disk, merged over `base`
fn extent_from_items(store: &CollectionStore, base: &Extent) -> Result<Extent> {
    let items_dir = store.stac_dir().join("items");
    let mut bbox: Option<[f64; 4]> = base
        .spatial
        .bbox
        .first()
        .filter(|b| b.len() == 4 && b.as_slice() != [-180.0, -90.0, 180.0, 90.0])
        .map(|b| [b[0], b[1], b[2], b[3]]);
    let mut start = base.temporal_start().map(str::to_string);
    let mut stop = base.temporal_end().map(str::to_string);

    if items_dir.is_dir() {
        let mut paths: Vec<_> = fs::read_dir(&items_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().map(|e| e == "json").unwrap_or(false))
            .collect();
        paths.sort();

        for path in paths {
            let Some(item) = StacTree::read_json::<Item>(&path)? else {
                continue;
            };
            if item.bbox.len() == 4 {
                bbox = Some(match bbox {
                    Some(b) => [
                        b[0].min(item.bbox[0]),
                        b[1].min(item.bbox[1]),
                        b[2].max(item.bbox[2]),
                        b[3].max(item.bbox[3]),
                    ],
                    None => [item.bbox[0], item.bbox[1], item.bbox[2], item.bbox[3]],
                });
            }
            // ISO timestamps in a fixed format compare lexicographically
            let item_start = item
                .properties
                .get("start_datetime")
                .and_then(Value::as_str)
                .or_else(|| item.datetime());
            let item_stop = item
                .properties
                .get("end_datetime")
                .and_then(Value::as_str)
                .or_else(|| item.datetime());
            if let Some(s) = item_start {
                start = Some(match start {
                    Some(current) if current.as_str() <= s => current,
                    _ => s.to_string(),
                });
            }
            if let Some(s) = item_stop {
                stop = Some(match stop {
                    Some(current) if current.as_str() >= s => current,
                    _ => s.to_string(),
                });
            }
        }
    }

    Ok(Extent {
        spatial: crate::stac::models::SpatialExtent {
            bbox: vec![bbox
                .map(|b| b.to_vec())
                .unwrap_or_else(|| vec![-180.0, -90.0, 180.0, 90.0])],
        },
        temporal: crate::stac::models::TemporalExtent {
            interval: vec![vec![start, stop]],
        },
    })
}

/// Item links regenerated from the files actually present on disk
fn item_links_from_disk(store: &CollectionStore) -> Result<Vec<Link>> {
    let items_dir = store.stac_dir().join("items");
    let mut names = Vec::new();
    if items_dir.is_dir() {
        for entry in fs::read_dir(&items_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(".json") {
                names.push(name);
            }
        }
    }
    names.sort();
    Ok(names
        .into_iter()
        .map(|name| Link::new(rel::ITEM, format!("./items/{}", name)))
        .collect())
}

/// Transform all stored record pages of one collection into STAC items.
pub fn transform_records(
    descriptor: &CollectionDescriptor,
    store: &CollectionStore,
    tree: &StacTree,
    report: &mut CollectionReport,
) -> Result<RecordsOutcome> {
    let ids = TreeIds::from_descriptor(descriptor);
    let fingerprint = descriptor.fingerprint();
    tree.ensure_parents(&ids, &fingerprint)?;

    let collection_path = store.stac_dir().join("collection.json");
    let mut collection = match StacTree::read_json::<Collection>(&collection_path)? {
        Some(existing) => existing,
        None => collection_from_descriptor(descriptor, &ids),
    };

    let mut outcome = RecordsOutcome::default();
    let items_dir = store.stac_dir().join("items");

    let pages: Vec<(usize, Result<Vec<Record>>)> = stream_pages(store)?.collect();
    for (index, decoded) in pages {
        let records = match decoded {
            Ok(records) => records,
            Err(err) => {
                store.quarantine_page(index, &err.to_string())?;
                report.add_error(CollectionStore::page_filename(index), &err);
                outcome.pages_quarantined += 1;
                continue;
            },
        };
        for record in records {
            match record_to_item(&record, &ids) {
                Ok(item) => {
                    let path = items_dir.join(format!("{}.json", item.id));
                    StacTree::write_json(&path, &item)?;
                    outcome.items_written += 1;
                },
                Err(reason) => {
                    warn!(ode_id = %record.ode_id, reason = %reason, "Record skipped");
                    report.add(ErrorCategory::Malformed, record.ode_id.clone(), reason);
                    outcome.items_failed += 1;
                },
            }
        }
    }

    // Links and extents are regenerated from the on-disk state, so reruns
    // produce identical documents
    collection.extent = extent_from_items(store, &collection.extent)?;
    let mut links = StacTree::collection_links(&ids);
    links.extend(item_links_from_disk(store)?);
    collection.links = links;
    StacTree::write_json(&collection_path, &collection)?;

    info!(
        collection = %fingerprint,
        items = outcome.items_written,
        failed = outcome.items_failed,
        quarantined = outcome.pages_quarantined,
        "Records transformed"
    );
    Ok(outcome)
}
