//! STAC 1.0 document models
//!
//! Hand-rolled serde structs for the three node payloads the pipeline
//! writes (catalog, collection, item). Field order is fixed by the struct
//! definitions and maps use `BTreeMap`, so serializing the same document
//! twice yields identical bytes, which the idempotence guarantees rely on.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const STAC_VERSION: &str = "1.0.0";
pub const LICENSE: &str = "CC0-1.0";

/// Link relation names used by the tree
pub mod rel {
    pub const ROOT: &str = "root";
    pub const PARENT: &str = "parent";
    pub const CHILD: &str = "child";
    pub const ITEM: &str = "item";
    pub const COLLECTION: &str = "collection";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Link {
    pub fn new(rel: &str, href: impl Into<String>) -> Self {
        Self {
            rel: rel.to_string(),
            href: href.into(),
            media_type: Some("application/json".to_string()),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(rename = "type")]
    pub type_field: String,
    pub stac_version: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub description: String,
    pub links: Vec<Link>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Catalog {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            type_field: "Catalog".to_string(),
            stac_version: STAC_VERSION.to_string(),
            id: id.into(),
            title: None,
            description: description.into(),
            links: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Hrefs of this catalog's child links
    pub fn child_hrefs(&self) -> Vec<&str> {
        self.links
            .iter()
            .filter(|link| link.rel == rel::CHILD)
            .map(|link| link.href.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialExtent {
    pub bbox: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalExtent {
    pub interval: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub spatial: SpatialExtent,
    pub temporal: TemporalExtent,
}

impl Extent {
    /// Whole-body bbox with an open temporal interval
    pub fn unbounded() -> Self {
        Self {
            spatial: SpatialExtent {
                bbox: vec![vec![-180.0, -90.0, 180.0, 90.0]],
            },
            temporal: TemporalExtent {
                interval: vec![vec![None, None]],
            },
        }
    }

    pub fn temporal_start(&self) -> Option<&str> {
        self.temporal.interval.first()?.first()?.as_deref()
    }

    pub fn temporal_end(&self) -> Option<&str> {
        self.temporal.interval.first()?.get(1)?.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Provider {
    pub fn new(name: impl Into<String>, role: &str) -> Self {
        Self {
            name: name.into(),
            roles: vec![role.to_string()],
            url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(rename = "type")]
    pub type_field: String,
    pub stac_version: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub description: String,
    pub license: String,
    pub extent: Extent,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<Provider>,
    pub links: Vec<Link>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Collection {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            type_field: "Collection".to_string(),
            stac_version: STAC_VERSION.to_string(),
            id: id.into(),
            title: None,
            description: description.into(),
            license: LICENSE.to_string(),
            extent: Extent::unbounded(),
            keywords: Vec::new(),
            providers: Vec::new(),
            links: Vec::new(),
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "type")]
    pub type_field: String,
    pub stac_version: String,
    pub id: String,
    pub geometry: Value,
    pub bbox: Vec<f64>,
    pub properties: BTreeMap<String, Value>,
    pub links: Vec<Link>,
    pub assets: BTreeMap<String, Asset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl Item {
    pub fn new(id: impl Into<String>, geometry: Value, bbox: Vec<f64>) -> Self {
        Self {
            type_field: "Feature".to_string(),
            stac_version: STAC_VERSION.to_string(),
            id: id.into(),
            geometry,
            bbox,
            properties: BTreeMap::new(),
            links: Vec::new(),
            assets: BTreeMap::new(),
            collection: None,
        }
    }

    pub fn datetime(&self) -> Option<&str> {
        self.properties.get("datetime")?.as_str()
    }
}
