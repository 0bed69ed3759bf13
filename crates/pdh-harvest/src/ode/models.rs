//! Typed models for ODE web service responses
//!
//! The ODE service reports almost every value as a JSON string, including
//! counts and coordinates, and collapses single-element arrays into bare
//! objects. The deserializers here absorb both quirks so the rest of the
//! pipeline works with real types.

use chrono::NaiveDateTime;
use pdh_common::{Fingerprint, HarvestError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Accepted textual timestamp layouts (ODE mixes all of these)
const UTC_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%d",
];

/// Parse one of the ODE timestamp layouts
pub fn parse_utc(value: &str) -> Option<NaiveDateTime> {
    for format in UTC_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    // Date-only values carry no time component
    if let Ok(date) = chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    None
}

/// Lenient deserializers for ODE's stringly-typed numbers and flags
mod flex {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn opt_i64<'de, D: Deserializer<'de>>(de: D) -> Result<Option<i64>, D::Error> {
        let value = Option::<Value>::deserialize(de)?;
        Ok(value.and_then(|v| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }))
    }

    pub fn i64_or_zero<'de, D: Deserializer<'de>>(de: D) -> Result<i64, D::Error> {
        Ok(opt_i64(de)?.unwrap_or(0))
    }

    pub fn opt_f64<'de, D: Deserializer<'de>>(de: D) -> Result<Option<f64>, D::Error> {
        let value = Option::<Value>::deserialize(de)?;
        Ok(value.and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }))
    }
}

/// One collection descriptor from the iipt discovery endpoint.
///
/// ODE presents products on an instrument host / instrument / product type
/// structure; a descriptor corresponds to one such tuple plus its dataset
/// id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    /// ODE meta database, usable as a target input (e.g. `MARS`)
    #[serde(rename = "ODEMetaDB")]
    pub ode_meta_db: String,

    /// Instrument host id (e.g. `MGS`)
    #[serde(rename = "IHID")]
    pub ihid: String,

    /// Instrument host name
    #[serde(rename = "IHName", default)]
    pub ihname: String,

    /// Instrument id (e.g. `MOLA`)
    #[serde(rename = "IID")]
    pub iid: String,

    /// Instrument name
    #[serde(rename = "IName", default)]
    pub iname: String,

    /// Product type id
    #[serde(rename = "PT")]
    pub pt: String,

    /// Product type name
    #[serde(rename = "PTName", default)]
    pub ptname: String,

    /// PDS data set id
    #[serde(rename = "DataSetId")]
    pub dataset_id: String,

    /// Number of products in this set
    #[serde(rename = "NumberProducts", deserialize_with = "flex::i64_or_zero")]
    pub number_products: i64,

    /// `T` when the products carry valid footprints
    #[serde(rename = "ValidFootprints", default)]
    pub valid_footprints: Option<String>,

    /// Valid values for the Target query parameter
    #[serde(rename = "ValidTargets", default, skip_serializing_if = "Option::is_none")]
    pub valid_targets: Option<Value>,

    /// Earliest observation time over all products
    #[serde(rename = "MinObservationTime", default)]
    pub min_observation_time: Option<String>,

    /// Latest observation time over all products
    #[serde(rename = "MaxObservationTime", default)]
    pub max_observation_time: Option<String>,

    #[serde(rename = "NumberObservations", default, deserialize_with = "flex::opt_i64")]
    pub number_observations: Option<i64>,

    #[serde(rename = "MinOrbit", default, deserialize_with = "flex::opt_i64")]
    pub min_orbit: Option<i64>,

    #[serde(rename = "MaxOrbit", default, deserialize_with = "flex::opt_i64")]
    pub max_orbit: Option<i64>,
}

impl CollectionDescriptor {
    /// A descriptor is georeferenced iff its footprint-valid flag is truthy
    /// and it holds at least one product. Only georeferenced descriptors
    /// are retained by discovery.
    pub fn is_georeferenced(&self) -> bool {
        let footprints_valid = matches!(
            self.valid_footprints.as_deref().map(str::trim),
            Some("T") | Some("t") | Some("Y") | Some("y") | Some("true") | Some("True")
        );
        footprints_valid && self.number_products > 0
    }

    /// Collection identity used for every storage key
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(
            &self.ode_meta_db,
            &self.ihid,
            &self.ihid,
            &self.iid,
            &self.dataset_id,
        )
    }

    /// Number of record pages at the given page size
    pub fn page_count(&self, page_size: usize) -> usize {
        if self.number_products <= 0 {
            return 0;
        }
        (self.number_products as usize).div_ceil(page_size)
    }

    /// Bounding observation times, when both ends parse
    pub fn temporal_interval(&self) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
        let start = self.min_observation_time.as_deref().and_then(parse_utc);
        let stop = self.max_observation_time.as_deref().and_then(parse_utc);
        (start, stop)
    }

    /// Valid target names for this set
    pub fn valid_target_names(&self) -> Vec<String> {
        match &self.valid_targets {
            Some(Value::Object(map)) => match map.get("ValidTarget") {
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
                Some(Value::String(s)) => vec![s.clone()],
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }
}

/// Decode the iipt discovery envelope into descriptors.
///
/// Malformed entries are skipped with a warning; the caller applies the
/// georeferenced filter.
pub fn decode_discovery_response(body: &[u8]) -> Result<Vec<CollectionDescriptor>> {
    let root: Value = serde_json::from_slice(body)?;
    let sets = root
        .pointer("/ODEResults/IIPTSets/IIPTSet")
        .ok_or_else(|| {
            HarvestError::malformed("discovery response", "missing ODEResults.IIPTSets.IIPTSet")
        })?;

    let entries: Vec<Value> = match sets {
        Value::Array(items) => items.clone(),
        // A single-set response is served as a bare object
        other => vec![other.clone()],
    };

    let mut descriptors = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<CollectionDescriptor>(entry.clone()) {
            Ok(descriptor) => descriptors.push(descriptor),
            Err(err) => {
                warn!(error = %err, "Skipping malformed IIPTSet entry");
            },
        }
    }
    Ok(descriptors)
}

/// One file belonging to an observational product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFile {
    #[serde(rename = "FileName")]
    pub file_name: String,

    #[serde(rename = "Type", default)]
    pub kind: Option<String>,

    #[serde(rename = "KBytes", default, deserialize_with = "flex::opt_f64")]
    pub kbytes: Option<f64>,

    #[serde(rename = "URL", default)]
    pub url: Option<String>,

    #[serde(rename = "Description", default)]
    pub description: Option<String>,

    #[serde(rename = "Creation_date", default)]
    pub creation_date: Option<String>,
}

/// One observational product from the records endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Internal ODE product identifier; stable enough to serve as item id
    pub ode_id: String,

    /// PDS product id
    pub pdsid: String,

    pub ihid: String,
    pub iid: String,
    pub pt: String,

    #[serde(rename = "Target_name")]
    pub target_name: String,

    #[serde(rename = "Data_Set_Id")]
    pub dataset_id: String,

    #[serde(rename = "LabelFileName", default)]
    pub label_file_name: Option<String>,

    #[serde(rename = "Product_creation_time", default)]
    pub product_creation_time: Option<String>,

    #[serde(rename = "Product_release_date", default)]
    pub product_release_date: Option<String>,

    #[serde(rename = "Observation_time", default)]
    pub observation_time: Option<String>,

    #[serde(rename = "UTC_start_time", default)]
    pub utc_start_time: Option<String>,

    #[serde(rename = "UTC_stop_time", default)]
    pub utc_stop_time: Option<String>,

    #[serde(rename = "PDSVolume_Id", default)]
    pub pds_volume_id: Option<String>,

    #[serde(rename = "Easternmost_longitude", default, deserialize_with = "flex::opt_f64")]
    pub easternmost_longitude: Option<f64>,

    #[serde(rename = "Westernmost_longitude", default, deserialize_with = "flex::opt_f64")]
    pub westernmost_longitude: Option<f64>,

    #[serde(rename = "Maximum_latitude", default, deserialize_with = "flex::opt_f64")]
    pub maximum_latitude: Option<f64>,

    #[serde(rename = "Minimum_latitude", default, deserialize_with = "flex::opt_f64")]
    pub minimum_latitude: Option<f64>,

    #[serde(rename = "Center_latitude", default, deserialize_with = "flex::opt_f64")]
    pub center_latitude: Option<f64>,

    #[serde(rename = "Center_longitude", default, deserialize_with = "flex::opt_f64")]
    pub center_longitude: Option<f64>,

    #[serde(rename = "Start_orbit_number", default, deserialize_with = "flex::opt_i64")]
    pub start_orbit_number: Option<i64>,

    #[serde(rename = "Stop_orbit_number", default, deserialize_with = "flex::opt_i64")]
    pub stop_orbit_number: Option<i64>,

    #[serde(rename = "Map_resolution", default, deserialize_with = "flex::opt_f64")]
    pub map_resolution: Option<f64>,

    #[serde(rename = "Map_scale", default, deserialize_with = "flex::opt_f64")]
    pub map_scale: Option<f64>,

    #[serde(rename = "Solar_longitude", default, deserialize_with = "flex::opt_f64")]
    pub solar_longitude: Option<f64>,

    /// Longitude -180..180 footprint in WKT, when valid
    #[serde(rename = "Footprint_C0_geometry", default)]
    pub footprint_c0_geometry: Option<String>,

    /// Longitude 0..360 cylindrical footprint in WKT, when valid
    #[serde(rename = "Footprint_geometry", default)]
    pub footprint_geometry: Option<String>,

    #[serde(rename = "Description", default)]
    pub description: Option<String>,

    #[serde(rename = "LabelURL", default)]
    pub label_url: Option<String>,

    #[serde(rename = "ProductURL", default)]
    pub product_url: Option<String>,

    #[serde(rename = "FilesURL", default)]
    pub files_url: Option<String>,

    #[serde(rename = "External_url", default)]
    pub external_url: Option<String>,

    #[serde(rename = "Product_files", default, deserialize_with = "product_files")]
    pub product_files: Option<Vec<ProductFile>>,

    /// Browse image URL, when ODE has one
    #[serde(default)]
    pub browse: Option<String>,

    /// Thumbnail image URL, when ODE has one
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// `Product_files` nests a `Product_file` that is an array or a bare object
fn product_files<'de, D>(de: D) -> std::result::Result<Option<Vec<ProductFile>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(de)?;
    let Some(value) = value else {
        return Ok(None);
    };
    let inner = match value.get("Product_file") {
        Some(inner) => inner.clone(),
        None => return Ok(None),
    };
    let entries = match inner {
        Value::Array(items) => items,
        other => vec![other],
    };
    let files = entries
        .into_iter()
        .filter_map(|v| serde_json::from_value::<ProductFile>(v).ok())
        .collect::<Vec<_>>();
    Ok(Some(files))
}

impl Record {
    /// Item identifier within the collection
    pub fn id(&self) -> &str {
        &self.ode_id
    }

    /// Observation timestamp: the observation time when present and sane,
    /// else product creation time, else release date.
    pub fn datetime(&self) -> Option<NaiveDateTime> {
        let usable = |value: &Option<String>| {
            value
                .as_deref()
                .filter(|v| !v.starts_with("0000"))
                .and_then(parse_utc)
        };
        usable(&self.observation_time)
            .or_else(|| usable(&self.product_creation_time))
            .or_else(|| usable(&self.product_release_date))
    }

    pub fn start_datetime(&self) -> Option<NaiveDateTime> {
        self.utc_start_time.as_deref().and_then(parse_utc)
    }

    pub fn stop_datetime(&self) -> Option<NaiveDateTime> {
        self.utc_stop_time.as_deref().and_then(parse_utc)
    }

    /// Footprint bounding box `[west, south, east, north]`
    pub fn bbox(&self) -> Option<[f64; 4]> {
        Some([
            self.westernmost_longitude?,
            self.minimum_latitude?,
            self.easternmost_longitude?,
            self.maximum_latitude?,
        ])
    }

    /// GeoJSON geometry for the footprint.
    ///
    /// Prefers the -180..180 WKT footprint; falls back to a polygon built
    /// from the bounding box when the WKT is missing or does not parse.
    pub fn geometry(&self) -> Option<Value> {
        if let Some(wkt) = &self.footprint_c0_geometry {
            if let Some(geometry) = wkt::parse_geometry(wkt) {
                return Some(geometry);
            }
        }
        let [west, south, east, north] = self.bbox()?;
        Some(serde_json::json!({
            "type": "Polygon",
            "coordinates": [[
                [west, south],
                [east, south],
                [east, north],
                [west, north],
                [west, south],
            ]],
        }))
    }
}

/// Decode one raw records page.
///
/// Returns the contained records; an empty page (`Count == "0"`) decodes to
/// an empty vector. A body that is not the expected JSON envelope is a
/// malformed-response error so the transform phase can quarantine the file.
pub fn decode_records_page(file: &str, body: &[u8]) -> Result<Vec<Record>> {
    let root: Value = serde_json::from_slice(body)
        .map_err(|err| HarvestError::malformed(file, err.to_string()))?;

    let results = root
        .get("ODEResults")
        .ok_or_else(|| HarvestError::malformed(file, "missing ODEResults"))?;

    if results.get("Count").and_then(Value::as_str) == Some("0") {
        return Ok(Vec::new());
    }

    let products = results
        .pointer("/Products/Product")
        .ok_or_else(|| HarvestError::malformed(file, "missing Products.Product"))?;

    let entries: Vec<Value> = match products {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    };

    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<Record>(entry) {
            Ok(record) => {
                // Products without a footprint cannot become items
                if record.footprint_geometry.is_some() || record.footprint_c0_geometry.is_some() {
                    records.push(record);
                } else {
                    warn!(ode_id = %record.ode_id, "Record has no footprint, skipped");
                }
            },
            Err(err) => {
                warn!(file = %file, error = %err, "Skipping malformed record");
            },
        }
    }
    Ok(records)
}

/// Minimal WKT reader for the footprint shapes ODE serves
/// (`POLYGON ((...))` and `MULTIPOLYGON (((...)))`).
pub mod wkt {
    use serde_json::{json, Value};

    /// Parse a WKT polygon or multipolygon into GeoJSON geometry
    pub fn parse_geometry(text: &str) -> Option<Value> {
        let trimmed = text.trim();
        let upper = trimmed.to_uppercase();
        if let Some(rest) = upper.strip_prefix("MULTIPOLYGON") {
            let body = &trimmed[trimmed.len() - rest.len()..];
            let polygons = split_groups(strip_parens(body)?)?
                .into_iter()
                .map(|group| parse_rings(strip_parens(&group)?))
                .collect::<Option<Vec<_>>>()?;
            Some(json!({"type": "MultiPolygon", "coordinates": polygons}))
        } else if let Some(rest) = upper.strip_prefix("POLYGON") {
            let body = &trimmed[trimmed.len() - rest.len()..];
            let rings = parse_rings(strip_parens(body)?)?;
            Some(json!({"type": "Polygon", "coordinates": rings}))
        } else {
            None
        }
    }

    /// Strip one balanced outer parenthesis pair
    fn strip_parens(text: &str) -> Option<&str> {
        let trimmed = text.trim();
        let inner = trimmed.strip_prefix('(')?.strip_suffix(')')?;
        Some(inner)
    }

    /// Split `(a), (b), (c)` into the parenthesized groups
    fn split_groups(text: &str) -> Option<Vec<String>> {
        let mut groups = Vec::new();
        let mut depth = 0usize;
        let mut current = String::new();
        for ch in text.chars() {
            match ch {
                '(' => {
                    depth += 1;
                    current.push(ch);
                },
                ')' => {
                    depth = depth.checked_sub(1)?;
                    current.push(ch);
                    if depth == 0 {
                        groups.push(current.trim().to_string());
                        current.clear();
                    }
                },
                ',' if depth == 0 => {},
                _ => {
                    if depth > 0 {
                        current.push(ch);
                    }
                },
            }
        }
        if depth != 0 {
            return None;
        }
        Some(groups)
    }

    /// Parse `(x y, x y, ...), (...)` into GeoJSON rings
    fn parse_rings(text: &str) -> Option<Vec<Vec<[f64; 2]>>> {
        let groups = if text.trim_start().starts_with('(') {
            split_groups(text)?
                .into_iter()
                .map(|g| strip_parens(&g).map(str::to_string))
                .collect::<Option<Vec<_>>>()?
        } else {
            vec![text.to_string()]
        };

        let mut rings = Vec::with_capacity(groups.len());
        for group in groups {
            let mut ring = Vec::new();
            for pair in group.split(',') {
                let mut numbers = pair.split_whitespace();
                let lon: f64 = numbers.next()?.parse().ok()?;
                let lat: f64 = numbers.next()?.parse().ok()?;
                ring.push([lon, lat]);
            }
            if ring.len() < 4 {
                return None;
            }
            rings.push(ring);
        }
        Some(rings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(valid: &str, products: i64) -> CollectionDescriptor {
        serde_json::from_value(serde_json::json!({
            "ODEMetaDB": "MARS",
            "IHID": "MGS",
            "IHName": "Mars Global Surveyor",
            "IID": "MOLA",
            "IName": "Mars Orbiter Laser Altimeter",
            "PT": "PEDR",
            "PTName": "PEDR products",
            "DataSetId": "MGS-M-MOLA-3-PEDR-L1A-V1.0",
            "NumberProducts": products.to_string(),
            "ValidFootprints": valid,
        }))
        .unwrap()
    }

    #[test]
    fn test_georeferenced_filter() {
        // valid + positive
        assert!(descriptor("T", 1000).is_georeferenced());
        // valid + zero
        assert!(!descriptor("T", 0).is_georeferenced());
        // invalid + positive
        assert!(!descriptor("F", 1000).is_georeferenced());
    }

    #[test]
    fn test_fingerprint_mapping() {
        let fp = descriptor("T", 1000).fingerprint();
        assert_eq!(fp.target, "MARS");
        assert_eq!(fp.mission, "MGS");
        assert_eq!(fp.host, "MGS");
        assert_eq!(fp.instrument, "MOLA");
        assert_eq!(fp.dataset_id, "MGS-M-MOLA-3-PEDR-L1A-V1.0");
    }

    #[test]
    fn test_page_count() {
        assert_eq!(descriptor("T", 1000).page_count(100), 10);
        assert_eq!(descriptor("T", 1001).page_count(100), 11);
        assert_eq!(descriptor("T", 99).page_count(100), 1);
        assert_eq!(descriptor("T", 0).page_count(100), 0);
    }

    #[test]
    fn test_decode_discovery_response() {
        let body = serde_json::json!({
            "ODEResults": {"IIPTSets": {"IIPTSet": [
                {
                    "ODEMetaDB": "MARS", "IHID": "MGS", "IID": "MOLA",
                    "PT": "PEDR", "DataSetId": "MGS-M-MOLA-3-PEDR-L1A-V1.0",
                    "NumberProducts": "1000", "ValidFootprints": "T"
                },
                {"garbage": true}
            ]}}
        });
        let descriptors = decode_discovery_response(body.to_string().as_bytes()).unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].number_products, 1000);
    }

    #[test]
    fn test_decode_discovery_single_object() {
        let body = serde_json::json!({
            "ODEResults": {"IIPTSets": {"IIPTSet":
                {
                    "ODEMetaDB": "MOON", "IHID": "LRO", "IID": "LOLA",
                    "PT": "RDR", "DataSetId": "LRO-L-LOLA-4-GDR-V1.0",
                    "NumberProducts": 7, "ValidFootprints": "T"
                }
            }}
        });
        let descriptors = decode_discovery_response(body.to_string().as_bytes()).unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].iid, "LOLA");
    }

    fn sample_record() -> serde_json::Value {
        serde_json::json!({
            "ode_id": "12345",
            "pdsid": "AP00001L",
            "ihid": "MGS",
            "iid": "MOLA",
            "pt": "PEDR",
            "Target_name": "MARS",
            "Data_Set_Id": "MGS-M-MOLA-3-PEDR-L1A-V1.0",
            "Easternmost_longitude": "10.5",
            "Westernmost_longitude": "10.0",
            "Maximum_latitude": "45.5",
            "Minimum_latitude": "45.0",
            "UTC_start_time": "1997-09-15T19:10:00",
            "UTC_stop_time": "1997-09-15T19:33:00",
            "Observation_time": "1997-09-15T19:21:30",
            "PDSVolume_Id": "MGSL_0001",
            "Footprint_C0_geometry": "POLYGON ((10.0 45.0, 10.5 45.0, 10.5 45.5, 10.0 45.5, 10.0 45.0))",
            "Footprint_geometry": "POLYGON ((10.0 45.0, 10.5 45.0, 10.5 45.5, 10.0 45.5, 10.0 45.0))",
            "Product_files": {"Product_file": [
                {"FileName": "AP00001L.B", "Type": "Product", "URL": "https://pds/ap00001l.b", "KBytes": "123.4"},
                {"FileName": "AP00001L.LBL", "Type": "Label", "URL": "https://pds/ap00001l.lbl"}
            ]}
        })
    }

    #[test]
    fn test_decode_records_page() {
        let body = serde_json::json!({
            "ODEResults": {
                "Count": "1",
                "Products": {"Product": sample_record()}
            }
        });
        let records = decode_records_page("page_000.json", body.to_string().as_bytes()).unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.id(), "12345");
        assert_eq!(record.bbox(), Some([10.0, 45.0, 10.5, 45.5]));
        assert_eq!(record.product_files.as_ref().unwrap().len(), 2);
        assert_eq!(
            record.datetime().unwrap().format("%Y-%m-%dT%H:%M:%S").to_string(),
            "1997-09-15T19:21:30"
        );
    }

    #[test]
    fn test_decode_empty_page() {
        let body = serde_json::json!({"ODEResults": {"Count": "0"}});
        let records = decode_records_page("page_003.json", body.to_string().as_bytes()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_decode_non_json_page_is_malformed() {
        let err = decode_records_page("page_000.json", b"<html>oops</html>").unwrap_err();
        assert!(matches!(err, HarvestError::Malformed { .. }));
    }

    #[test]
    fn test_record_roundtrip() {
        let record: Record = serde_json::from_value(sample_record()).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(record, back);
    }

    #[test]
    fn test_wkt_polygon() {
        let geometry = wkt::parse_geometry(
            "POLYGON ((10.0 45.0, 10.5 45.0, 10.5 45.5, 10.0 45.5, 10.0 45.0))",
        )
        .unwrap();
        assert_eq!(geometry["type"], "Polygon");
        assert_eq!(geometry["coordinates"][0][0][0], 10.0);
        assert_eq!(geometry["coordinates"][0][2][1], 45.5);
    }

    #[test]
    fn test_wkt_multipolygon() {
        let geometry = wkt::parse_geometry(
            "MULTIPOLYGON (((0 0, 1 0, 1 1, 0 0)), ((5 5, 6 5, 6 6, 5 5)))",
        )
        .unwrap();
        assert_eq!(geometry["type"], "MultiPolygon");
        assert_eq!(geometry["coordinates"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_wkt_rejects_garbage() {
        assert!(wkt::parse_geometry("LINESTRING (0 0, 1 1)").is_none());
        assert!(wkt::parse_geometry("POLYGON ((0 0, 1 1))").is_none());
        assert!(wkt::parse_geometry("not wkt at all").is_none());
    }

    #[test]
    fn test_geometry_falls_back_to_bbox() {
        let mut record: Record = serde_json::from_value(sample_record()).unwrap();
        record.footprint_c0_geometry = Some("corrupt".to_string());
        let geometry = record.geometry().unwrap();
        assert_eq!(geometry["type"], "Polygon");
        // 5 points: closed ring from the bbox corners
        assert_eq!(geometry["coordinates"][0].as_array().unwrap().len(), 5);
    }
}
