//! Typed models for the eight PDS3 catalog classes
//!
//! Each variant keeps its recognized keywords as typed fields, everything
//! else in an `extra` map, and unrecognized sub-blocks opaquely. All models
//! serialize to a canonical JSON form, and every variant can pretty-print
//! itself back to ODL (`to_odl`), which is what the round-trip tests
//! exercise.

use super::ast::{ObjectBlock, Value};
use super::dates::PdsDate;
use super::factory::CatalogKind;
use pdh_common::{HarvestError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

type Extra = BTreeMap<String, Value>;

// ---------------------------------------------------------------------
// Extraction helpers
// ---------------------------------------------------------------------

fn missing(file: &str, block: &ObjectBlock, what: &str) -> HarvestError {
    HarvestError::parse(
        file,
        block.line.max(1),
        1,
        format!("missing required {} in OBJECT = {}", what, block.name),
    )
}

fn take_req_text(block: &mut ObjectBlock, key: &str, file: &str) -> Result<String> {
    let line = block.line.max(1);
    let name = block.name.clone();
    block
        .take(key)
        .map(|value| value.display_text())
        .ok_or_else(|| {
            HarvestError::parse(
                file,
                line,
                1,
                format!("missing required {} in OBJECT = {}", key, name),
            )
        })
}

/// Optional text; the explicit unknown value decodes to `None`
fn take_opt_text(block: &mut ObjectBlock, key: &str) -> Option<String> {
    match block.take(key) {
        Some(Value::Unknown) | None => None,
        Some(value) => Some(value.display_text()),
    }
}

/// Optional date; non-date text is preserved under `extra` instead
fn take_opt_date(block: &mut ObjectBlock, key: &str) -> Option<PdsDate> {
    match block.take(key) {
        Some(Value::Date(date)) => Some(date),
        Some(Value::Unknown) | None => None,
        Some(other) => {
            block.properties.insert(key.to_string(), other);
            None
        },
    }
}

/// Scalar-or-list value flattened to strings
fn take_text_list(block: &mut ObjectBlock, key: &str) -> Vec<String> {
    match block.take(key) {
        Some(Value::List(items)) => items.iter().map(Value::display_text).collect(),
        Some(Value::Unknown) | None => Vec::new(),
        Some(value) => vec![value.display_text()],
    }
}

/// `REFERENCE_KEY_ID` from one reference-info sub-block
fn reference_key(mut block: ObjectBlock, file: &str) -> Result<String> {
    take_req_text(&mut block, "REFERENCE_KEY_ID", file)
}

fn text_list_value(items: &[String]) -> Value {
    if items.len() == 1 {
        Value::Text(items[0].clone())
    } else {
        Value::List(items.iter().cloned().map(Value::Text).collect())
    }
}

fn reference_block(name: &str, key: &str) -> ObjectBlock {
    let mut block = ObjectBlock::new(name);
    block
        .properties
        .insert("REFERENCE_KEY_ID".to_string(), Value::Text(key.to_string()));
    block
}

// ---------------------------------------------------------------------
// ODL writer
// ---------------------------------------------------------------------

/// Pretty-printer producing text the grammars accept back
pub mod odl {
    use super::super::ast::{ObjectBlock, Value};

    pub fn write_document(objects: &[ObjectBlock]) -> String {
        let mut out = String::from("PDS_VERSION_ID = PDS3\n\n");
        for object in objects {
            write_block(&mut out, object, 0);
            out.push('\n');
        }
        out.push_str("END\n");
        out
    }

    fn indent(out: &mut String, depth: usize) {
        for _ in 0..depth {
            out.push_str("  ");
        }
    }

    fn write_block(out: &mut String, block: &ObjectBlock, depth: usize) {
        indent(out, depth);
        out.push_str(&format!("OBJECT = {}\n", block.name));
        for (key, value) in &block.properties {
            indent(out, depth + 1);
            out.push_str(&format!("{} = {}\n", key, format_value(value)));
        }
        for child in &block.children {
            write_block(out, child, depth + 1);
        }
        indent(out, depth);
        out.push_str(&format!("END_OBJECT = {}\n", block.name));
    }

    pub fn format_value(value: &Value) -> String {
        match value {
            Value::Text(text) => format!("\"{}\"", text),
            Value::Integer(int) => int.to_string(),
            // Keep a decimal point so the value classifies as a real again
            Value::Real(real) => {
                if real.fract() == 0.0 && real.is_finite() {
                    format!("{:.1}", real)
                } else {
                    real.to_string()
                }
            },
            Value::Date(date) => date.to_string(),
            Value::Unknown => "UNK".to_string(),
            Value::List(items) => {
                let inner = items
                    .iter()
                    .map(format_value)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({})", inner)
            },
        }
    }
}

// ---------------------------------------------------------------------
// Mission
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionInformation {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objectives_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<PdsDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_date: Option<PdsDate>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
}

impl MissionInformation {
    fn from_block(mut block: ObjectBlock, file: &str) -> Result<Self> {
        Ok(Self {
            description: take_req_text(&mut block, "MISSION_DESC", file)?,
            alias_name: take_opt_text(&mut block, "MISSION_ALIAS_NAME"),
            objectives_summary: take_opt_text(&mut block, "MISSION_OBJECTIVES_SUMMARY"),
            start_date: take_opt_date(&mut block, "MISSION_START_DATE"),
            stop_date: take_opt_date(&mut block, "MISSION_STOP_DATE"),
            extra: block.properties,
        })
    }

    fn to_block(&self) -> ObjectBlock {
        let mut block = ObjectBlock::new("MISSION_INFORMATION");
        block
            .properties
            .insert("MISSION_DESC".into(), Value::Text(self.description.clone()));
        if let Some(alias) = &self.alias_name {
            block
                .properties
                .insert("MISSION_ALIAS_NAME".into(), Value::Text(alias.clone()));
        }
        if let Some(summary) = &self.objectives_summary {
            block.properties.insert(
                "MISSION_OBJECTIVES_SUMMARY".into(),
                Value::Text(summary.clone()),
            );
        }
        if let Some(date) = self.start_date {
            block
                .properties
                .insert("MISSION_START_DATE".into(), Value::Date(date));
        }
        if let Some(date) = self.stop_date {
            block
                .properties
                .insert("MISSION_STOP_DATE".into(), Value::Date(date));
        }
        block.properties.extend(self.extra.clone());
        block
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionHost {
    pub instrument_host_id: String,
    /// Target bodies; at least one is required
    pub targets: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
}

impl MissionHost {
    fn from_block(mut block: ObjectBlock, file: &str) -> Result<Self> {
        let instrument_host_id = take_req_text(&mut block, "INSTRUMENT_HOST_ID", file)?;
        let mut targets = Vec::new();
        for mut child in std::mem::take(&mut block.children) {
            if child.name == "MISSION_TARGET" {
                targets.push(take_req_text(&mut child, "TARGET_NAME", file)?);
            }
        }
        if targets.is_empty() {
            return Err(missing(file, &block, "MISSION_TARGET"));
        }
        Ok(Self {
            instrument_host_id,
            targets,
            extra: block.properties,
        })
    }

    fn to_block(&self) -> ObjectBlock {
        let mut block = ObjectBlock::new("MISSION_HOST");
        block.properties.insert(
            "INSTRUMENT_HOST_ID".into(),
            Value::Text(self.instrument_host_id.clone()),
        );
        block.properties.extend(self.extra.clone());
        for target in &self.targets {
            let mut child = ObjectBlock::new("MISSION_TARGET");
            child
                .properties
                .insert("TARGET_NAME".into(), Value::Text(target.clone()));
            block.children.push(child);
        }
        block
    }
}

/// `MISSION.CAT`: one mission, its host and targets, and reference keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub name: String,
    pub information: MissionInformation,
    pub host: MissionHost,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_blocks: Vec<ObjectBlock>,
}

impl Mission {
    fn from_block(mut root: ObjectBlock, file: &str) -> Result<Self> {
        let name = take_req_text(&mut root, "MISSION_NAME", file)?;
        let mut information = None;
        let mut host = None;
        let mut reference_keys = Vec::new();
        let mut unknown_blocks = Vec::new();

        for child in std::mem::take(&mut root.children) {
            match child.name.as_str() {
                "MISSION_INFORMATION" => {
                    information = Some(MissionInformation::from_block(child, file)?)
                },
                "MISSION_HOST" => host = Some(MissionHost::from_block(child, file)?),
                "MISSION_REFERENCE_INFORMATION" => {
                    reference_keys.push(reference_key(child, file)?)
                },
                _ => unknown_blocks.push(child),
            }
        }

        Ok(Self {
            name,
            information: information.ok_or_else(|| missing(file, &root, "MISSION_INFORMATION"))?,
            host: host.ok_or_else(|| missing(file, &root, "MISSION_HOST"))?,
            reference_keys,
            extra: root.properties,
            unknown_blocks,
        })
    }

    fn to_block(&self) -> ObjectBlock {
        let mut root = ObjectBlock::new("MISSION");
        root.properties
            .insert("MISSION_NAME".into(), Value::Text(self.name.clone()));
        root.properties.extend(self.extra.clone());
        root.children.push(self.information.to_block());
        root.children.push(self.host.to_block());
        for key in &self.reference_keys {
            root.children
                .push(reference_block("MISSION_REFERENCE_INFORMATION", key));
        }
        root.children.extend(self.unknown_blocks.clone());
        root
    }
}

// ---------------------------------------------------------------------
// Instrument host
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentHostInformation {
    pub name: String,
    pub host_type: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
}

impl InstrumentHostInformation {
    fn from_block(mut block: ObjectBlock, file: &str) -> Result<Self> {
        Ok(Self {
            name: take_req_text(&mut block, "INSTRUMENT_HOST_NAME", file)?,
            host_type: take_req_text(&mut block, "INSTRUMENT_HOST_TYPE", file)?,
            description: take_req_text(&mut block, "INSTRUMENT_HOST_DESC", file)?,
            extra: block.properties,
        })
    }

    fn to_block(&self) -> ObjectBlock {
        let mut block = ObjectBlock::new("INSTRUMENT_HOST_INFORMATION");
        block
            .properties
            .insert("INSTRUMENT_HOST_NAME".into(), Value::Text(self.name.clone()));
        block.properties.insert(
            "INSTRUMENT_HOST_TYPE".into(),
            Value::Text(self.host_type.clone()),
        );
        block.properties.insert(
            "INSTRUMENT_HOST_DESC".into(),
            Value::Text(self.description.clone()),
        );
        block.properties.extend(self.extra.clone());
        block
    }
}

/// `INSTHOST.CAT`: the spacecraft or platform carrying the instruments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentHost {
    pub instrument_host_id: String,
    pub information: InstrumentHostInformation,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_blocks: Vec<ObjectBlock>,
}

impl InstrumentHost {
    fn from_block(mut root: ObjectBlock, file: &str) -> Result<Self> {
        let instrument_host_id = take_req_text(&mut root, "INSTRUMENT_HOST_ID", file)?;
        let mut information = None;
        let mut reference_keys = Vec::new();
        let mut unknown_blocks = Vec::new();

        for child in std::mem::take(&mut root.children) {
            match child.name.as_str() {
                "INSTRUMENT_HOST_INFORMATION" => {
                    information = Some(InstrumentHostInformation::from_block(child, file)?)
                },
                "INSTRUMENT_HOST_REFERENCE_INFO" => {
                    reference_keys.push(reference_key(child, file)?)
                },
                _ => unknown_blocks.push(child),
            }
        }

        Ok(Self {
            instrument_host_id,
            information: information
                .ok_or_else(|| missing(file, &root, "INSTRUMENT_HOST_INFORMATION"))?,
            reference_keys,
            extra: root.properties,
            unknown_blocks,
        })
    }

    fn to_block(&self) -> ObjectBlock {
        let mut root = ObjectBlock::new("INSTRUMENT_HOST");
        root.properties.insert(
            "INSTRUMENT_HOST_ID".into(),
            Value::Text(self.instrument_host_id.clone()),
        );
        root.properties.extend(self.extra.clone());
        root.children.push(self.information.to_block());
        for key in &self.reference_keys {
            root.children
                .push(reference_block("INSTRUMENT_HOST_REFERENCE_INFO", key));
        }
        root.children.extend(self.unknown_blocks.clone());
        root
    }
}

// ---------------------------------------------------------------------
// Instrument
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentInformation {
    pub name: String,
    pub instrument_type: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
}

impl InstrumentInformation {
    fn from_block(mut block: ObjectBlock, file: &str) -> Result<Self> {
        Ok(Self {
            name: take_req_text(&mut block, "INSTRUMENT_NAME", file)?,
            instrument_type: take_req_text(&mut block, "INSTRUMENT_TYPE", file)?,
            description: take_req_text(&mut block, "INSTRUMENT_DESC", file)?,
            extra: block.properties,
        })
    }

    fn to_block(&self) -> ObjectBlock {
        let mut block = ObjectBlock::new("INSTRUMENT_INFORMATION");
        block
            .properties
            .insert("INSTRUMENT_NAME".into(), Value::Text(self.name.clone()));
        block.properties.insert(
            "INSTRUMENT_TYPE".into(),
            Value::Text(self.instrument_type.clone()),
        );
        block.properties.insert(
            "INSTRUMENT_DESC".into(),
            Value::Text(self.description.clone()),
        );
        block.properties.extend(self.extra.clone());
        block
    }
}

/// `INST.CAT`: identity is `INSTRUMENT_ID` + `INSTRUMENT_HOST_ID`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub instrument_id: String,
    pub instrument_host_id: String,
    pub information: InstrumentInformation,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_blocks: Vec<ObjectBlock>,
}

impl Instrument {
    fn from_block(mut root: ObjectBlock, file: &str) -> Result<Self> {
        let instrument_id = take_req_text(&mut root, "INSTRUMENT_ID", file)?;
        let instrument_host_id = take_req_text(&mut root, "INSTRUMENT_HOST_ID", file)?;
        let mut information = None;
        let mut reference_keys = Vec::new();
        let mut unknown_blocks = Vec::new();

        for child in std::mem::take(&mut root.children) {
            match child.name.as_str() {
                "INSTRUMENT_INFORMATION" => {
                    information = Some(InstrumentInformation::from_block(child, file)?)
                },
                "INSTRUMENT_REFERENCE_INFO" => reference_keys.push(reference_key(child, file)?),
                _ => unknown_blocks.push(child),
            }
        }

        Ok(Self {
            instrument_id,
            instrument_host_id,
            information: information
                .ok_or_else(|| missing(file, &root, "INSTRUMENT_INFORMATION"))?,
            reference_keys,
            extra: root.properties,
            unknown_blocks,
        })
    }

    fn to_block(&self) -> ObjectBlock {
        let mut root = ObjectBlock::new("INSTRUMENT");
        root.properties.insert(
            "INSTRUMENT_ID".into(),
            Value::Text(self.instrument_id.clone()),
        );
        root.properties.insert(
            "INSTRUMENT_HOST_ID".into(),
            Value::Text(self.instrument_host_id.clone()),
        );
        root.properties.extend(self.extra.clone());
        root.children.push(self.information.to_block());
        for key in &self.reference_keys {
            root.children
                .push(reference_block("INSTRUMENT_REFERENCE_INFO", key));
        }
        root.children.extend(self.unknown_blocks.clone());
        root
    }
}

// ---------------------------------------------------------------------
// Data set
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSetInformation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstract_desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terse_desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_level_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<PdsDate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub producers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<PdsDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<PdsDate>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
}

impl DataSetInformation {
    fn from_block(mut block: ObjectBlock, file: &str) -> Result<Self> {
        Ok(Self {
            name: take_req_text(&mut block, "DATA_SET_NAME", file)?,
            description: take_opt_text(&mut block, "DATA_SET_DESC"),
            abstract_desc: take_opt_text(&mut block, "ABSTRACT_DESC"),
            terse_desc: take_opt_text(&mut block, "DATA_SET_TERSE_DESC"),
            citation: take_opt_text(&mut block, "CITATION_DESC"),
            confidence_level_note: take_opt_text(&mut block, "CONFIDENCE_LEVEL_NOTE"),
            release_date: take_opt_date(&mut block, "DATA_SET_RELEASE_DATE"),
            producers: take_text_list(&mut block, "PRODUCER_FULL_NAME"),
            start_time: take_opt_date(&mut block, "START_TIME"),
            stop_time: take_opt_date(&mut block, "STOP_TIME"),
            extra: block.properties,
        })
    }

    /// The abstract when present, else the long description
    pub fn best_description(&self) -> Option<&str> {
        self.abstract_desc
            .as_deref()
            .or(self.description.as_deref())
    }

    fn to_block(&self) -> ObjectBlock {
        let mut block = ObjectBlock::new("DATA_SET_INFORMATION");
        block
            .properties
            .insert("DATA_SET_NAME".into(), Value::Text(self.name.clone()));
        let optionals: [(&str, &Option<String>); 5] = [
            ("DATA_SET_DESC", &self.description),
            ("ABSTRACT_DESC", &self.abstract_desc),
            ("DATA_SET_TERSE_DESC", &self.terse_desc),
            ("CITATION_DESC", &self.citation),
            ("CONFIDENCE_LEVEL_NOTE", &self.confidence_level_note),
        ];
        for (key, value) in optionals {
            if let Some(text) = value {
                block
                    .properties
                    .insert(key.to_string(), Value::Text(text.clone()));
            }
        }
        if let Some(date) = self.release_date {
            block
                .properties
                .insert("DATA_SET_RELEASE_DATE".into(), Value::Date(date));
        }
        if !self.producers.is_empty() {
            block
                .properties
                .insert("PRODUCER_FULL_NAME".into(), text_list_value(&self.producers));
        }
        if let Some(date) = self.start_time {
            block.properties.insert("START_TIME".into(), Value::Date(date));
        }
        if let Some(date) = self.stop_time {
            block.properties.insert("STOP_TIME".into(), Value::Date(date));
        }
        block.properties.extend(self.extra.clone());
        block
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSetHost {
    pub instrument_host_id: String,
    pub instrument_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
}

impl DataSetHost {
    fn from_block(mut block: ObjectBlock, file: &str) -> Result<Self> {
        let instrument_host_id = take_req_text(&mut block, "INSTRUMENT_HOST_ID", file)?;
        let instrument_ids = take_text_list(&mut block, "INSTRUMENT_ID");
        if instrument_ids.is_empty() {
            return Err(missing(file, &block, "INSTRUMENT_ID"));
        }
        Ok(Self {
            instrument_host_id,
            instrument_ids,
            extra: block.properties,
        })
    }

    fn to_block(&self) -> ObjectBlock {
        let mut block = ObjectBlock::new("DATA_SET_HOST");
        block.properties.insert(
            "INSTRUMENT_HOST_ID".into(),
            Value::Text(self.instrument_host_id.clone()),
        );
        block.properties.insert(
            "INSTRUMENT_ID".into(),
            text_list_value(&self.instrument_ids),
        );
        block.properties.extend(self.extra.clone());
        block
    }
}

/// `DS.CAT`: the data set itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSet {
    pub dataset_id: String,
    pub information: DataSetInformation,
    /// Target bodies; at least one is required
    pub targets: Vec<String>,
    pub host: DataSetHost,
    pub mission_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_blocks: Vec<ObjectBlock>,
}

impl DataSet {
    fn from_block(mut root: ObjectBlock, file: &str) -> Result<Self> {
        // DATA_SET_ID occasionally arrives as a one-element list
        let dataset_id = match root.take("DATA_SET_ID") {
            Some(Value::List(items)) if items.len() == 1 => items[0].display_text(),
            Some(Value::List(items)) => {
                return Err(HarvestError::parse(
                    file,
                    root.line.max(1),
                    1,
                    format!("an array of {} DATA_SET_ID values is forbidden", items.len()),
                ))
            },
            Some(value) => value.display_text(),
            None => return Err(missing(file, &root, "DATA_SET_ID")),
        };

        let mut information = None;
        let mut targets = Vec::new();
        let mut host = None;
        let mut mission_name = None;
        let mut reference_keys = Vec::new();
        let mut unknown_blocks = Vec::new();

        for mut child in std::mem::take(&mut root.children) {
            match child.name.as_str() {
                "DATA_SET_INFORMATION" => {
                    information = Some(DataSetInformation::from_block(child, file)?)
                },
                "DATA_SET_TARGET" => {
                    targets.push(take_req_text(&mut child, "TARGET_NAME", file)?)
                },
                "DATA_SET_HOST" => host = Some(DataSetHost::from_block(child, file)?),
                "DATA_SET_MISSION" => {
                    mission_name = Some(take_req_text(&mut child, "MISSION_NAME", file)?)
                },
                "DATA_SET_REFERENCE_INFORMATION" => {
                    reference_keys.push(reference_key(child, file)?)
                },
                _ => unknown_blocks.push(child),
            }
        }

        if targets.is_empty() {
            return Err(missing(file, &root, "DATA_SET_TARGET"));
        }

        Ok(Self {
            dataset_id,
            information: information
                .ok_or_else(|| missing(file, &root, "DATA_SET_INFORMATION"))?,
            targets,
            host: host.ok_or_else(|| missing(file, &root, "DATA_SET_HOST"))?,
            mission_name: mission_name
                .ok_or_else(|| missing(file, &root, "DATA_SET_MISSION"))?,
            reference_keys,
            extra: root.properties,
            unknown_blocks,
        })
    }

    fn to_block(&self) -> ObjectBlock {
        let mut root = ObjectBlock::new("DATA_SET");
        root.properties
            .insert("DATA_SET_ID".into(), Value::Text(self.dataset_id.clone()));
        root.properties.extend(self.extra.clone());
        root.children.push(self.information.to_block());
        for target in &self.targets {
            let mut child = ObjectBlock::new("DATA_SET_TARGET");
            child
                .properties
                .insert("TARGET_NAME".into(), Value::Text(target.clone()));
            root.children.push(child);
        }
        root.children.push(self.host.to_block());
        let mut mission = ObjectBlock::new("DATA_SET_MISSION");
        mission
            .properties
            .insert("MISSION_NAME".into(), Value::Text(self.mission_name.clone()));
        root.children.push(mission);
        for key in &self.reference_keys {
            root.children
                .push(reference_block("DATA_SET_REFERENCE_INFORMATION", key));
        }
        root.children.extend(self.unknown_blocks.clone());
        root
    }
}

// ---------------------------------------------------------------------
// Data set map projection
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapProjectionInformation {
    pub projection_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotational_element_desc: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
}

impl MapProjectionInformation {
    fn from_block(mut block: ObjectBlock, file: &str) -> Result<Self> {
        let mut reference_keys = Vec::new();
        for child in std::mem::take(&mut block.children) {
            if child.name == "DS_MAP_PROJECTION_REF_INFO" {
                reference_keys.push(reference_key(child, file)?);
            }
        }
        Ok(Self {
            projection_type: take_req_text(&mut block, "MAP_PROJECTION_TYPE", file)?,
            description: take_opt_text(&mut block, "MAP_PROJECTION_DESC"),
            rotational_element_desc: take_opt_text(&mut block, "ROTATIONAL_ELEMENT_DESC"),
            reference_keys,
            extra: block.properties,
        })
    }

    fn to_block(&self) -> ObjectBlock {
        let mut block = ObjectBlock::new("DATA_SET_MAP_PROJECTION_INFO");
        block.properties.insert(
            "MAP_PROJECTION_TYPE".into(),
            Value::Text(self.projection_type.clone()),
        );
        if let Some(desc) = &self.description {
            block
                .properties
                .insert("MAP_PROJECTION_DESC".into(), Value::Text(desc.clone()));
        }
        if let Some(desc) = &self.rotational_element_desc {
            block
                .properties
                .insert("ROTATIONAL_ELEMENT_DESC".into(), Value::Text(desc.clone()));
        }
        block.properties.extend(self.extra.clone());
        for key in &self.reference_keys {
            block
                .children
                .push(reference_block("DS_MAP_PROJECTION_REF_INFO", key));
        }
        block
    }
}

/// `DSMAP.CAT`: the map projection a data set is published in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSetMapProjection {
    pub dataset_id: String,
    pub information: MapProjectionInformation,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_blocks: Vec<ObjectBlock>,
}

impl DataSetMapProjection {
    fn from_block(mut root: ObjectBlock, file: &str) -> Result<Self> {
        let dataset_id = take_req_text(&mut root, "DATA_SET_ID", file)?;
        let mut information = None;
        let mut unknown_blocks = Vec::new();

        for child in std::mem::take(&mut root.children) {
            match child.name.as_str() {
                "DATA_SET_MAP_PROJECTION_INFO" => {
                    information = Some(MapProjectionInformation::from_block(child, file)?)
                },
                _ => unknown_blocks.push(child),
            }
        }

        Ok(Self {
            dataset_id,
            information: information
                .ok_or_else(|| missing(file, &root, "DATA_SET_MAP_PROJECTION_INFO"))?,
            extra: root.properties,
            unknown_blocks,
        })
    }

    fn to_block(&self) -> ObjectBlock {
        let mut root = ObjectBlock::new("DATA_SET_MAP_PROJECTION");
        root.properties
            .insert("DATA_SET_ID".into(), Value::Text(self.dataset_id.clone()));
        root.properties.extend(self.extra.clone());
        root.children.push(self.information.to_block());
        root.children.extend(self.unknown_blocks.clone());
        root
    }
}

// ---------------------------------------------------------------------
// Personnel
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PersonnelInformation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pds_affiliation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_date: Option<PdsDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telephone_number: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
}

impl PersonnelInformation {
    fn from_block(mut block: ObjectBlock) -> Self {
        Self {
            full_name: take_opt_text(&mut block, "FULL_NAME"),
            last_name: take_opt_text(&mut block, "LAST_NAME"),
            institution_name: take_opt_text(&mut block, "INSTITUTION_NAME"),
            node_id: take_opt_text(&mut block, "NODE_ID"),
            pds_affiliation: take_opt_text(&mut block, "PDS_AFFILIATION"),
            registration_date: take_opt_date(&mut block, "REGISTRATION_DATE"),
            address_text: take_opt_text(&mut block, "ADDRESS_TEXT"),
            telephone_number: take_opt_text(&mut block, "TELEPHONE_NUMBER"),
            extra: block.properties,
        }
    }

    fn to_block(&self) -> ObjectBlock {
        let mut block = ObjectBlock::new("PERSONNEL_INFORMATION");
        let optionals: [(&str, &Option<String>); 7] = [
            ("FULL_NAME", &self.full_name),
            ("LAST_NAME", &self.last_name),
            ("INSTITUTION_NAME", &self.institution_name),
            ("NODE_ID", &self.node_id),
            ("PDS_AFFILIATION", &self.pds_affiliation),
            ("ADDRESS_TEXT", &self.address_text),
            ("TELEPHONE_NUMBER", &self.telephone_number),
        ];
        for (key, value) in optionals {
            if let Some(text) = value {
                block
                    .properties
                    .insert(key.to_string(), Value::Text(text.clone()));
            }
        }
        if let Some(date) = self.registration_date {
            block
                .properties
                .insert("REGISTRATION_DATE".into(), Value::Date(date));
        }
        block.properties.extend(self.extra.clone());
        block
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectronicMail {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preference_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
}

impl ElectronicMail {
    fn from_block(mut block: ObjectBlock, file: &str) -> Result<Self> {
        Ok(Self {
            id: take_req_text(&mut block, "ELECTRONIC_MAIL_ID", file)?,
            mail_type: take_opt_text(&mut block, "ELECTRONIC_MAIL_TYPE"),
            preference_id: take_opt_text(&mut block, "PREFERENCE_ID"),
            extra: block.properties,
        })
    }

    fn to_block(&self) -> ObjectBlock {
        let mut block = ObjectBlock::new("PERSONNEL_ELECTRONIC_MAIL");
        block
            .properties
            .insert("ELECTRONIC_MAIL_ID".into(), Value::Text(self.id.clone()));
        if let Some(kind) = &self.mail_type {
            block
                .properties
                .insert("ELECTRONIC_MAIL_TYPE".into(), Value::Text(kind.clone()));
        }
        if let Some(pref) = &self.preference_id {
            block
                .properties
                .insert("PREFERENCE_ID".into(), Value::Text(pref.clone()));
        }
        block.properties.extend(self.extra.clone());
        block
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonnelRecord {
    pub user_id: String,
    pub information: PersonnelInformation,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<ElectronicMail>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_blocks: Vec<ObjectBlock>,
}

impl PersonnelRecord {
    fn from_block(mut root: ObjectBlock, file: &str) -> Result<Self> {
        let user_id = take_req_text(&mut root, "PDS_USER_ID", file)?;
        let mut information = None;
        let mut emails = Vec::new();
        let mut unknown_blocks = Vec::new();

        for child in std::mem::take(&mut root.children) {
            match child.name.as_str() {
                "PERSONNEL_INFORMATION" => {
                    information = Some(PersonnelInformation::from_block(child))
                },
                "PERSONNEL_ELECTRONIC_MAIL" => emails.push(ElectronicMail::from_block(child, file)?),
                _ => unknown_blocks.push(child),
            }
        }

        Ok(Self {
            user_id,
            information: information
                .ok_or_else(|| missing(file, &root, "PERSONNEL_INFORMATION"))?,
            emails,
            extra: root.properties,
            unknown_blocks,
        })
    }

    fn to_block(&self) -> ObjectBlock {
        let mut root = ObjectBlock::new("PERSONNEL");
        root.properties
            .insert("PDS_USER_ID".into(), Value::Text(self.user_id.clone()));
        root.properties.extend(self.extra.clone());
        root.children.push(self.information.to_block());
        for email in &self.emails {
            root.children.push(email.to_block());
        }
        root.children.extend(self.unknown_blocks.clone());
        root
    }
}

/// `PERSON.CAT`: one or many personnel records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Personnel {
    pub records: Vec<PersonnelRecord>,
}

impl Personnel {
    pub fn find(&self, user_id: &str) -> Option<&PersonnelRecord> {
        self.records.iter().find(|r| r.user_id == user_id)
    }
}

// ---------------------------------------------------------------------
// References
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub key_id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_blocks: Vec<ObjectBlock>,
}

impl ReferenceEntry {
    fn from_block(mut root: ObjectBlock, file: &str) -> Result<Self> {
        let key_id = take_req_text(&mut root, "REFERENCE_KEY_ID", file)?;
        let description = take_req_text(&mut root, "REFERENCE_DESC", file)?;
        Ok(Self {
            key_id,
            description,
            extra: root.properties,
            unknown_blocks: std::mem::take(&mut root.children),
        })
    }

    fn to_block(&self) -> ObjectBlock {
        let mut root = ObjectBlock::new("REFERENCE");
        root.properties
            .insert("REFERENCE_KEY_ID".into(), Value::Text(self.key_id.clone()));
        root.properties.insert(
            "REFERENCE_DESC".into(),
            Value::Text(self.description.clone()),
        );
        root.properties.extend(self.extra.clone());
        root.children.extend(self.unknown_blocks.clone());
        root
    }
}

/// `REF.CAT`: the citation table other catalogs point into
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct References {
    pub entries: Vec<ReferenceEntry>,
}

impl References {
    /// Citation text for a reference key
    pub fn lookup(&self, key_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.key_id == key_id)
            .map(|entry| entry.description.as_str())
    }

    /// Resolve a list of keys to their citation texts, dropping misses
    pub fn resolve(&self, keys: &[String]) -> Vec<String> {
        keys.iter()
            .filter_map(|key| self.lookup(key).map(str::to_string))
            .collect()
    }
}

// ---------------------------------------------------------------------
// Volume descriptor
// ---------------------------------------------------------------------

/// The CATALOG sub-object: which catalog file serves each kind
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CatalogIndex {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mission: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instrument_host: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instrument: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_set: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_set_map_projection: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub personnel: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
}

impl CatalogIndex {
    fn from_block(mut block: ObjectBlock) -> Self {
        Self {
            mission: take_text_list(&mut block, "MISSION_CATALOG"),
            instrument_host: take_text_list(&mut block, "INSTRUMENT_HOST_CATALOG"),
            instrument: take_text_list(&mut block, "INSTRUMENT_CATALOG"),
            data_set: take_text_list(&mut block, "DATA_SET_CATALOG"),
            data_set_map_projection: take_text_list(&mut block, "DATA_SET_MAP_PROJECTION_CATALOG"),
            personnel: take_text_list(&mut block, "PERSONNEL_CATALOG"),
            reference: take_text_list(&mut block, "REFERENCE_CATALOG"),
            extra: block.properties,
        }
    }

    fn to_block(&self) -> ObjectBlock {
        let mut block = ObjectBlock::new("CATALOG");
        let lists: [(&str, &Vec<String>); 7] = [
            ("MISSION_CATALOG", &self.mission),
            ("INSTRUMENT_HOST_CATALOG", &self.instrument_host),
            ("INSTRUMENT_CATALOG", &self.instrument),
            ("DATA_SET_CATALOG", &self.data_set),
            ("DATA_SET_MAP_PROJECTION_CATALOG", &self.data_set_map_projection),
            ("PERSONNEL_CATALOG", &self.personnel),
            ("REFERENCE_CATALOG", &self.reference),
        ];
        for (key, items) in lists {
            if !items.is_empty() {
                block
                    .properties
                    .insert(key.to_string(), text_list_value(items));
            }
        }
        block.properties.extend(self.extra.clone());
        block
    }

    /// (kind, filename) pairs for every named catalog file
    pub fn entries(&self) -> Vec<(CatalogKind, String)> {
        let mut out = Vec::new();
        let sources: [(CatalogKind, &Vec<String>); 7] = [
            (CatalogKind::Mission, &self.mission),
            (CatalogKind::InstrumentHost, &self.instrument_host),
            (CatalogKind::Instrument, &self.instrument),
            (CatalogKind::DataSet, &self.data_set),
            (CatalogKind::DataSetMapProjection, &self.data_set_map_projection),
            (CatalogKind::Personnel, &self.personnel),
            (CatalogKind::Reference, &self.reference),
        ];
        for (kind, names) in sources {
            for name in names {
                out.push((kind, name.clone()));
            }
        }
        out
    }
}

/// DATA_PRODUCER / DATA_SUPPLIER payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VolumeAgent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facility_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_text: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
}

impl VolumeAgent {
    fn from_block(mut block: ObjectBlock) -> Self {
        Self {
            institution_name: take_opt_text(&mut block, "INSTITUTION_NAME"),
            facility_name: take_opt_text(&mut block, "FACILITY_NAME"),
            full_name: take_opt_text(&mut block, "FULL_NAME"),
            address_text: take_opt_text(&mut block, "ADDRESS_TEXT"),
            extra: block.properties,
        }
    }

    fn to_block(&self, name: &str) -> ObjectBlock {
        let mut block = ObjectBlock::new(name);
        let optionals: [(&str, &Option<String>); 4] = [
            ("INSTITUTION_NAME", &self.institution_name),
            ("FACILITY_NAME", &self.facility_name),
            ("FULL_NAME", &self.full_name),
            ("ADDRESS_TEXT", &self.address_text),
        ];
        for (key, value) in optionals {
            if let Some(text) = value {
                block
                    .properties
                    .insert(key.to_string(), Value::Text(text.clone()));
            }
        }
        block.properties.extend(self.extra.clone());
        block
    }

    /// Display name: the person when known, else the institution
    pub fn display_name(&self) -> Option<&str> {
        self.full_name
            .as_deref()
            .or(self.institution_name.as_deref())
    }
}

/// `VOLDESC.CAT`: the volume and its index of catalog files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeDescriptor {
    pub volume_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<PdsDate>,
    pub catalog: CatalogIndex,
    pub data_producer: VolumeAgent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_supplier: Option<VolumeAgent>,
    /// FILE and DIRECTORY sub-blocks kept structurally
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_blocks: Vec<ObjectBlock>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Extra,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_blocks: Vec<ObjectBlock>,
}

impl VolumeDescriptor {
    fn from_block(mut root: ObjectBlock, file: &str) -> Result<Self> {
        let volume_id = take_req_text(&mut root, "VOLUME_ID", file)?;
        let dataset_id = take_opt_text(&mut root, "DATA_SET_ID");
        let volume_name = take_opt_text(&mut root, "VOLUME_NAME");
        let description = take_opt_text(&mut root, "DESCRIPTION");
        let publication_date = take_opt_date(&mut root, "PUBLICATION_DATE");

        let mut catalog = None;
        let mut data_producer = None;
        let mut data_supplier = None;
        let mut file_blocks = Vec::new();
        let mut unknown_blocks = Vec::new();

        for child in std::mem::take(&mut root.children) {
            match child.name.as_str() {
                "CATALOG" => catalog = Some(CatalogIndex::from_block(child)),
                "DATA_PRODUCER" => data_producer = Some(VolumeAgent::from_block(child)),
                "DATA_SUPPLIER" => data_supplier = Some(VolumeAgent::from_block(child)),
                // DIRECTORY blocks recurse; keep their structure as parsed
                "FILE" | "DIRECTORY" => file_blocks.push(child),
                _ => unknown_blocks.push(child),
            }
        }

        Ok(Self {
            volume_id,
            dataset_id,
            volume_name,
            description,
            publication_date,
            catalog: catalog.ok_or_else(|| missing(file, &root, "CATALOG"))?,
            data_producer: data_producer
                .ok_or_else(|| missing(file, &root, "DATA_PRODUCER"))?,
            data_supplier,
            file_blocks,
            extra: root.properties,
            unknown_blocks,
        })
    }

    fn to_block(&self) -> ObjectBlock {
        let mut root = ObjectBlock::new("VOLUME");
        root.properties
            .insert("VOLUME_ID".into(), Value::Text(self.volume_id.clone()));
        if let Some(id) = &self.dataset_id {
            root.properties
                .insert("DATA_SET_ID".into(), Value::Text(id.clone()));
        }
        if let Some(name) = &self.volume_name {
            root.properties
                .insert("VOLUME_NAME".into(), Value::Text(name.clone()));
        }
        if let Some(desc) = &self.description {
            root.properties
                .insert("DESCRIPTION".into(), Value::Text(desc.clone()));
        }
        if let Some(date) = self.publication_date {
            root.properties
                .insert("PUBLICATION_DATE".into(), Value::Date(date));
        }
        root.properties.extend(self.extra.clone());
        root.children.push(self.data_producer.to_block("DATA_PRODUCER"));
        root.children.push(self.catalog.to_block());
        if let Some(supplier) = &self.data_supplier {
            root.children.push(supplier.to_block("DATA_SUPPLIER"));
        }
        root.children.extend(self.file_blocks.clone());
        root.children.extend(self.unknown_blocks.clone());
        root
    }
}

// ---------------------------------------------------------------------
// The sum type
// ---------------------------------------------------------------------

/// One parsed PDS3 catalog object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pds3Catalog {
    Mission(Mission),
    InstrumentHost(InstrumentHost),
    Instrument(Instrument),
    DataSet(DataSet),
    DataSetMapProjection(DataSetMapProjection),
    Personnel(Personnel),
    Reference(References),
    VolumeDescriptor(VolumeDescriptor),
}

impl Pds3Catalog {
    pub fn kind(&self) -> CatalogKind {
        match self {
            Pds3Catalog::Mission(_) => CatalogKind::Mission,
            Pds3Catalog::InstrumentHost(_) => CatalogKind::InstrumentHost,
            Pds3Catalog::Instrument(_) => CatalogKind::Instrument,
            Pds3Catalog::DataSet(_) => CatalogKind::DataSet,
            Pds3Catalog::DataSetMapProjection(_) => CatalogKind::DataSetMapProjection,
            Pds3Catalog::Personnel(_) => CatalogKind::Personnel,
            Pds3Catalog::Reference(_) => CatalogKind::Reference,
            Pds3Catalog::VolumeDescriptor(_) => CatalogKind::VolumeDescriptor,
        }
    }

    /// Natural identity within the parsed bundle
    pub fn identifier(&self) -> String {
        match self {
            Pds3Catalog::Mission(m) => m.name.clone(),
            Pds3Catalog::InstrumentHost(h) => h.instrument_host_id.clone(),
            Pds3Catalog::Instrument(i) => {
                format!("{}:{}", i.instrument_host_id, i.instrument_id)
            },
            Pds3Catalog::DataSet(d) => d.dataset_id.clone(),
            Pds3Catalog::DataSetMapProjection(p) => p.dataset_id.clone(),
            Pds3Catalog::Personnel(_) => "personnel".to_string(),
            Pds3Catalog::Reference(_) => "references".to_string(),
            Pds3Catalog::VolumeDescriptor(v) => v.volume_id.clone(),
        }
    }

    /// Reference keys this object cites
    pub fn reference_keys(&self) -> Vec<&str> {
        match self {
            Pds3Catalog::Mission(m) => m.reference_keys.iter().map(String::as_str).collect(),
            Pds3Catalog::InstrumentHost(h) => {
                h.reference_keys.iter().map(String::as_str).collect()
            },
            Pds3Catalog::Instrument(i) => i.reference_keys.iter().map(String::as_str).collect(),
            Pds3Catalog::DataSet(d) => d.reference_keys.iter().map(String::as_str).collect(),
            Pds3Catalog::DataSetMapProjection(p) => {
                p.information.reference_keys.iter().map(String::as_str).collect()
            },
            _ => Vec::new(),
        }
    }

    /// Pretty-print back to ODL text the same grammar accepts
    pub fn to_odl(&self) -> String {
        let blocks: Vec<ObjectBlock> = match self {
            Pds3Catalog::Mission(m) => vec![m.to_block()],
            Pds3Catalog::InstrumentHost(h) => vec![h.to_block()],
            Pds3Catalog::Instrument(i) => vec![i.to_block()],
            Pds3Catalog::DataSet(d) => vec![d.to_block()],
            Pds3Catalog::DataSetMapProjection(p) => vec![p.to_block()],
            Pds3Catalog::Personnel(p) => p.records.iter().map(PersonnelRecord::to_block).collect(),
            Pds3Catalog::Reference(r) => r.entries.iter().map(ReferenceEntry::to_block).collect(),
            Pds3Catalog::VolumeDescriptor(v) => vec![v.to_block()],
        };
        odl::write_document(&blocks)
    }
}

/// Build the typed variant for `kind` from its validated root blocks
pub fn build(kind: CatalogKind, roots: Vec<ObjectBlock>, file: &str) -> Result<Pds3Catalog> {
    match kind {
        CatalogKind::Mission => {
            let root = roots.into_iter().next().expect("validated");
            Ok(Pds3Catalog::Mission(Mission::from_block(root, file)?))
        },
        CatalogKind::InstrumentHost => {
            let root = roots.into_iter().next().expect("validated");
            Ok(Pds3Catalog::InstrumentHost(InstrumentHost::from_block(root, file)?))
        },
        CatalogKind::Instrument => {
            let root = roots.into_iter().next().expect("validated");
            Ok(Pds3Catalog::Instrument(Instrument::from_block(root, file)?))
        },
        CatalogKind::DataSet => {
            let root = roots.into_iter().next().expect("validated");
            Ok(Pds3Catalog::DataSet(DataSet::from_block(root, file)?))
        },
        CatalogKind::DataSetMapProjection => {
            let root = roots.into_iter().next().expect("validated");
            Ok(Pds3Catalog::DataSetMapProjection(DataSetMapProjection::from_block(root, file)?))
        },
        CatalogKind::Personnel => {
            let records = roots
                .into_iter()
                .map(|root| PersonnelRecord::from_block(root, file))
                .collect::<Result<Vec<_>>>()?;
            Ok(Pds3Catalog::Personnel(Personnel { records }))
        },
        CatalogKind::Reference => {
            let entries = roots
                .into_iter()
                .map(|root| ReferenceEntry::from_block(root, file))
                .collect::<Result<Vec<_>>>()?;
            Ok(Pds3Catalog::Reference(References { entries }))
        },
        CatalogKind::VolumeDescriptor => {
            let root = roots.into_iter().next().expect("validated");
            Ok(Pds3Catalog::VolumeDescriptor(VolumeDescriptor::from_block(root, file)?))
        },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::super::factory::parse_str;
    use super::*;

    /// Sample modeled on the Mars Global Surveyor mission catalog
    pub(crate) const MISSION_CAT: &str = r#"PDS_VERSION_ID = PDS3
LABEL_REVISION_NOTE = "2001-07-31, review version"

OBJECT = MISSION
  MISSION_NAME = "MARS GLOBAL SURVEYOR"
  OBJECT = MISSION_INFORMATION
    MISSION_ALIAS_NAME = "MGS"
    MISSION_START_DATE = 1994-10-12
    MISSION_STOP_DATE = UNK
    MISSION_DESC = "The Mars Global Surveyor spacecraft was launched
      toward Mars on November 7, 1996 to study the surface."
    MISSION_OBJECTIVES_SUMMARY = "Characterize the surface morphology."
  END_OBJECT = MISSION_INFORMATION
  OBJECT = MISSION_HOST
    INSTRUMENT_HOST_ID = MGS
    OBJECT = MISSION_TARGET
      TARGET_NAME = MARS
    END_OBJECT = MISSION_TARGET
    OBJECT = MISSION_TARGET
      TARGET_NAME = PHOBOS
    END_OBJECT = MISSION_TARGET
    OBJECT = MISSION_TARGET
      TARGET_NAME = SUN
    END_OBJECT = MISSION_TARGET
  END_OBJECT = MISSION_HOST
  OBJECT = MISSION_REFERENCE_INFORMATION
    REFERENCE_KEY_ID = ZUBERETAL1992
  END_OBJECT = MISSION_REFERENCE_INFORMATION
  OBJECT = MISSION_REFERENCE_INFORMATION
    REFERENCE_KEY_ID = SMITHETAL1999
  END_OBJECT = MISSION_REFERENCE_INFORMATION
  OBJECT = MISSION_REFERENCE_INFORMATION
    REFERENCE_KEY_ID = ALBEEETAL2001
  END_OBJECT = MISSION_REFERENCE_INFORMATION
  OBJECT = MISSION_REFERENCE_INFORMATION
    REFERENCE_KEY_ID = ACUNAETAL1998
  END_OBJECT = MISSION_REFERENCE_INFORMATION
  OBJECT = MISSION_REFERENCE_INFORMATION
    REFERENCE_KEY_ID = CHRISTENSENETAL1998
  END_OBJECT = MISSION_REFERENCE_INFORMATION
  OBJECT = MISSION_REFERENCE_INFORMATION
    REFERENCE_KEY_ID = MALINETAL1998
  END_OBJECT = MISSION_REFERENCE_INFORMATION
  OBJECT = MISSION_REFERENCE_INFORMATION
    REFERENCE_KEY_ID = SMITHETAL1998
  END_OBJECT = MISSION_REFERENCE_INFORMATION
  OBJECT = MISSION_REFERENCE_INFORMATION
    REFERENCE_KEY_ID = TYLERETAL1992
  END_OBJECT = MISSION_REFERENCE_INFORMATION
  OBJECT = MISSION_REFERENCE_INFORMATION
    REFERENCE_KEY_ID = ZUBERETAL1998
  END_OBJECT = MISSION_REFERENCE_INFORMATION
END_OBJECT = MISSION
END
"#;

    #[test]
    fn test_parse_mission_catalog() {
        let catalog = parse_str("mission.cat", MISSION_CAT, CatalogKind::Mission).unwrap();
        let Pds3Catalog::Mission(mission) = &catalog else {
            panic!("expected a mission");
        };

        assert_eq!(mission.name, "MARS GLOBAL SURVEYOR");
        assert_eq!(
            mission.information.start_date.unwrap().to_string(),
            "1994-10-12"
        );
        assert!(mission.information.stop_date.is_none());
        assert_eq!(mission.host.targets, vec!["MARS", "PHOBOS", "SUN"]);
        assert!(mission.reference_keys.len() >= 9);
        assert!(mission
            .reference_keys
            .contains(&"ZUBERETAL1992".to_string()));
    }

    #[test]
    fn test_mission_roundtrip() {
        let catalog = parse_str("mission.cat", MISSION_CAT, CatalogKind::Mission).unwrap();
        let reparsed = parse_str("mission.cat", &catalog.to_odl(), CatalogKind::Mission).unwrap();
        assert_eq!(catalog, reparsed);
    }

    fn personnel_fixture() -> String {
        let people = [
            ("SSLAVNEY", "SLAVNEY@WUNDER.WUSTL.EDU", "1988-11-01"),
            ("RARVIDSON", "ARVIDSON@WUNDER.WUSTL.EDU", "1989-02-15"),
            ("EGUINNESS", "GUINNESS@WUNDER.WUSTL.EDU", "1990-06-20"),
            ("TSTEIN", "STEIN@WUNDER.WUSTL.EDU", "1995-04-03"),
            ("DSCHOLES", "SCHOLES@WUNDER.WUSTL.EDU", "1999-08-30"),
            ("JWANG", "WANG@WUNDER.WUSTL.EDU", "2001-12-11"),
            ("KBENNETT", "BENNETT@WUNDER.WUSTL.EDU", "2003-01-22"),
            ("MMCLENNAN", "MCLENNAN@WUNDER.WUSTL.EDU", "2005-09-17"),
        ];
        let mut out = String::from("PDS_VERSION_ID = PDS3\n");
        for (user, mail, date) in people {
            out.push_str(&format!(
                "OBJECT = PERSONNEL\n\
                 PDS_USER_ID = {user}\n\
                 OBJECT = PERSONNEL_INFORMATION\n\
                 LAST_NAME = \"{user}\"\n\
                 REGISTRATION_DATE = {date}\n\
                 END_OBJECT = PERSONNEL_INFORMATION\n\
                 OBJECT = PERSONNEL_ELECTRONIC_MAIL\n\
                 ELECTRONIC_MAIL_ID = \"{mail}\"\n\
                 END_OBJECT = PERSONNEL_ELECTRONIC_MAIL\n\
                 END_OBJECT = PERSONNEL\n"
            ));
        }
        out.push_str("END\n");
        out
    }

    #[test]
    fn test_parse_personnel_catalog() {
        let catalog =
            parse_str("person.cat", &personnel_fixture(), CatalogKind::Personnel).unwrap();
        let Pds3Catalog::Personnel(personnel) = &catalog else {
            panic!("expected personnel");
        };

        assert_eq!(personnel.records.len(), 8);
        let slavney = personnel.find("SSLAVNEY").unwrap();
        assert_eq!(slavney.emails.len(), 1);
        assert_eq!(slavney.emails[0].id, "SLAVNEY@WUNDER.WUSTL.EDU");
        assert_eq!(
            slavney
                .information
                .registration_date
                .unwrap()
                .to_string(),
            "1988-11-01"
        );
    }

    pub(crate) const REF_CAT: &str = r#"PDS_VERSION_ID = PDS3
OBJECT = REFERENCE
  REFERENCE_KEY_ID = ZUBERETAL1992
  REFERENCE_DESC = "Zuber, M.T., D.E. Smith, S.C. Solomon, The Mars Observer
    Laser Altimeter investigation, J. Geophys. Res., 1992."
END_OBJECT = REFERENCE
OBJECT = REFERENCE
  REFERENCE_KEY_ID = SMITHETAL1999
  REFERENCE_DESC = "Smith, D.E., et al., The global topography of Mars, 1999."
END_OBJECT = REFERENCE
END
"#;

    #[test]
    fn test_reference_lookup() {
        let catalog = parse_str("ref.cat", REF_CAT, CatalogKind::Reference).unwrap();
        let Pds3Catalog::Reference(references) = &catalog else {
            panic!("expected references");
        };
        assert_eq!(references.entries.len(), 2);
        assert!(references
            .lookup("ZUBERETAL1992")
            .unwrap()
            .starts_with("Zuber"));
        assert!(references.lookup("NOPE").is_none());
    }

    pub(crate) const INST_CAT: &str = r#"PDS_VERSION_ID = PDS3
OBJECT = INSTRUMENT
  INSTRUMENT_HOST_ID = MGS
  INSTRUMENT_ID = MOLA
  OBJECT = INSTRUMENT_INFORMATION
    INSTRUMENT_NAME = "MARS ORBITER LASER ALTIMETER"
    INSTRUMENT_TYPE = "LASER ALTIMETER"
    INSTRUMENT_DESC = "The Mars Orbiter Laser Altimeter measured the
      topography of Mars."
  END_OBJECT = INSTRUMENT_INFORMATION
  OBJECT = INSTRUMENT_REFERENCE_INFO
    REFERENCE_KEY_ID = ZUBERETAL1992
  END_OBJECT = INSTRUMENT_REFERENCE_INFO
END_OBJECT = INSTRUMENT
END
"#;

    pub(crate) const INSTHOST_CAT: &str = r#"PDS_VERSION_ID = PDS3
OBJECT = INSTRUMENT_HOST
  INSTRUMENT_HOST_ID = MGS
  OBJECT = INSTRUMENT_HOST_INFORMATION
    INSTRUMENT_HOST_NAME = "MARS GLOBAL SURVEYOR"
    INSTRUMENT_HOST_TYPE = SPACECRAFT
    INSTRUMENT_HOST_DESC = "The Mars Global Surveyor spacecraft."
  END_OBJECT = INSTRUMENT_HOST_INFORMATION
END_OBJECT = INSTRUMENT_HOST
END
"#;

    pub(crate) const DS_CAT: &str = r#"PDS_VERSION_ID = PDS3
OBJECT = DATA_SET
  DATA_SET_ID = "MGS-M-MOLA-3-PEDR-L1A-V1.0"
  OBJECT = DATA_SET_INFORMATION
    DATA_SET_NAME = "MGS MOLA PRECISION EXPERIMENT DATA RECORDS"
    DATA_SET_DESC = "Altimetry profiles from the MOLA instrument."
    PRODUCER_FULL_NAME = ("DAVID E. SMITH", "MARIA T. ZUBER")
    START_TIME = 1997-09-15T19:10:00
    STOP_TIME = 2001-06-30T11:10:59
    DATA_SET_RELEASE_DATE = 2003-01-03
  END_OBJECT = DATA_SET_INFORMATION
  OBJECT = DATA_SET_TARGET
    TARGET_NAME = MARS
  END_OBJECT = DATA_SET_TARGET
  OBJECT = DATA_SET_HOST
    INSTRUMENT_HOST_ID = MGS
    INSTRUMENT_ID = MOLA
  END_OBJECT = DATA_SET_HOST
  OBJECT = DATA_SET_MISSION
    MISSION_NAME = "MARS GLOBAL SURVEYOR"
  END_OBJECT = DATA_SET_MISSION
  OBJECT = DATA_SET_REFERENCE_INFORMATION
    REFERENCE_KEY_ID = SMITHETAL1999
  END_OBJECT = DATA_SET_REFERENCE_INFORMATION
END_OBJECT = DATA_SET
END
"#;

    pub(crate) const VOLDESC_CAT: &str = r#"PDS_VERSION_ID = PDS3
OBJECT = VOLUME
  VOLUME_ID = MGSL_0001
  DATA_SET_ID = "MGS-M-MOLA-3-PEDR-L1A-V1.0"
  VOLUME_NAME = "MGS MOLA PEDR VOLUME 1"
  PUBLICATION_DATE = 1999-04-01
  OBJECT = DATA_PRODUCER
    INSTITUTION_NAME = "GODDARD SPACE FLIGHT CENTER"
    FULL_NAME = "DAVID E. SMITH"
  END_OBJECT = DATA_PRODUCER
  OBJECT = CATALOG
    MISSION_CATALOG = "MISSION.CAT"
    INSTRUMENT_HOST_CATALOG = "INSTHOST.CAT"
    INSTRUMENT_CATALOG = "INST.CAT"
    DATA_SET_CATALOG = "DS.CAT"
    PERSONNEL_CATALOG = "PERSON.CAT"
    REFERENCE_CATALOG = "REF.CAT"
  END_OBJECT = CATALOG
END_OBJECT = VOLUME
END
"#;

    pub(crate) const DSMAP_CAT: &str = r#"PDS_VERSION_ID = PDS3
OBJECT = DATA_SET_MAP_PROJECTION
  DATA_SET_ID = "MGS-M-MOLA-5-MEGDR-L3-V1.0"
  OBJECT = DATA_SET_MAP_PROJECTION_INFO
    MAP_PROJECTION_TYPE = "SIMPLE CYLINDRICAL"
    MAP_PROJECTION_DESC = "Equidistant cylindrical projection."
    OBJECT = DS_MAP_PROJECTION_REF_INFO
      REFERENCE_KEY_ID = DUXBURYETAL2002
    END_OBJECT = DS_MAP_PROJECTION_REF_INFO
  END_OBJECT = DATA_SET_MAP_PROJECTION_INFO
END_OBJECT = DATA_SET_MAP_PROJECTION
END
"#;

    #[test]
    fn test_dataset_fields() {
        let catalog = parse_str("ds.cat", DS_CAT, CatalogKind::DataSet).unwrap();
        let Pds3Catalog::DataSet(dataset) = &catalog else {
            panic!("expected a data set");
        };
        assert_eq!(dataset.dataset_id, "MGS-M-MOLA-3-PEDR-L1A-V1.0");
        assert_eq!(dataset.mission_name, "MARS GLOBAL SURVEYOR");
        assert_eq!(dataset.host.instrument_ids, vec!["MOLA"]);
        assert_eq!(dataset.information.producers.len(), 2);
        assert_eq!(
            dataset.information.start_time.unwrap().to_string(),
            "1997-09-15T19:10:00.000"
        );
    }

    #[test]
    fn test_volume_descriptor_catalog_index() {
        let catalog = parse_str("voldesc.cat", VOLDESC_CAT, CatalogKind::VolumeDescriptor).unwrap();
        let Pds3Catalog::VolumeDescriptor(volume) = &catalog else {
            panic!("expected a volume descriptor");
        };
        assert_eq!(volume.volume_id, "MGSL_0001");
        let entries = volume.catalog.entries();
        assert_eq!(entries.len(), 6);
        assert!(entries.contains(&(CatalogKind::Mission, "MISSION.CAT".to_string())));
    }

    #[test]
    fn test_roundtrip_every_kind() {
        let fixtures: [(&str, &str, CatalogKind); 7] = [
            ("mission.cat", MISSION_CAT, CatalogKind::Mission),
            ("inst.cat", INST_CAT, CatalogKind::Instrument),
            ("insthost.cat", INSTHOST_CAT, CatalogKind::InstrumentHost),
            ("ds.cat", DS_CAT, CatalogKind::DataSet),
            ("dsmap.cat", DSMAP_CAT, CatalogKind::DataSetMapProjection),
            ("ref.cat", REF_CAT, CatalogKind::Reference),
            ("voldesc.cat", VOLDESC_CAT, CatalogKind::VolumeDescriptor),
        ];
        for (file, content, kind) in fixtures {
            let catalog = parse_str(file, content, kind).unwrap();
            let reparsed = parse_str(file, &catalog.to_odl(), kind)
                .unwrap_or_else(|err| panic!("{file}: reparse failed: {err}"));
            assert_eq!(catalog, reparsed, "{file} round-trip mismatch");
        }
    }

    #[test]
    fn test_personnel_roundtrip() {
        let fixture = personnel_fixture();
        let catalog = parse_str("person.cat", &fixture, CatalogKind::Personnel).unwrap();
        let reparsed = parse_str("person.cat", &catalog.to_odl(), CatalogKind::Personnel).unwrap();
        assert_eq!(catalog, reparsed);
    }

    #[test]
    fn test_unknown_keywords_are_retained() {
        let content = "OBJECT = INSTRUMENT_HOST\n\
                       INSTRUMENT_HOST_ID = MGS\n\
                       NEWLY_INVENTED_KEYWORD = 7\n\
                       OBJECT = INSTRUMENT_HOST_INFORMATION\n\
                       INSTRUMENT_HOST_NAME = \"MGS\"\n\
                       INSTRUMENT_HOST_TYPE = SPACECRAFT\n\
                       INSTRUMENT_HOST_DESC = \"d\"\n\
                       END_OBJECT = INSTRUMENT_HOST_INFORMATION\n\
                       END_OBJECT = INSTRUMENT_HOST\nEND";
        let catalog = parse_str("insthost.cat", content, CatalogKind::InstrumentHost).unwrap();
        let Pds3Catalog::InstrumentHost(host) = &catalog else {
            panic!()
        };
        assert_eq!(
            host.extra.get("NEWLY_INVENTED_KEYWORD"),
            Some(&Value::Integer(7))
        );
    }

    #[test]
    fn test_missing_keyword_reports_position() {
        let content = "OBJECT = INSTRUMENT_HOST\n\
                       OBJECT = INSTRUMENT_HOST_INFORMATION\n\
                       INSTRUMENT_HOST_NAME = \"MGS\"\n\
                       INSTRUMENT_HOST_TYPE = SPACECRAFT\n\
                       INSTRUMENT_HOST_DESC = \"d\"\n\
                       END_OBJECT = INSTRUMENT_HOST_INFORMATION\n\
                       END_OBJECT = INSTRUMENT_HOST\nEND";
        let err = parse_str("insthost.cat", content, CatalogKind::InstrumentHost).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("INSTRUMENT_HOST_ID"));
        assert!(message.contains("insthost.cat"));
        assert!(message.contains("line 1"));
    }

    #[test]
    fn test_catalog_json_roundtrip() {
        let catalog = parse_str("ds.cat", DS_CAT, CatalogKind::DataSet).unwrap();
        let json = serde_json::to_string(&catalog).unwrap();
        let back: Pds3Catalog = serde_json::from_str(&json).unwrap();
        assert_eq!(catalog, back);
    }
}
