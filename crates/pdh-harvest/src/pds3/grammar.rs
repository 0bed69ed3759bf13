//! Per-kind sub-object rules and their enforcement
//!
//! Each catalog class declares which sub-objects its root block carries,
//! with cardinalities and accepted aliases. Validation canonicalizes alias
//! names, reports missing required sub-objects as parse errors, and leaves
//! unknown sub-objects in place (they are preserved as opaque blocks and
//! logged).

use super::ast::{Document, ObjectBlock};
use super::factory::CatalogKind;
use pdh_common::{HarvestError, Result};
use tracing::warn;

/// Cardinality rule for one sub-object of a root block
#[derive(Debug, Clone, Copy)]
pub struct SubRule {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub min: usize,
    /// `None` means unbounded
    pub max: Option<usize>,
}

const fn rule(
    name: &'static str,
    aliases: &'static [&'static str],
    min: usize,
    max: Option<usize>,
) -> SubRule {
    SubRule {
        name,
        aliases,
        min,
        max,
    }
}

/// Accepted root object names per kind
pub fn root_names(kind: CatalogKind) -> &'static [&'static str] {
    match kind {
        CatalogKind::Mission => &["MISSION"],
        CatalogKind::InstrumentHost => &["INSTRUMENT_HOST"],
        CatalogKind::Instrument => &["INSTRUMENT"],
        CatalogKind::DataSet => &["DATA_SET"],
        CatalogKind::DataSetMapProjection => &["DATA_SET_MAP_PROJECTION"],
        CatalogKind::Personnel => &["PERSONNEL"],
        CatalogKind::Reference => &["REFERENCE"],
        CatalogKind::VolumeDescriptor => &["VOLUME"],
    }
}

/// Whether a file of this kind may carry several root records
pub fn repeating_root(kind: CatalogKind) -> bool {
    matches!(kind, CatalogKind::Personnel | CatalogKind::Reference)
}

const MISSION_RULES: &[SubRule] = &[
    rule("MISSION_INFORMATION", &[], 1, Some(1)),
    rule("MISSION_HOST", &[], 1, Some(1)),
    rule("MISSION_REFERENCE_INFORMATION", &[], 0, None),
];
const INSTRUMENT_HOST_RULES: &[SubRule] = &[
    rule("INSTRUMENT_HOST_INFORMATION", &[], 1, Some(1)),
    rule("INSTRUMENT_HOST_REFERENCE_INFO", &[], 0, None),
];
const INSTRUMENT_RULES: &[SubRule] = &[
    rule("INSTRUMENT_INFORMATION", &["INSTINFO"], 1, Some(1)),
    rule("INSTRUMENT_REFERENCE_INFO", &["INSTREFINFO"], 0, None),
];
const DATA_SET_RULES: &[SubRule] = &[
    rule("DATA_SET_INFORMATION", &[], 1, Some(1)),
    rule("DATA_SET_TARGET", &[], 1, None),
    rule("DATA_SET_HOST", &[], 1, Some(1)),
    rule("DATA_SET_MISSION", &[], 1, Some(1)),
    rule("DATA_SET_REFERENCE_INFORMATION", &[], 0, None),
];
const DATA_SET_MAP_PROJECTION_RULES: &[SubRule] =
    &[rule("DATA_SET_MAP_PROJECTION_INFO", &[], 1, Some(1))];
const PERSONNEL_RULES: &[SubRule] = &[
    rule("PERSONNEL_INFORMATION", &[], 1, Some(1)),
    rule("PERSONNEL_ELECTRONIC_MAIL", &[], 0, None),
];
const REFERENCE_RULES: &[SubRule] = &[];
const VOLUME_DESCRIPTOR_RULES: &[SubRule] = &[
    rule("DATA_PRODUCER", &[], 1, Some(1)),
    rule("CATALOG", &[], 1, Some(1)),
    rule("DATA_SUPPLIER", &[], 0, Some(1)),
    rule("FILE", &[], 0, None),
    rule("DIRECTORY", &[], 0, None),
];

/// Sub-object rules for the root block of each kind
pub fn sub_rules(kind: CatalogKind) -> &'static [SubRule] {
    match kind {
        CatalogKind::Mission => MISSION_RULES,
        CatalogKind::InstrumentHost => INSTRUMENT_HOST_RULES,
        CatalogKind::Instrument => INSTRUMENT_RULES,
        CatalogKind::DataSet => DATA_SET_RULES,
        CatalogKind::DataSetMapProjection => DATA_SET_MAP_PROJECTION_RULES,
        CatalogKind::Personnel => PERSONNEL_RULES,
        // Keyword set only
        CatalogKind::Reference => REFERENCE_RULES,
        CatalogKind::VolumeDescriptor => VOLUME_DESCRIPTOR_RULES,
    }
}

fn canonical_name(rules: &[SubRule], name: &str) -> Option<&'static str> {
    rules
        .iter()
        .find(|rule| rule.name == name || rule.aliases.contains(&name))
        .map(|rule| rule.name)
}

/// Validate a parsed document against the grammar for `kind`.
///
/// Returns the root blocks with alias names canonicalized. Missing
/// required sub-objects and cardinality violations are parse errors;
/// unknown sub-objects are warned about and preserved.
pub fn validate(kind: CatalogKind, document: Document, file: &str) -> Result<Vec<ObjectBlock>> {
    let accepted_roots = root_names(kind);
    let mut roots: Vec<ObjectBlock> = document
        .objects
        .into_iter()
        .filter(|object| accepted_roots.contains(&object.name.as_str()))
        .collect();

    if roots.is_empty() {
        return Err(HarvestError::parse(
            file,
            1,
            1,
            format!("no OBJECT = {} block found", accepted_roots[0]),
        ));
    }
    if roots.len() > 1 && !repeating_root(kind) {
        return Err(HarvestError::parse(
            file,
            roots[1].line,
            1,
            format!("multiple OBJECT = {} blocks", accepted_roots[0]),
        ));
    }

    let rules = sub_rules(kind);
    for root in &mut roots {
        // Canonicalize alias sub-object names in place
        for child in &mut root.children {
            if let Some(canonical) = canonical_name(rules, &child.name) {
                if canonical != child.name {
                    child.name = canonical.to_string();
                }
            } else {
                warn!(
                    file,
                    object = %child.name,
                    line = child.line,
                    "Unknown sub-object preserved as opaque block"
                );
            }
        }

        for rule in rules {
            let count = root.children_named(rule.name).len();
            if count < rule.min {
                return Err(HarvestError::parse(
                    file,
                    root.line,
                    1,
                    format!("missing required {} in OBJECT = {}", rule.name, root.name),
                ));
            }
            if let Some(max) = rule.max {
                if count > max {
                    return Err(HarvestError::parse(
                        file,
                        root.line,
                        1,
                        format!(
                            "OBJECT = {} allows at most {} {} block(s), found {}",
                            root.name, max, rule.name, count
                        ),
                    ));
                }
            }
        }
    }

    Ok(roots)
}
