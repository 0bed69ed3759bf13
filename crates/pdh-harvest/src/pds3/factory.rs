//! Parser factory
//!
//! Maps a filename heuristic (and, on failure, the root `OBJECT =` name)
//! to the grammar to apply. On ambiguity the candidates are tried in a
//! fixed order and the first success wins.

use super::ast;
use super::grammar;
use super::models::{self, Pds3Catalog};
use pdh_common::{HarvestError, Result};
use tracing::debug;

/// The eight catalog classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CatalogKind {
    Mission,
    InstrumentHost,
    Instrument,
    DataSet,
    DataSetMapProjection,
    Personnel,
    Reference,
    VolumeDescriptor,
}

impl CatalogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Mission => "mission",
            CatalogKind::InstrumentHost => "instrument_host",
            CatalogKind::Instrument => "instrument",
            CatalogKind::DataSet => "data_set",
            CatalogKind::DataSetMapProjection => "data_set_map_projection",
            CatalogKind::Personnel => "personnel",
            CatalogKind::Reference => "reference",
            CatalogKind::VolumeDescriptor => "volume_descriptor",
        }
    }

    /// All kinds in the fixed candidate order used on ambiguity
    pub fn all() -> &'static [CatalogKind] {
        &[
            CatalogKind::VolumeDescriptor,
            CatalogKind::Mission,
            CatalogKind::InstrumentHost,
            CatalogKind::Instrument,
            CatalogKind::DataSet,
            CatalogKind::DataSetMapProjection,
            CatalogKind::Personnel,
            CatalogKind::Reference,
        ]
    }

    /// Filename heuristic. PDS archives use short names like `MISSION.CAT`,
    /// `INSTHOST.CAT`, `INST.CAT`, `DS.CAT`, `DSMAP.CAT`, `PERSON.CAT`,
    /// `REF.CAT` and `VOLDESC.CAT`, with mission-specific prefixes and
    /// suffixes around them.
    pub fn from_filename(filename: &str) -> Option<CatalogKind> {
        let stem = filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(filename)
            .to_lowercase();
        let stem = stem
            .strip_suffix(".cat")
            .or_else(|| stem.strip_suffix(".txt"))
            .unwrap_or(&stem);

        // Longest/most specific markers first; `inst` would otherwise
        // shadow `insthost`, `ref` would shadow `dsmapref`.
        if stem.contains("voldesc") || stem.contains("volume") {
            Some(CatalogKind::VolumeDescriptor)
        } else if stem.contains("mission") || stem.contains("msn") {
            Some(CatalogKind::Mission)
        } else if stem.contains("insthost") || stem.contains("inst_host") || stem.contains("host") {
            Some(CatalogKind::InstrumentHost)
        } else if stem.contains("dsmap") || stem.contains("projection") || stem.contains("ds_map") {
            Some(CatalogKind::DataSetMapProjection)
        } else if stem.contains("person") {
            Some(CatalogKind::Personnel)
        } else if stem.contains("ref") {
            Some(CatalogKind::Reference)
        } else if stem.contains("inst") {
            Some(CatalogKind::Instrument)
        } else if stem.contains("dataset") || stem.contains("ds") {
            Some(CatalogKind::DataSet)
        } else {
            None
        }
    }

    /// Fallback: recognize the root `OBJECT =` name
    pub fn from_root_object(name: &str) -> Option<CatalogKind> {
        match name.to_uppercase().as_str() {
            "MISSION" => Some(CatalogKind::Mission),
            "INSTRUMENT_HOST" => Some(CatalogKind::InstrumentHost),
            "INSTRUMENT" => Some(CatalogKind::Instrument),
            "DATA_SET" => Some(CatalogKind::DataSet),
            "DATA_SET_MAP_PROJECTION" => Some(CatalogKind::DataSetMapProjection),
            "PERSONNEL" => Some(CatalogKind::Personnel),
            "REFERENCE" => Some(CatalogKind::Reference),
            "VOLUME" => Some(CatalogKind::VolumeDescriptor),
            _ => None,
        }
    }
}

impl std::fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse `content` with the grammar for `kind`.
///
/// `file` is used for error context only.
pub fn parse_str(file: &str, content: &str, kind: CatalogKind) -> Result<Pds3Catalog> {
    let document = ast::parse_document(content)
        .map_err(|err| HarvestError::parse(file, err.line, err.column, err.message))?;
    let roots = grammar::validate(kind, document, file)?;
    models::build(kind, roots, file)
}

/// Parse with the kind inferred from the filename, falling back to the
/// root object name, then to the fixed candidate order.
pub fn parse_auto(file: &str, content: &str) -> Result<Pds3Catalog> {
    if let Some(kind) = CatalogKind::from_filename(file) {
        return parse_str(file, content, kind);
    }

    if let Ok(document) = ast::parse_document(content) {
        if let Some(kind) = document
            .objects
            .first()
            .and_then(|root| CatalogKind::from_root_object(&root.name))
        {
            debug!(file, kind = %kind, "Catalog kind resolved from root object");
            return parse_str(file, content, kind);
        }
    }

    let mut last_error = None;
    for kind in CatalogKind::all() {
        match parse_str(file, content, *kind) {
            Ok(catalog) => return Ok(catalog),
            Err(err) => last_error = Some(err),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        HarvestError::parse(file, 1, 1, "no grammar accepts this file")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_heuristic() {
        assert_eq!(
            CatalogKind::from_filename("MISSION.CAT"),
            Some(CatalogKind::Mission)
        );
        assert_eq!(
            CatalogKind::from_filename("voldesc.cat"),
            Some(CatalogKind::VolumeDescriptor)
        );
        assert_eq!(
            CatalogKind::from_filename("INSTHOST.CAT"),
            Some(CatalogKind::InstrumentHost)
        );
        assert_eq!(
            CatalogKind::from_filename("mola_inst.cat"),
            Some(CatalogKind::Instrument)
        );
        assert_eq!(
            CatalogKind::from_filename("DS_MOLA.CAT"),
            Some(CatalogKind::DataSet)
        );
        assert_eq!(
            CatalogKind::from_filename("dsmap.cat"),
            Some(CatalogKind::DataSetMapProjection)
        );
        assert_eq!(
            CatalogKind::from_filename("PERSON.CAT"),
            Some(CatalogKind::Personnel)
        );
        assert_eq!(
            CatalogKind::from_filename("REF.CAT"),
            Some(CatalogKind::Reference)
        );
        assert_eq!(CatalogKind::from_filename("aareadme.txt"), None);
    }

    #[test]
    fn test_host_beats_instrument() {
        // `insthost` contains `inst`; host must win
        assert_eq!(
            CatalogKind::from_filename("insthost.cat"),
            Some(CatalogKind::InstrumentHost)
        );
    }

    #[test]
    fn test_root_object_fallback() {
        assert_eq!(
            CatalogKind::from_root_object("VOLUME"),
            Some(CatalogKind::VolumeDescriptor)
        );
        assert_eq!(
            CatalogKind::from_root_object("mission"),
            Some(CatalogKind::Mission)
        );
        assert_eq!(CatalogKind::from_root_object("IMAGE"), None);
    }

    #[test]
    fn test_parse_auto_uses_root_object() {
        let content = "PDS_VERSION_ID = PDS3\n\
                       OBJECT = REFERENCE\n\
                       REFERENCE_KEY_ID = ZUBERETAL1992\n\
                       REFERENCE_DESC = \"Zuber, M.T., et al. 1992.\"\n\
                       END_OBJECT = REFERENCE\n\
                       END";
        // A name the heuristic cannot place
        let catalog = parse_auto("catalog_object_7", content).unwrap();
        assert_eq!(catalog.kind(), CatalogKind::Reference);
    }
}
