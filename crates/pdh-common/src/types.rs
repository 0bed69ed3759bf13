//! Core shared types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Checksum algorithms supported for download verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Sha256,
    Sha512,
}

/// Identity of one PDS data collection.
///
/// The tuple `(target, mission, host, instrument, dataset_id)` uniquely
/// identifies a data set; every storage key in the pipeline derives from it.
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Target body (ODE meta database), e.g. `MARS`
    pub target: String,
    /// Mission identifier, e.g. `MGS`
    pub mission: String,
    /// Instrument host identifier, e.g. `MGS`
    pub host: String,
    /// Instrument identifier, e.g. `MOLA`
    pub instrument: String,
    /// PDS data set identifier, e.g. `MGS-M-MOLA-3-PEDR-L1A-V1.0`
    pub dataset_id: String,
}

impl Fingerprint {
    pub fn new(
        target: impl Into<String>,
        mission: impl Into<String>,
        host: impl Into<String>,
        instrument: impl Into<String>,
        dataset_id: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            mission: mission.into(),
            host: host.into(),
            instrument: instrument.into(),
            dataset_id: dataset_id.into(),
        }
    }

    /// Relative directory for this collection inside the file store.
    ///
    /// Each segment is lowercased and path separators inside identifiers are
    /// replaced so that a dataset id like `PRE/MAP` cannot escape its
    /// directory.
    pub fn relative_dir(&self) -> PathBuf {
        let mut path = PathBuf::new();
        for segment in [
            &self.target,
            &self.mission,
            &self.host,
            &self.instrument,
            &self.dataset_id,
        ] {
            path.push(Self::path_segment(segment));
        }
        path
    }

    /// One path segment: lowercase, `/` and `\` replaced by `_`
    pub fn path_segment(word: &str) -> String {
        word.to_lowercase().replace(['/', '\\'], "_")
    }

    /// Stable string key for registry lookups
    pub fn key(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            Self::path_segment(&self.target),
            Self::path_segment(&self.mission),
            Self::path_segment(&self.host),
            Self::path_segment(&self.instrument),
            Self::path_segment(&self.dataset_id),
        )
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.target, self.mission, self.host, self.instrument, self.dataset_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mola() -> Fingerprint {
        Fingerprint::new("MARS", "MGS", "MGS", "MOLA", "MGS-M-MOLA-3-PEDR-L1A-V1.0")
    }

    #[test]
    fn test_relative_dir_is_lowercased() {
        let dir = mola().relative_dir();
        assert_eq!(
            dir,
            PathBuf::from("mars/mgs/mgs/mola/mgs-m-mola-3-pedr-l1a-v1.0")
        );
    }

    #[test]
    fn test_path_separator_is_neutralized() {
        let fp = Fingerprint::new("MARS", "MGS", "MGS", "MOLA", "PRE/MAP");
        assert_eq!(
            fp.relative_dir(),
            PathBuf::from("mars/mgs/mgs/mola/pre_map")
        );
    }

    #[test]
    fn test_key_is_stable() {
        assert_eq!(mola().key(), mola().key());
        assert_ne!(
            mola().key(),
            Fingerprint::new("MOON", "MGS", "MGS", "MOLA", "X").key()
        );
    }
}
