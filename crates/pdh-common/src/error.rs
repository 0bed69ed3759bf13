//! Error types for the harvest pipeline
//!
//! This module provides user-friendly error types with actionable messages
//! that help diagnose and resolve issues.

use thiserror::Error;

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Main error type for the harvest pipeline
///
/// All errors include contextual information to help users understand
/// what went wrong and how to fix it.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// File system operations failed (read, write, create directory, etc.)
    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("Failed to process JSON data: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Downloaded file checksum doesn't match expected value
    #[error("Checksum verification failed for '{file}': expected '{expected}', got '{actual}'. The file may be corrupted or incomplete. Try re-downloading.")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    /// Requested collection doesn't exist in the registry
    #[error("Collection '{dataset_id}' not found in registry '{registry}'. Run 'pdh extract --type_extract ode_collections_save' to refresh the registry.")]
    CollectionNotFound {
        registry: String,
        dataset_id: String,
    },

    /// Configuration is missing or invalid
    #[error("Configuration error: {message}. {suggestion}")]
    Config { message: String, suggestion: String },

    /// Network request failed after all retries
    #[error("Network request to '{url}' failed: {reason}. Check your internet connection and try again.")]
    Network { url: String, reason: String },

    /// Upstream served a response the pipeline cannot decode
    #[error("Malformed upstream response in '{file}': {reason}. The file was quarantined; remove it to force a re-download.")]
    Malformed { file: String, reason: String },

    /// A PDS3 catalog file was rejected by its grammar
    #[error("Failed to parse {file} at line {line}, column {column}: {reason}")]
    Parse {
        file: String,
        line: usize,
        column: usize,
        reason: String,
    },

    /// Registry store is locked by another writer
    #[error("Registry '{path}' is locked by another process. Remove the stale lock file if no other pdh process is running.")]
    RegistryLocked { path: String },

    /// Unexpected error with details
    #[error("Unexpected error: {message}")]
    Unknown { message: String },
}

impl HarvestError {
    /// Create a collection not found error
    pub fn collection_not_found(
        registry: impl Into<String>,
        dataset_id: impl Into<String>,
    ) -> Self {
        Self::CollectionNotFound {
            registry: registry.into(),
            dataset_id: dataset_id.into(),
        }
    }

    /// Create a configuration error with suggestion
    pub fn config(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a network error
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed-response error
    pub fn malformed(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            file: file.into(),
            reason: reason.into(),
        }
    }

    /// Create a parse error with source position
    pub fn parse(
        file: impl Into<String>,
        line: usize,
        column: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self::Parse {
            file: file.into(),
            line,
            column,
            reason: reason.into(),
        }
    }

    /// Create a checksum mismatch error
    pub fn checksum_mismatch(
        file: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ChecksumMismatch {
            file: file.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an unknown error
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    /// True when the error class is worth retrying at the HTTP layer
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_are_actionable() {
        let err = HarvestError::collection_not_found("work/database/registry.json", "MGS-M-MOLA");
        assert!(err.to_string().contains("MGS-M-MOLA"));
        assert!(err.to_string().contains("ode_collections_save"));

        let err = HarvestError::parse("mission.cat", 12, 4, "unclosed OBJECT block");
        assert!(err.to_string().contains("line 12"));
        assert!(err.to_string().contains("column 4"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(HarvestError::network("http://x", "timeout").is_transient());
        assert!(!HarvestError::unknown("boom").is_transient());
    }
}
