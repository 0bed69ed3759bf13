//! Identifier normalization and asset typing
//!
//! One canonical function maps source identifiers (mission names,
//! instrument ids, dataset ids) to STAC ids, so the same parent catalog is
//! found again no matter which phase created it.

/// Canonical STAC id: ASCII-lowercase, every run of characters outside
/// `[a-z0-9]` collapses to a single `-`, leading/trailing `-` trimmed.
pub fn normalize_id(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut pending_dash = false;
    for ch in source.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Media type inferred from a product file extension
pub fn media_type_for(filename: &str) -> Option<&'static str> {
    let extension = filename.rsplit('.').next()?.to_lowercase();
    match extension.as_str() {
        "json" => Some("application/json"),
        "xml" => Some("application/xml"),
        "lbl" | "cat" | "txt" | "tab" | "asc" => Some("text/plain"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "tif" | "tiff" => Some("image/tiff"),
        "img" | "dat" | "b" | "raw" | "cub" => Some("application/octet-stream"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

/// Asset role inferred from a product file extension
pub fn role_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    match extension.as_str() {
        "lbl" | "cat" | "xml" | "txt" => "metadata",
        "jpg" | "jpeg" | "png" | "gif" => "overview",
        _ => "data",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_id_examples() {
        assert_eq!(normalize_id("MARS GLOBAL SURVEYOR"), "mars-global-surveyor");
        assert_eq!(normalize_id("MGS"), "mgs");
        assert_eq!(normalize_id("MOLA"), "mola");
        assert_eq!(
            normalize_id("MGS-M-MOLA-3-PEDR-L1A-V1.0"),
            "mgs-m-mola-3-pedr-l1a-v1-0"
        );
    }

    #[test]
    fn test_normalize_id_collapses_runs_and_trims() {
        assert_eq!(normalize_id("  A  / B  "), "a-b");
        assert_eq!(normalize_id("__x__"), "x");
        assert_eq!(normalize_id(""), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for source in ["MARS GLOBAL SURVEYOR", "mgs-m-mola-3-pedr-l1a-v1-0", "A/B"] {
            let once = normalize_id(source);
            assert_eq!(normalize_id(&once), once);
        }
    }

    #[test]
    fn test_media_type_and_role() {
        assert_eq!(media_type_for("ap00001l.b"), Some("application/octet-stream"));
        assert_eq!(media_type_for("ap00001l.lbl"), Some("text/plain"));
        assert_eq!(media_type_for("browse.jpg"), Some("image/jpeg"));
        assert_eq!(media_type_for("noext"), None);

        assert_eq!(role_for("ap00001l.lbl"), "metadata");
        assert_eq!(role_for("browse.jpg"), "overview");
        assert_eq!(role_for("ap00001l.b"), "data");
    }
}
