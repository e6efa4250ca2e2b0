//! Helpers for turning user-supplied names and paths into safe strings.
//!
//! Schema names become file names in the schema directory, and paths that
//! end up in tracing span attributes are reduced to their last component.

use std::path::Path;

/// Fallback used when nothing usable is left of a schema name.
pub const FALLBACK_NAME: &str = "untitled_schema";

/// Fallback used when only trailing dots/spaces were left after cleaning.
pub const FALLBACK_NAME_FINAL: &str = "untitled_schema_final";

const ILLEGAL_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Converts a schema name into a file-system safe file stem.
///
/// - `"  My Backup "` → `"My_Backup"`
/// - `"a/b:c"` → `"abc"`
/// - `"???"` → `"untitled_schema"`
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .replace(' ', "_")
        .chars()
        .filter(|c| !ILLEGAL_CHARS.contains(c))
        .collect();

    if cleaned.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    let trimmed = cleaned.trim_end_matches(&['.', ' '][..]);
    if trimmed.is_empty() {
        return FALLBACK_NAME_FINAL.to_string();
    }

    trimmed.to_string()
}

/// Returns only the final component of a path (no directory).
///
/// Safe for span fields: it names the folder without exposing the full path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}
