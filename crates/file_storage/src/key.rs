//! Key and namespace prefix conversion utilities.
//!
//! Every adapter addresses objects by a caller-supplied key, optionally
//! namespaced under a configured `base_path`. The full key is what the
//! backend sees; listing hands the stripped key back to the caller, who then
//! passes it into the next operation. Both directions therefore have to
//! normalize the prefix the same way.

use crate::{StorageError, StorageResult};

const SEPARATOR: char = '/';

/// Normalize a slash-separated path.
///
/// Backslashes become forward slashes, empty and `.` segments are dropped.
///
/// `"\\docs//./a.txt/"` → `"docs/a.txt"`
pub fn normalize(path: &str) -> String {
    path.split(|c: char| c == '/' || c == '\\')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Normalize a namespace prefix, mapping empty prefixes to `None`.
pub fn normalize_base_path(base_path: Option<&str>) -> Option<String> {
    base_path.map(normalize).filter(|prefix| !prefix.is_empty())
}

/// Compute the backend-relative full key for a caller key.
///
/// Without a prefix the key is returned unchanged.
///
/// `full_key("a.txt", Some("uploads/"))` → `"uploads/a.txt"`
pub fn full_key(key: &str, base_path: Option<&str>) -> String {
    match normalize_base_path(base_path) {
        Some(prefix) => {
            let key = normalize(key);
            if key.is_empty() {
                prefix
            } else {
                format!("{prefix}{SEPARATOR}{key}")
            }
        }
        None => key.to_string(),
    }
}

/// Strip the namespace prefix from a full key.
///
/// This is the inverse of [`full_key`]. A full key that is not under the
/// prefix is returned unchanged.
pub fn strip_prefix(full_key: &str, base_path: Option<&str>) -> String {
    let Some(prefix) = normalize_base_path(base_path) else {
        return full_key.to_string();
    };
    if full_key == prefix {
        return String::new();
    }
    full_key
        .strip_prefix(&prefix)
        .and_then(|rest| rest.strip_prefix(SEPARATOR))
        .unwrap_or(full_key)
        .to_string()
}

/// Final path segment of a key.
///
/// `extract_name("docs/2024/report.pdf")` → `"report.pdf"`
pub fn extract_name(key: &str) -> String {
    match key.rsplit_once(SEPARATOR) {
        Some((_, name)) => name.to_string(),
        None => key.to_string(),
    }
}

/// Reject keys that cannot address an object.
pub fn ensure_key(key: &str) -> StorageResult<()> {
    if normalize(key).is_empty() {
        return Err(StorageError::invalid_key(key, "key must not be empty"));
    }
    Ok(())
}

/// Guess the MIME type of a key from its extension.
pub fn mime_type_for(key: &str) -> String {
    mime_guess::from_path(key)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
