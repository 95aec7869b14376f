//! File metadata and listing structures.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::key::{extract_name, mime_type_for};

/// Caller-defined metadata attached to a file.
///
/// Backends differ in what they can persist: the filesystem keeps values
/// as-is, S3 stores the whole map as one JSON document, Vercel Blob drops it.
pub type CustomMetadata = BTreeMap<String, serde_json::Value>;

/// Descriptive record for a stored file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// Caller-facing key, without the namespace prefix.
    pub key: String,

    /// Last path segment of the key.
    pub name: String,

    /// MIME type, `application/octet-stream` when unknown.
    pub mime_type: String,

    /// Stored size in bytes.
    pub size_in_bytes: u64,

    /// Time of the last write.
    pub uploaded_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_metadata: Option<CustomMetadata>,
}

impl FileMetadata {
    /// Metadata for `key` with the name and MIME type derived from the key.
    pub fn new(key: &str, size_in_bytes: u64, uploaded_at: DateTime<Utc>) -> Self {
        Self {
            key: key.to_string(),
            name: extract_name(key),
            mime_type: mime_type_for(key),
            size_in_bytes,
            uploaded_at,
            custom_metadata: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: Option<String>) -> Self {
        if let Some(mime_type) = mime_type.filter(|m| !m.is_empty()) {
            self.mime_type = mime_type;
        }
        self
    }

    pub fn with_custom_metadata(mut self, custom_metadata: Option<CustomMetadata>) -> Self {
        self.custom_metadata = custom_metadata.filter(|m| !m.is_empty());
        self
    }

    /// Re-address the record at another key, keeping everything else.
    pub(crate) fn rekeyed(mut self, key: &str) -> Self {
        self.key = key.to_string();
        self.name = extract_name(key);
        self
    }
}

/// A downloaded file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileObject {
    pub metadata: FileMetadata,
    pub content: Bytes,
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListResult {
    /// Files in backend-defined order.
    pub files: Vec<FileMetadata>,

    /// Opaque token for the next page, only set when `has_more` is true.
    pub next_cursor: Option<String>,

    /// Whether the backend reported more results.
    pub has_more: bool,
}
