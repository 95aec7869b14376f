//! Per-operation options.

use serde::{Deserialize, Serialize};

use crate::{CustomMetadata, StorageError, StorageResult};

/// Options for uploads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadOptions {
    /// MIME type; guessed from the key's extension when unset.
    #[serde(default)]
    pub content_type: Option<String>,

    /// `Cache-Control` value for backends that serve files over HTTP.
    #[serde(default)]
    pub cache_control: Option<String>,

    #[serde(default)]
    pub metadata: Option<CustomMetadata>,

    /// Request public read access. Ignored by backends that only have one
    /// access tier.
    #[serde(default)]
    pub is_publicly_accessible: Option<bool>,
}

/// Inclusive byte range, `{0, 4}` selects the first five bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub start_byte: u64,
    pub end_byte: u64,
}

impl ByteRange {
    pub fn new(start_byte: u64, end_byte: u64) -> Self {
        Self {
            start_byte,
            end_byte,
        }
    }

    pub fn validate(&self) -> StorageResult<()> {
        if self.start_byte > self.end_byte {
            return Err(StorageError::InvalidRange {
                start_byte: self.start_byte,
                end_byte: self.end_byte,
                reason: "start byte is after end byte".to_string(),
            });
        }
        Ok(())
    }

    /// Number of bytes selected, before clamping to the object size.
    /// `{0, u64::MAX}` saturates at `u64::MAX`.
    pub fn len(&self) -> u64 {
        self.end_byte
            .saturating_sub(self.start_byte)
            .saturating_add(1)
    }

    /// The part of the range inside an object of `size` bytes, or `None`
    /// when the range starts at or past the end.
    pub fn clamp_to(&self, size: u64) -> Option<ByteRange> {
        if self.start_byte >= size {
            return None;
        }
        Some(ByteRange::new(self.start_byte, self.end_byte.min(size - 1)))
    }

    /// Value for an HTTP `Range` header.
    pub fn to_header(&self) -> String {
        format!("bytes={}-{}", self.start_byte, self.end_byte)
    }
}

/// Options for downloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadOptions {
    #[serde(default)]
    pub range: Option<ByteRange>,
}

impl DownloadOptions {
    pub fn range(start_byte: u64, end_byte: u64) -> Self {
        Self {
            range: Some(ByteRange::new(start_byte, end_byte)),
        }
    }
}

/// Options for listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListOptions {
    /// Only list keys starting with this prefix.
    #[serde(default)]
    pub prefix: Option<String>,

    /// Soft cap on the page size; backends may return fewer.
    #[serde(default)]
    pub limit: Option<usize>,

    /// Cursor returned by a previous listing.
    #[serde(default)]
    pub cursor: Option<String>,
}

impl ListOptions {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }
}
