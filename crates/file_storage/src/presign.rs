//! Signed URL options and results.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{StorageError, StorageResult};

/// Default signed URL lifetime (1 hour).
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 60 * 60;

/// Maximum signed URL expiry (7 days, the S3 limit).
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Options for signed URL generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedUrlOptions {
    /// Lifetime of the URL in seconds.
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,

    /// Content type the request will be made with.
    #[serde(default)]
    pub content_type: Option<String>,
}

fn default_expires_in() -> u64 {
    DEFAULT_EXPIRES_IN_SECS
}

impl Default for SignedUrlOptions {
    fn default() -> Self {
        Self {
            expires_in: DEFAULT_EXPIRES_IN_SECS,
            content_type: None,
        }
    }
}

impl SignedUrlOptions {
    pub fn expires_in(expires_in: u64) -> Self {
        Self {
            expires_in,
            ..Default::default()
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Validated lifetime.
    pub fn expiry(&self) -> StorageResult<Duration> {
        let expires_in = Duration::from_secs(self.expires_in);
        validate_expiry(expires_in)?;
        Ok(expires_in)
    }
}

/// A signed upload URL and the headers the upload request must carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedUploadUrl {
    pub url: String,

    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

impl SignedUploadUrl {
    pub fn new(url: String) -> Self {
        Self {
            url,
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Check a signed URL lifetime against the accepted window of one second
/// up to [`MAX_PRESIGN_EXPIRY`].
pub fn validate_expiry(expires_in: Duration) -> StorageResult<()> {
    let reason = if expires_in.is_zero() {
        "signed URL lifetime must be at least one second".to_string()
    } else if expires_in > MAX_PRESIGN_EXPIRY {
        format!(
            "signed URL lifetime of {}s is longer than the {}s limit",
            expires_in.as_secs(),
            MAX_PRESIGN_EXPIRY.as_secs()
        )
    } else {
        return Ok(());
    };
    Err(StorageError::Presign { reason })
}
