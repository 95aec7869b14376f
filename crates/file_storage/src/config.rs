//! Adapter configuration.

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{StorageError, StorageResult};

/// Default Vercel Blob API endpoint.
pub const DEFAULT_VERCEL_BLOB_API_URL: &str = "https://blob.vercel-storage.com";

/// Backend selection plus the backend's connection parameters.
///
/// ```yaml
/// backend: s3
/// bucket: my-bucket
/// region: us-east-1
/// base_path: uploads
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum AdapterConfig {
    Filesystem(FilesystemConfig),
    S3(S3Config),
    VercelBlob(VercelBlobConfig),
}

impl AdapterConfig {
    pub fn from_path(path: impl AsRef<Path>) -> StorageResult<AdapterConfig> {
        let config_str = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&config_str)
    }

    pub fn from_yaml_str(config_str: &str) -> StorageResult<AdapterConfig> {
        let config: AdapterConfig = Figment::new()
            .merge(Yaml::string(config_str))
            .extract()
            .map_err(|e| StorageError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            AdapterConfig::Filesystem(_) => "filesystem",
            AdapterConfig::S3(_) => "s3",
            AdapterConfig::VercelBlob(_) => "vercel_blob",
        }
    }

    /// Check that every required parameter is present.
    pub fn validate(&self) -> StorageResult<()> {
        match self {
            AdapterConfig::Filesystem(config) => {
                if config.root_dir.as_os_str().is_empty() {
                    return Err(StorageError::config("filesystem root_dir is required"));
                }
            }
            AdapterConfig::S3(config) => {
                if config.bucket.trim().is_empty() {
                    return Err(StorageError::config("s3 bucket is required"));
                }
                if config.region.trim().is_empty() {
                    return Err(StorageError::config("s3 region is required"));
                }
                if let Some(credentials) = &config.credentials {
                    if credentials.access_key_id.is_empty() ||
                        credentials.secret_access_key.is_empty()
                    {
                        return Err(StorageError::config(
                            "s3 credentials need both access_key_id and secret_access_key",
                        ));
                    }
                }
            }
            AdapterConfig::VercelBlob(config) => {
                if config.token.trim().is_empty() {
                    return Err(StorageError::config("vercel_blob token is required"));
                }
            }
        }
        Ok(())
    }
}

/// Local filesystem backend parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilesystemConfig {
    /// Directory all files are stored under.
    pub root_dir: PathBuf,

    #[serde(default)]
    pub base_path: Option<String>,

    /// Public URL the root directory is served at. Needed for URL generation.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// S3-compatible backend parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,

    pub region: String,

    #[serde(default)]
    pub base_path: Option<String>,

    /// Endpoint override for S3-compatible services (MinIO, R2, LocalStack).
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Static credentials. When unset the default AWS provider chain is used.
    #[serde(default)]
    pub credentials: Option<S3Credentials>,

    /// Use path-style addressing (`endpoint/bucket/key`).
    #[serde(default)]
    pub force_path_style: bool,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Vercel Blob backend parameters.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct VercelBlobConfig {
    /// Read-write token (`vercel_blob_rw_<store id>_<secret>`).
    pub token: String,

    #[serde(default)]
    pub base_path: Option<String>,

    #[serde(default = "default_vercel_blob_api_url")]
    pub api_url: String,
}

fn default_vercel_blob_api_url() -> String {
    DEFAULT_VERCEL_BLOB_API_URL.to_string()
}

impl std::fmt::Debug for VercelBlobConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VercelBlobConfig")
            .field("token", &"<redacted>")
            .field("base_path", &self.base_path)
            .field("api_url", &self.api_url)
            .finish()
    }
}
