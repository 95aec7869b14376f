//! Construction of adapters from configuration.

use std::sync::Arc;

use crate::{AdapterConfig, LocalAdapter, StorageAdapter, StorageResult};

/// Build the adapter selected by `config`.
///
/// Fails with a configuration error when the config is invalid or names a
/// backend whose cargo feature is disabled.
pub async fn create_adapter(config: AdapterConfig) -> StorageResult<Arc<dyn StorageAdapter>> {
    config.validate()?;
    match config {
        AdapterConfig::Filesystem(config) => Ok(Arc::new(LocalAdapter::new(config)?)),
        #[cfg(feature = "aws")]
        AdapterConfig::S3(config) => Ok(Arc::new(crate::S3Adapter::new(config).await?)),
        #[cfg(not(feature = "aws"))]
        AdapterConfig::S3(_) => Err(crate::StorageError::config(
            "s3 backend requested but the `aws` feature is not enabled",
        )),
        #[cfg(feature = "vercel")]
        AdapterConfig::VercelBlob(config) => Ok(Arc::new(crate::VercelBlobAdapter::new(config)?)),
        #[cfg(not(feature = "vercel"))]
        AdapterConfig::VercelBlob(_) => Err(crate::StorageError::config(
            "vercel_blob backend requested but the `vercel` feature is not enabled",
        )),
    }
}
