//! Uniform file storage adapters.
//!
//! Every backend implements [`StorageAdapter`], so call sites can upload,
//! download, list, copy, move and sign URLs without knowing where files live.
//! Available backends:
//!
//! - [`LocalAdapter`]: a directory on the local filesystem, with JSON sidecar
//!   metadata records.
//! - `S3Adapter` (feature `aws`): S3 and S3-compatible object stores.
//! - `VercelBlobAdapter` (feature `vercel`): the Vercel Blob HTTP API.
//!
//! Adapters are usually built from an [`AdapterConfig`] with
//! [`create_adapter`] and can be wrapped in an [`InstrumentedAdapter`] to
//! record OpenTelemetry metrics.

pub mod backends;
pub mod config;
pub mod content;
pub mod error;
pub mod factory;
pub mod instrumented;
pub mod key;
pub mod metadata;
pub mod metrics;
pub mod options;
pub mod presign;
pub mod traits;

pub use backends::local::{LocalAdapter, METADATA_SUFFIX};
#[cfg(feature = "aws")]
pub use backends::s3::S3Adapter;
#[cfg(feature = "vercel")]
pub use backends::vercel_blob::VercelBlobAdapter;
pub use config::{AdapterConfig, FilesystemConfig, S3Config, S3Credentials, VercelBlobConfig};
pub use content::{to_bytes, Content};
pub use error::{StorageError, StorageResult};
pub use factory::create_adapter;
pub use instrumented::InstrumentedAdapter;
pub use metadata::{CustomMetadata, FileMetadata, FileObject, ListResult};
pub use metrics::StorageMetrics;
pub use options::{ByteRange, DownloadOptions, ListOptions, UploadOptions};
pub use presign::{SignedUploadUrl, SignedUrlOptions};
pub use traits::StorageAdapter;
