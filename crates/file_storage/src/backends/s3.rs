//! S3-compatible storage backend using aws-sdk-s3.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client as S3Client,
    config::{Credentials, Region, http::HttpResponse},
    error::SdkError,
    presigning::PresigningConfig,
    primitives::{ByteStream, DateTime as SmithyDateTime},
    types::ObjectCannedAcl,
};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    Content,
    CustomMetadata,
    DownloadOptions,
    FileMetadata,
    FileObject,
    ListOptions,
    ListResult,
    S3Config,
    SignedUploadUrl,
    SignedUrlOptions,
    StorageAdapter,
    StorageError,
    StorageResult,
    UploadOptions,
    content::to_bytes,
    key::{ensure_key, full_key, normalize_base_path, strip_prefix},
};

const BACKEND: &str = "s3";

/// User metadata entry holding the JSON-encoded custom metadata.
pub const CUSTOM_METADATA_KEY: &str = "custom-metadata";

/// S3 storage adapter.
#[derive(Debug, Clone)]
pub struct S3Adapter {
    client: S3Client,
    bucket: String,
    base_path: Option<String>,
}

impl S3Adapter {
    /// Create a new S3 adapter, resolving credentials from the config or the
    /// default AWS provider chain.
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region));
        if let Some(credentials) = config.credentials {
            loader = loader.credentials_provider(Credentials::new(
                credentials.access_key_id,
                credentials.secret_access_key,
                credentials.session_token,
                None,
                "file_storage",
            ));
        }
        if let Some(endpoint) = config.endpoint.as_deref() {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        Ok(Self::from_client(
            S3Client::from_conf(s3_config),
            config.bucket,
            config.base_path,
        ))
    }

    /// Wrap an already configured client.
    pub fn from_client(client: S3Client, bucket: String, base_path: Option<String>) -> Self {
        let base_path = normalize_base_path(base_path.as_deref());
        debug!(bucket = %bucket, base_path = ?base_path, "Created S3 storage adapter");
        Self {
            client,
            bucket,
            base_path,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_key(&self, key: &str) -> StorageResult<String> {
        ensure_key(key)?;
        Ok(full_key(key, self.base_path.as_deref()))
    }

    fn list_prefix(&self, prefix: &str) -> String {
        match &self.base_path {
            Some(base_path) => format!("{base_path}/{prefix}"),
            None => prefix.to_string(),
        }
    }

    async fn head(&self, key: &str, full_key: &str) -> StorageResult<Option<FileMetadata>> {
        let response = match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(full_key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(StorageError::backend(BACKEND, e)),
        };

        Ok(Some(
            FileMetadata::new(
                key,
                response.content_length().unwrap_or_default().max(0) as u64,
                uploaded_at(response.last_modified()),
            )
            .with_mime_type(response.content_type().map(str::to_string))
            .with_custom_metadata(decode_custom_metadata(response.metadata())),
        ))
    }
}

#[async_trait]
impl StorageAdapter for S3Adapter {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn resolve_key(&self, key: &str) -> StorageResult<String> {
        self.object_key(key)
    }

    async fn upload(
        &self,
        key: &str,
        content: Content,
        options: UploadOptions,
    ) -> StorageResult<FileMetadata> {
        let full_key = self.object_key(key)?;
        let data = to_bytes(content).await?;
        let size = data.len() as u64;

        let metadata = FileMetadata::new(key, size, Utc::now())
            .with_mime_type(options.content_type)
            .with_custom_metadata(options.metadata);

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .content_length(size as i64)
            .content_type(&metadata.mime_type)
            .body(ByteStream::from(data));
        if let Some(cache_control) = options.cache_control {
            request = request.cache_control(cache_control);
        }
        if let Some(custom_metadata) = &metadata.custom_metadata {
            request = request.metadata(
                CUSTOM_METADATA_KEY,
                serde_json::to_string(custom_metadata)?,
            );
        }
        if options.is_publicly_accessible == Some(true) {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }

        request
            .send()
            .await
            .map_err(|e| StorageError::backend(BACKEND, e))?;

        debug!(bucket = %self.bucket, full_key = %full_key, size, "Uploaded object");
        Ok(metadata)
    }

    async fn download(&self, key: &str, options: DownloadOptions) -> StorageResult<FileObject> {
        let full_key = self.object_key(key)?;
        let mut request = self.client.get_object().bucket(&self.bucket).key(&full_key);
        if let Some(range) = &options.range {
            range.validate()?;
            request = request.range(range.to_header());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if is_not_found(&e) => return Err(StorageError::not_found(key)),
            Err(e) if status_of(&e) == Some(416) => {
                let (start_byte, end_byte) = options
                    .range
                    .map(|range| (range.start_byte, range.end_byte))
                    .unwrap_or_default();
                return Err(StorageError::InvalidRange {
                    start_byte,
                    end_byte,
                    reason: "range starts beyond the end of the object".to_string(),
                });
            }
            Err(e) => return Err(StorageError::backend(BACKEND, e)),
        };

        let uploaded_at = uploaded_at(response.last_modified());
        let content_type = response.content_type().map(str::to_string);
        let custom_metadata = decode_custom_metadata(response.metadata());
        let content = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::backend(BACKEND, e))?
            .into_bytes();

        Ok(FileObject {
            metadata: FileMetadata::new(key, content.len() as u64, uploaded_at)
                .with_mime_type(content_type)
                .with_custom_metadata(custom_metadata),
            content,
        })
    }

    async fn get_metadata(&self, key: &str) -> StorageResult<Option<FileMetadata>> {
        let full_key = self.object_key(key)?;
        self.head(key, &full_key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let full_key = self.object_key(key)?;
        // DeleteObject succeeds for missing keys, so check first.
        if self.head(key, &full_key).await?.is_none() {
            return Ok(false);
        }
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
            .map_err(|e| StorageError::backend(BACKEND, e))?;
        debug!(bucket = %self.bucket, full_key = %full_key, "Deleted object");
        Ok(true)
    }

    async fn list(&self, options: ListOptions) -> StorageResult<ListResult> {
        let prefix = self.list_prefix(options.prefix.as_deref().unwrap_or_default());
        let mut request = self.client.list_objects_v2().bucket(&self.bucket);
        if !prefix.is_empty() {
            request = request.prefix(&prefix);
        }
        if let Some(limit) = options.limit.filter(|limit| *limit > 0) {
            request = request.max_keys(i32::try_from(limit).unwrap_or(i32::MAX));
        }
        if let Some(cursor) = options.cursor {
            request = request.continuation_token(cursor);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StorageError::backend(BACKEND, e))?;

        let files = response
            .contents()
            .iter()
            .filter_map(|object| {
                let key = strip_prefix(object.key()?, self.base_path.as_deref());
                let size = object.size().unwrap_or_default().max(0) as u64;
                Some(FileMetadata::new(&key, size, uploaded_at(object.last_modified())))
            })
            .collect();

        let has_more = response.is_truncated().unwrap_or(false);
        let next_cursor = if has_more {
            response.next_continuation_token().map(str::to_string)
        } else {
            None
        };
        Ok(ListResult {
            files,
            next_cursor,
            has_more,
        })
    }

    async fn get_signed_url(&self, key: &str, options: SignedUrlOptions) -> StorageResult<String> {
        let full_key = self.object_key(key)?;
        let presigning_config = presigning_config(&options)?;

        let mut request = self.client.get_object().bucket(&self.bucket).key(&full_key);
        if let Some(content_type) = options.content_type {
            request = request.response_content_type(content_type);
        }
        let presigned = request
            .presigned(presigning_config)
            .await
            .map_err(|e| StorageError::Presign {
                reason: format!("Failed to generate presigned GET URL: {e}"),
            })?;

        Ok(presigned.uri().to_string())
    }

    async fn get_signed_url_upload(
        &self,
        key: &str,
        options: SignedUrlOptions,
    ) -> StorageResult<SignedUploadUrl> {
        let full_key = self.object_key(key)?;
        let presigning_config = presigning_config(&options)?;

        let mut request = self.client.put_object().bucket(&self.bucket).key(&full_key);
        if let Some(content_type) = options.content_type {
            request = request.content_type(content_type);
        }
        let presigned = request
            .presigned(presigning_config)
            .await
            .map_err(|e| StorageError::Presign {
                reason: format!("Failed to generate presigned PUT URL: {e}"),
            })?;

        let mut signed = SignedUploadUrl::new(presigned.uri().to_string());
        for (name, value) in presigned.headers() {
            signed = signed.with_header(name, value);
        }
        Ok(signed)
    }

    async fn copy(&self, source_key: &str, destination_key: &str) -> StorageResult<FileMetadata> {
        let source_full_key = self.object_key(source_key)?;
        let destination_full_key = self.object_key(destination_key)?;

        let copy_source = format!(
            "{}/{}",
            self.bucket,
            urlencoding::encode(&source_full_key)
        );
        match self
            .client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(copy_source)
            .key(&destination_full_key)
            .send()
            .await
        {
            Ok(_) => {}
            Err(e) if is_not_found(&e) => return Err(StorageError::not_found(source_key)),
            Err(e) => return Err(StorageError::backend(BACKEND, e)),
        }

        debug!(
            bucket = %self.bucket,
            source = %source_full_key,
            destination = %destination_full_key,
            "Copied object"
        );
        self.head(destination_key, &destination_full_key)
            .await?
            .ok_or_else(|| StorageError::not_found(destination_key))
    }
}

fn presigning_config(options: &SignedUrlOptions) -> StorageResult<PresigningConfig> {
    let expires_in = options.expiry()?;
    PresigningConfig::expires_in(expires_in).map_err(|e| StorageError::Presign {
        reason: format!("Failed to create presigning config: {e}"),
    })
}

fn status_of<E>(err: &SdkError<E, HttpResponse>) -> Option<u16> {
    err.raw_response().map(|response| response.status().as_u16())
}

fn is_not_found<E>(err: &SdkError<E, HttpResponse>) -> bool {
    status_of(err) == Some(404)
}

fn uploaded_at(last_modified: Option<&SmithyDateTime>) -> DateTime<Utc> {
    last_modified
        .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
        .unwrap_or_else(Utc::now)
}

/// Custom metadata from S3 user metadata.
///
/// Prefers the JSON document written on upload. Objects written by other
/// clients expose their user metadata as plain string values.
fn decode_custom_metadata(metadata: Option<&HashMap<String, String>>) -> Option<CustomMetadata> {
    let metadata = metadata?;
    if let Some(encoded) = metadata.get(CUSTOM_METADATA_KEY) {
        if let Ok(decoded) = serde_json::from_str::<CustomMetadata>(encoded) {
            return Some(decoded);
        }
    }
    let fallback: CustomMetadata = metadata
        .iter()
        .filter(|(name, _)| name.as_str() != CUSTOM_METADATA_KEY)
        .map(|(name, value)| (name.clone(), serde_json::Value::String(value.clone())))
        .collect();
    Some(fallback).filter(|m| !m.is_empty())
}
