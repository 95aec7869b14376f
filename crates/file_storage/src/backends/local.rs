//! Local filesystem storage backend.
//!
//! Each file is stored as two records: the data file at
//! `root_dir/<full key>` and a JSON sidecar at
//! `root_dir/<full key>.metadata.json` holding its [`FileMetadata`]. The
//! filesystem has no place for arbitrary metadata, so the sidecar carries MIME
//! type and custom metadata. When the sidecar is missing or unreadable the
//! record is rebuilt from file attributes.

use std::{
    io::SeekFrom,
    path::{Component, Path, PathBuf},
};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::{
    Content,
    DownloadOptions,
    FileMetadata,
    FileObject,
    FilesystemConfig,
    ListOptions,
    ListResult,
    SignedUploadUrl,
    SignedUrlOptions,
    StorageAdapter,
    StorageError,
    StorageResult,
    UploadOptions,
    content::to_bytes,
    key::{ensure_key, full_key, normalize, normalize_base_path, strip_prefix},
};

const BACKEND: &str = "filesystem";

/// Suffix of the sidecar metadata record stored next to each data file.
pub const METADATA_SUFFIX: &str = ".metadata.json";

/// Local filesystem storage adapter.
#[derive(Debug, Clone)]
pub struct LocalAdapter {
    root_dir: PathBuf,
    base_path: Option<String>,
    base_url: Option<String>,
}

impl LocalAdapter {
    /// Create a new local filesystem adapter.
    pub fn new(config: FilesystemConfig) -> StorageResult<Self> {
        if config.root_dir.as_os_str().is_empty() {
            return Err(StorageError::config("filesystem root_dir is required"));
        }
        let base_path = normalize_base_path(config.base_path.as_deref());
        debug!(
            root_dir = %config.root_dir.display(),
            base_path = ?base_path,
            "Created filesystem storage adapter"
        );
        Ok(Self {
            root_dir: config.root_dir,
            base_path,
            base_url: config.base_url.filter(|url| !url.is_empty()),
        })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Full key for a caller key, rejecting keys that would escape the root
    /// or collide with a sidecar record.
    fn object_key(&self, key: &str) -> StorageResult<String> {
        ensure_key(key)?;
        let full = normalize(&full_key(key, self.base_path.as_deref()));
        if full.split('/').any(|segment| segment == "..") {
            return Err(StorageError::invalid_key(key, "key must not contain '..'"));
        }
        if full.ends_with(METADATA_SUFFIX) {
            return Err(StorageError::invalid_key(
                key,
                format!("key must not end with '{METADATA_SUFFIX}'"),
            ));
        }
        Ok(full)
    }

    fn data_path(&self, full_key: &str) -> PathBuf {
        self.root_dir.join(full_key)
    }

    fn metadata_path(&self, full_key: &str) -> PathBuf {
        self.root_dir.join(format!("{full_key}{METADATA_SUFFIX}"))
    }

    /// Caller key for a path under the root directory.
    fn path_to_key(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root_dir).ok()?;
        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => segments.push(segment.to_str()?.to_string()),
                _ => return None,
            }
        }
        Some(strip_prefix(&segments.join("/"), self.base_path.as_deref()))
    }

    async fn read_metadata(&self, key: &str, full_key: &str) -> StorageResult<Option<FileMetadata>> {
        let path = self.data_path(full_key);
        let attributes = match tokio::fs::metadata(&path).await {
            Ok(attributes) if attributes.is_file() => attributes,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let metadata_path = self.metadata_path(full_key);
        let stored = match tokio::fs::read(&metadata_path).await {
            Ok(raw) => match serde_json::from_slice::<FileMetadata>(&raw) {
                Ok(stored) => Some(stored),
                Err(e) => {
                    warn!(
                        path = %metadata_path.display(),
                        error = %e,
                        "Unreadable metadata sidecar, falling back to file attributes"
                    );
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let metadata = match stored {
            // The data file is authoritative for the size.
            Some(stored) => FileMetadata {
                size_in_bytes: attributes.len(),
                ..stored.rekeyed(key)
            },
            None => {
                let modified = attributes
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());
                FileMetadata::new(key, attributes.len(), modified)
            }
        };
        Ok(Some(metadata))
    }

    async fn write_metadata(&self, full_key: &str, metadata: &FileMetadata) -> StorageResult<()> {
        let encoded = serde_json::to_vec_pretty(metadata)?;
        write_atomic(&self.metadata_path(full_key), &encoded).await
    }

    /// All caller keys under the configured namespace, sorted.
    async fn collect_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        // Only descend into the directory the prefix pins down.
        let prefix_dir = match prefix.rsplit_once('/') {
            Some((dir, _)) => dir,
            None => "",
        };
        let start = match normalize_base_path(self.base_path.as_deref()) {
            Some(base) => self.root_dir.join(base).join(prefix_dir),
            None => self.root_dir.join(prefix_dir),
        };

        match tokio::fs::metadata(&start).await {
            Ok(attributes) if attributes.is_dir() => {}
            Ok(_) => return Ok(Vec::new()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        }

        let mut keys = Vec::new();
        let mut stack = vec![start];
        while let Some(dir) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                // Removed since it was discovered.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    stack.push(path);
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }
                let Some(key) = self.path_to_key(&path) else {
                    continue;
                };
                if key.ends_with(METADATA_SUFFIX) || is_temp_file(&key) {
                    continue;
                }
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl StorageAdapter for LocalAdapter {
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

        write_atomic(&self.data_path(&full_key), &data).await?;

        let metadata = FileMetadata::new(key, data.len() as u64, Utc::now())
            .with_mime_type(options.content_type)
            .with_custom_metadata(options.metadata);
        self.write_metadata(&full_key, &metadata).await?;

        debug!(key, full_key = %full_key, size = data.len(), "Uploaded file");
        Ok(metadata)
    }

    async fn download(&self, key: &str, options: DownloadOptions) -> StorageResult<FileObject> {
        let full_key = self.object_key(key)?;
        if let Some(range) = &options.range {
            range.validate()?;
        }
        let metadata = self
            .read_metadata(key, &full_key)
            .await?
            .ok_or_else(|| StorageError::not_found(key))?;

        let path = self.data_path(&full_key);
        let content = match options.range {
            Some(requested) => {
                // Empty files have no satisfiable range.
                let range = requested.clamp_to(metadata.size_in_bytes).ok_or_else(|| {
                    StorageError::InvalidRange {
                        start_byte: requested.start_byte,
                        end_byte: requested.end_byte,
                        reason: "range starts beyond the end of the file".to_string(),
                    }
                })?;
                let mut file = tokio::fs::File::open(&path).await.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        StorageError::not_found(key)
                    } else {
                        e.into()
                    }
                })?;
                file.seek(SeekFrom::Start(range.start_byte)).await?;
                let mut buffer = Vec::new();
                file.take(range.len()).read_to_end(&mut buffer).await?;
                Bytes::from(buffer)
            }
            None => match tokio::fs::read(&path).await {
                Ok(data) => Bytes::from(data),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(StorageError::not_found(key))
                }
                Err(e) => return Err(e.into()),
            },
        };

        Ok(FileObject {
            metadata: FileMetadata {
                size_in_bytes: content.len() as u64,
                ..metadata
            },
            content,
        })
    }

    async fn get_metadata(&self, key: &str) -> StorageResult<Option<FileMetadata>> {
        let full_key = self.object_key(key)?;
        self.read_metadata(key, &full_key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let full_key = self.object_key(key)?;
        match tokio::fs::remove_file(self.data_path(&full_key)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        match tokio::fs::remove_file(self.metadata_path(&full_key)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        debug!(key, full_key = %full_key, "Deleted file");
        Ok(true)
    }

    async fn list(&self, options: ListOptions) -> StorageResult<ListResult> {
        let prefix = options.prefix.unwrap_or_default();
        let after = options.cursor.as_deref().map(decode_cursor).transpose()?;

        let keys = self.collect_keys(&prefix).await?;
        let remaining = keys
            .into_iter()
            .filter(|key| after.as_deref().map_or(true, |after| key.as_str() > after));

        let limit = options.limit.filter(|limit| *limit > 0);
        let mut files = Vec::new();
        let mut has_more = false;
        for key in remaining {
            if limit.is_some_and(|limit| files.len() >= limit) {
                has_more = true;
                break;
            }
            // A file removed since the directory walk is skipped.
            let full = full_key(&key, self.base_path.as_deref());
            if let Some(metadata) = self.read_metadata(&key, &full).await? {
                files.push(metadata);
            }
        }

        let next_cursor = if has_more {
            files.last().map(|last| encode_cursor(&last.key))
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
        options.expiry()?;
        let base_url = self.base_url.as_deref().ok_or_else(|| {
            StorageError::config("filesystem backend needs base_url to generate URLs")
        })?;
        Ok(format!("{}/{}", base_url.trim_end_matches('/'), full_key))
    }

    async fn get_signed_url_upload(
        &self,
        _key: &str,
        _options: SignedUrlOptions,
    ) -> StorageResult<SignedUploadUrl> {
        Err(StorageError::Unsupported {
            backend: BACKEND,
            operation: "signed upload URL",
        })
    }

    async fn copy(&self, source_key: &str, destination_key: &str) -> StorageResult<FileMetadata> {
        let source_full_key = self.object_key(source_key)?;
        let destination_full_key = self.object_key(destination_key)?;

        let source = self
            .read_metadata(source_key, &source_full_key)
            .await?
            .ok_or_else(|| StorageError::not_found(source_key))?;

        let destination_path = self.data_path(&destination_full_key);
        let temp_path = temp_path_for(&destination_path);
        if let Some(parent) = destination_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let copied = tokio::fs::copy(self.data_path(&source_full_key), &temp_path).await;
        let size = match copied {
            Ok(size) => size,
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                if e.kind() == std::io::ErrorKind::NotFound {
                    return Err(StorageError::not_found(source_key));
                }
                return Err(e.into());
            }
        };
        if let Err(e) = tokio::fs::rename(&temp_path, &destination_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        let metadata = FileMetadata {
            size_in_bytes: size,
            uploaded_at: Utc::now(),
            ..source.rekeyed(destination_key)
        };
        self.write_metadata(&destination_full_key, &metadata).await?;

        debug!(source_key, destination_key, "Copied file");
        Ok(metadata)
    }
}

/// Write through a temporary sibling and rename it into place, so readers
/// never observe a partially written file.
async fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let temp_path = temp_path_for(path);
    let written = async {
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.flush().await?;
        file.sync_all().await?;
        tokio::fs::rename(&temp_path, path).await
    }
    .await;
    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    Ok(())
}

const TEMP_MARKER: &str = ".tmp-";

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}{TEMP_MARKER}{}", uuid::Uuid::new_v4()))
}

fn is_temp_file(key: &str) -> bool {
    let name = crate::key::extract_name(key);
    name.starts_with('.') && name.contains(TEMP_MARKER)
}

fn encode_cursor(last_key: &str) -> String {
    URL_SAFE_NO_PAD.encode(last_key.as_bytes())
}

fn decode_cursor(cursor: &str) -> StorageResult<String> {
    URL_SAFE_NO_PAD
        .decode(cursor)
        .ok()
        .and_then(|raw| String::from_utf8(raw).ok())
        .ok_or_else(|| StorageError::config(format!("invalid list cursor '{cursor}'")))
}
