//! Core storage adapter trait.

use async_trait::async_trait;
use tracing::warn;

use crate::{
    Content,
    DownloadOptions,
    FileMetadata,
    FileObject,
    ListOptions,
    ListResult,
    SignedUploadUrl,
    SignedUrlOptions,
    StorageError,
    StorageResult,
    UploadOptions,
    key::{ensure_key, normalize},
};

/// Uniform operations over a file storage backend.
///
/// All keys are caller-facing keys; each adapter maps them into its
/// configured namespace prefix. Switching the adapter behind a call site must
/// not change behavior except where a backend lacks a capability, in which
/// case the operation fails with [`StorageError::Unsupported`].
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Short backend name, used in errors and metric labels.
    fn backend_name(&self) -> &'static str;

    /// Backend address of `key`. Two keys with the same address name the
    /// same object.
    fn resolve_key(&self, key: &str) -> StorageResult<String> {
        ensure_key(key)?;
        Ok(normalize(key))
    }

    /// Store content at `key`, replacing any existing file.
    ///
    /// The returned size is the size of the normalized content, not a size
    /// declared by the caller.
    async fn upload(
        &self,
        key: &str,
        content: Content,
        options: UploadOptions,
    ) -> StorageResult<FileMetadata>;

    /// Download a file, optionally restricted to an inclusive byte range.
    ///
    /// Returns `StorageError::NotFound` if the file doesn't exist.
    async fn download(&self, key: &str, options: DownloadOptions) -> StorageResult<FileObject>;

    /// Get file metadata without downloading content.
    ///
    /// A missing file yields `Ok(None)`.
    async fn get_metadata(&self, key: &str) -> StorageResult<Option<FileMetadata>>;

    /// Delete a file. Returns whether a file was actually removed.
    async fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Check whether a file exists.
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get_metadata(key).await?.is_some())
    }

    /// List one page of files.
    async fn list(&self, options: ListOptions) -> StorageResult<ListResult>;

    /// URL granting read access to a file without further credentials.
    async fn get_signed_url(&self, key: &str, options: SignedUrlOptions) -> StorageResult<String>;

    /// URL (and required headers) granting upload access to `key`.
    async fn get_signed_url_upload(
        &self,
        key: &str,
        options: SignedUrlOptions,
    ) -> StorageResult<SignedUploadUrl>;

    /// Copy a file. Returns the metadata of the new file.
    ///
    /// Returns `StorageError::NotFound` if the source doesn't exist.
    async fn copy(&self, source_key: &str, destination_key: &str) -> StorageResult<FileMetadata>;

    /// Move a file as copy-then-delete.
    ///
    /// If deleting the source fails, the destination copy is deleted again so
    /// that the source stays the only copy. If that rollback fails too, the
    /// error is [`StorageError::MoveRollbackFailed`] and both files may exist.
    ///
    /// Moving a file onto its own address leaves it in place.
    async fn move_object(
        &self,
        source_key: &str,
        destination_key: &str,
    ) -> StorageResult<FileMetadata> {
        if self.resolve_key(source_key)? == self.resolve_key(destination_key)? {
            return self
                .get_metadata(destination_key)
                .await?
                .ok_or_else(|| StorageError::not_found(source_key));
        }

        let metadata = self.copy(source_key, destination_key).await?;

        let cause = match self.delete(source_key).await {
            Ok(_) => return Ok(metadata),
            Err(e) => e,
        };

        warn!(
            backend = self.backend_name(),
            source_key,
            destination_key,
            error = %cause,
            "Failed to delete move source, rolling back destination"
        );

        match self.delete(destination_key).await {
            Ok(_) => Err(StorageError::MoveFailed {
                source_key: source_key.to_string(),
                destination_key: destination_key.to_string(),
                cause: Box::new(cause),
            }),
            Err(rollback) => {
                warn!(
                    backend = self.backend_name(),
                    destination_key,
                    error = %rollback,
                    "Rollback of move destination failed"
                );
                Err(StorageError::MoveRollbackFailed {
                    source_key: source_key.to_string(),
                    destination_key: destination_key.to_string(),
                    cause: Box::new(cause),
                    rollback: Box::new(rollback),
                })
            }
        }
    }
}
