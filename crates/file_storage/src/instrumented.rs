//! Instrumented storage adapter decorator.
//!
//! Wraps any [`StorageAdapter`] and records operation latency and failures,
//! labelled by operation and backend name.

use std::{future::Future, sync::Arc, time::Instant};

use async_trait::async_trait;
use opentelemetry::KeyValue;

use crate::{
    Content,
    DownloadOptions,
    FileMetadata,
    FileObject,
    ListOptions,
    ListResult,
    SignedUploadUrl,
    SignedUrlOptions,
    StorageAdapter,
    StorageMetrics,
    StorageResult,
    UploadOptions,
};

pub struct InstrumentedAdapter {
    inner: Arc<dyn StorageAdapter>,
    metrics: StorageMetrics,
}

impl InstrumentedAdapter {
    pub fn new(inner: Arc<dyn StorageAdapter>, metrics: StorageMetrics) -> Self {
        Self { inner, metrics }
    }

    pub fn inner(&self) -> &Arc<dyn StorageAdapter> {
        &self.inner
    }

    async fn record<T, F>(&self, op: &'static str, operation: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>> + Send,
    {
        let labels = [
            KeyValue::new("op", op),
            KeyValue::new("backend", self.inner.backend_name()),
        ];
        let started = Instant::now();
        let result = operation.await;
        self.metrics.observe(&labels, started.elapsed(), result.is_err());
        result
    }
}

#[async_trait]
impl StorageAdapter for InstrumentedAdapter {
    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }

    fn resolve_key(&self, key: &str) -> StorageResult<String> {
        self.inner.resolve_key(key)
    }

    async fn upload(
        &self,
        key: &str,
        content: Content,
        options: UploadOptions,
    ) -> StorageResult<FileMetadata> {
        self.record("upload", self.inner.upload(key, content, options))
            .await
    }

    async fn download(&self, key: &str, options: DownloadOptions) -> StorageResult<FileObject> {
        self.record("download", self.inner.download(key, options))
            .await
    }

    async fn get_metadata(&self, key: &str) -> StorageResult<Option<FileMetadata>> {
        self.record("get_metadata", self.inner.get_metadata(key))
            .await
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        self.record("delete", self.inner.delete(key)).await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.record("exists", self.inner.exists(key)).await
    }

    async fn list(&self, options: ListOptions) -> StorageResult<ListResult> {
        self.record("list", self.inner.list(options)).await
    }

    async fn get_signed_url(&self, key: &str, options: SignedUrlOptions) -> StorageResult<String> {
        self.record("get_signed_url", self.inner.get_signed_url(key, options))
            .await
    }

    async fn get_signed_url_upload(
        &self,
        key: &str,
        options: SignedUrlOptions,
    ) -> StorageResult<SignedUploadUrl> {
        self.record(
            "get_signed_url_upload",
            self.inner.get_signed_url_upload(key, options),
        )
        .await
    }

    async fn copy(&self, source_key: &str, destination_key: &str) -> StorageResult<FileMetadata> {
        self.record("copy", self.inner.copy(source_key, destination_key))
            .await
    }

    async fn move_object(
        &self,
        source_key: &str,
        destination_key: &str,
    ) -> StorageResult<FileMetadata> {
        self.record("move", self.inner.move_object(source_key, destination_key))
            .await
    }
}
