//! Vercel Blob storage backend over the blob HTTP API.
//!
//! Blobs are always public, byte-range reads are unavailable and custom
//! metadata is not persisted. Signed uploads are granted through client
//! tokens derived from the read-write token.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;
use url::Url;

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
    StorageError,
    StorageResult,
    UploadOptions,
    VercelBlobConfig,
    content::to_bytes,
    key::{ensure_key, full_key, normalize_base_path, strip_prefix},
};

const BACKEND: &str = "vercel_blob";

/// Blob API version the requests are written against.
pub const API_VERSION: &str = "7";

const CLIENT_TOKEN_PREFIX: &str = "vercel_blob_client";

/// Blob record returned by the head and list endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlobRecord {
    url: String,
    pathname: String,
    size: u64,
    uploaded_at: DateTime<Utc>,
    #[serde(default)]
    content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutResponse {
    url: String,
    pathname: String,
    #[serde(default)]
    content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    blobs: Vec<BlobRecord>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    urls: Vec<&'a str>,
}

/// Payload signed into a client token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientTokenPayload<'a> {
    pathname: &'a str,
    valid_until: i64,
    add_random_suffix: bool,
    allow_overwrite: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_content_types: Option<Vec<&'a str>>,
}

/// Vercel Blob storage adapter.
#[derive(Clone)]
pub struct VercelBlobAdapter {
    client: reqwest::Client,
    token: String,
    api_url: Url,
    base_path: Option<String>,
}

impl std::fmt::Debug for VercelBlobAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VercelBlobAdapter")
            .field("api_url", &self.api_url.as_str())
            .field("base_path", &self.base_path)
            .finish_non_exhaustive()
    }
}

impl VercelBlobAdapter {
    pub fn new(config: VercelBlobConfig) -> StorageResult<Self> {
        if config.token.trim().is_empty() {
            return Err(StorageError::config("vercel_blob token is required"));
        }
        let api_url = Url::parse(&config.api_url).map_err(|e| {
            StorageError::config(format!("invalid vercel_blob api_url '{}': {e}", config.api_url))
        })?;
        let base_path = normalize_base_path(config.base_path.as_deref());
        debug!(api_url = %api_url, base_path = ?base_path, "Created Vercel Blob storage adapter");
        Ok(Self {
            client: reqwest::Client::new(),
            token: config.token,
            api_url,
            base_path,
        })
    }

    fn pathname(&self, key: &str) -> StorageResult<String> {
        ensure_key(key)?;
        Ok(full_key(key, self.base_path.as_deref()))
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Url {
        let mut url = self.api_url.clone();
        url.set_path(path);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("x-api-version", API_VERSION)
    }

    async fn head(&self, pathname: &str) -> StorageResult<Option<BlobRecord>> {
        let url = self.endpoint("/", &[("url", pathname)]);
        let response = send(self.request(Method::GET, url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(json(response).await?))
    }

    fn to_metadata(&self, record: &BlobRecord) -> FileMetadata {
        let key = strip_prefix(&record.pathname, self.base_path.as_deref());
        FileMetadata::new(&key, record.size, record.uploaded_at)
            .with_mime_type(record.content_type.clone())
    }

    /// Client token authorizing a single upload to `pathname`.
    fn client_token(
        &self,
        pathname: &str,
        valid_until: DateTime<Utc>,
        content_type: Option<&str>,
    ) -> StorageResult<String> {
        let store_id = self.token.split('_').nth(3).unwrap_or_default();
        let payload = serde_json::to_vec(&ClientTokenPayload {
            pathname,
            valid_until: valid_until.timestamp_millis(),
            add_random_suffix: false,
            allow_overwrite: true,
            allowed_content_types: content_type.map(|content_type| vec![content_type]),
        })?;
        let payload = STANDARD.encode(payload);

        let mut mac = Hmac::<Sha256>::new_from_slice(self.token.as_bytes()).map_err(|e| {
            StorageError::Presign {
                reason: format!("Failed to initialize token signer: {e}"),
            }
        })?;
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!(
            "{CLIENT_TOKEN_PREFIX}_{store_id}_{}",
            STANDARD.encode(format!("{signature}.{payload}"))
        ))
    }
}

#[async_trait]
impl StorageAdapter for VercelBlobAdapter {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn resolve_key(&self, key: &str) -> StorageResult<String> {
        self.pathname(key)
    }

    async fn upload(
        &self,
        key: &str,
        content: Content,
        options: UploadOptions,
    ) -> StorageResult<FileMetadata> {
        let pathname = self.pathname(key)?;
        let data = to_bytes(content).await?;
        let size = data.len() as u64;
        let mime_type = FileMetadata::new(key, size, Utc::now())
            .with_mime_type(options.content_type)
            .mime_type;

        let mut request = self
            .request(Method::PUT, self.endpoint("/", &[("pathname", pathname.as_str())]))
            .header("x-content-type", &mime_type)
            .header("x-add-random-suffix", "0")
            .header("x-allow-overwrite", "1");
        if let Some(max_age) = options.cache_control.as_deref().and_then(max_age) {
            request = request.header("x-cache-control-max-age", max_age.to_string());
        }

        let response = ensure_success(send(request.body(data)).await?).await?;
        let put: PutResponse = json(response).await?;

        debug!(pathname = %put.pathname, url = %put.url, size, "Uploaded blob");
        Ok(FileMetadata::new(key, size, Utc::now())
            .with_mime_type(put.content_type.or(Some(mime_type))))
    }

    async fn download(&self, key: &str, options: DownloadOptions) -> StorageResult<FileObject> {
        let pathname = self.pathname(key)?;
        if options.range.is_some() {
            return Err(StorageError::Unsupported {
                backend: BACKEND,
                operation: "byte-range download",
            });
        }

        let record = self
            .head(&pathname)
            .await?
            .ok_or_else(|| StorageError::not_found(key))?;
        let url = Url::parse(&record.url).map_err(|e| StorageError::backend(BACKEND, e))?;
        let response = send(self.client.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StorageError::not_found(key));
        }
        let content = ensure_success(response)
            .await?
            .bytes()
            .await
            .map_err(|e| StorageError::backend(BACKEND, e))?;

        Ok(FileObject {
            metadata: FileMetadata {
                size_in_bytes: content.len() as u64,
                ..self.to_metadata(&record)
            },
            content,
        })
    }

    async fn get_metadata(&self, key: &str) -> StorageResult<Option<FileMetadata>> {
        let pathname = self.pathname(key)?;
        Ok(self
            .head(&pathname)
            .await?
            .map(|record| self.to_metadata(&record)))
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let pathname = self.pathname(key)?;
        let Some(record) = self.head(&pathname).await? else {
            return Ok(false);
        };
        let request = self
            .request(Method::POST, self.endpoint("/delete", &[]))
            .json(&DeleteRequest {
                urls: vec![record.url.as_str()],
            });
        ensure_success(send(request).await?).await?;
        debug!(pathname = %pathname, "Deleted blob");
        Ok(true)
    }

    async fn list(&self, options: ListOptions) -> StorageResult<ListResult> {
        let prefix = match &self.base_path {
            Some(base_path) => format!("{base_path}/{}", options.prefix.unwrap_or_default()),
            None => options.prefix.unwrap_or_default(),
        };
        let limit = options.limit.filter(|limit| *limit > 0).map(|l| l.to_string());

        let mut query = Vec::new();
        if !prefix.is_empty() {
            query.push(("prefix", prefix.as_str()));
        }
        if let Some(limit) = &limit {
            query.push(("limit", limit.as_str()));
        }
        if let Some(cursor) = &options.cursor {
            query.push(("cursor", cursor.as_str()));
        }

        let response = ensure_success(
            send(self.request(Method::GET, self.endpoint("/", &query))).await?,
        )
        .await?;
        let listed: ListResponse = json(response).await?;

        Ok(ListResult {
            files: listed
                .blobs
                .iter()
                .map(|record| self.to_metadata(record))
                .collect(),
            next_cursor: listed.cursor.filter(|_| listed.has_more),
            has_more: listed.has_more,
        })
    }

    async fn get_signed_url(&self, key: &str, options: SignedUrlOptions) -> StorageResult<String> {
        let pathname = self.pathname(key)?;
        // Blobs are public, the URL does not expire.
        options.expiry()?;
        let record = self
            .head(&pathname)
            .await?
            .ok_or_else(|| StorageError::not_found(key))?;
        Ok(record.url)
    }

    async fn get_signed_url_upload(
        &self,
        key: &str,
        options: SignedUrlOptions,
    ) -> StorageResult<SignedUploadUrl> {
        let pathname = self.pathname(key)?;
        let expires_in = options.expiry()?;
        let valid_until = Utc::now() +
            chrono::Duration::from_std(expires_in).map_err(|e| StorageError::Presign {
                reason: e.to_string(),
            })?;
        let token = self.client_token(&pathname, valid_until, options.content_type.as_deref())?;

        let mut signed = SignedUploadUrl::new(
            self.endpoint("/", &[("pathname", pathname.as_str())]).to_string(),
        )
        .with_header("authorization", format!("Bearer {token}"))
        .with_header("x-api-version", API_VERSION);
        if let Some(content_type) = options.content_type {
            signed = signed.with_header("x-content-type", content_type);
        }
        Ok(signed)
    }

    async fn copy(&self, source_key: &str, destination_key: &str) -> StorageResult<FileMetadata> {
        let source_pathname = self.pathname(source_key)?;
        let destination_pathname = self.pathname(destination_key)?;

        let source = self
            .head(&source_pathname)
            .await?
            .ok_or_else(|| StorageError::not_found(source_key))?;

        let mut request = self
            .request(
                Method::PUT,
                self.endpoint(
                    "/",
                    &[
                        ("pathname", destination_pathname.as_str()),
                        ("fromUrl", source.url.as_str()),
                    ],
                ),
            )
            .header("x-add-random-suffix", "0")
            .header("x-allow-overwrite", "1");
        if let Some(content_type) = &source.content_type {
            request = request.header("x-content-type", content_type);
        }
        let response = ensure_success(send(request).await?).await?;
        let put: PutResponse = json(response).await?;

        debug!(source = %source.pathname, destination = %put.pathname, "Copied blob");
        Ok(FileMetadata::new(destination_key, source.size, Utc::now())
            .with_mime_type(put.content_type.or(source.content_type)))
    }
}

async fn send(request: RequestBuilder) -> StorageResult<Response> {
    request
        .send()
        .await
        .map_err(|e| StorageError::backend(BACKEND, e))
}

async fn ensure_success(response: Response) -> StorageResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::backend(
        BACKEND,
        anyhow::anyhow!("request failed with status {status}: {body}"),
    ))
}

async fn json<T: serde::de::DeserializeOwned>(response: Response) -> StorageResult<T> {
    let response = ensure_success(response).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| StorageError::backend(BACKEND, e))
}

/// `max-age` directive of a `Cache-Control` value.
fn max_age(cache_control: &str) -> Option<u64> {
    cache_control.split(',').find_map(|directive| {
        let (name, value) = directive.trim().split_once('=')?;
        if name.trim().eq_ignore_ascii_case("max-age") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}
