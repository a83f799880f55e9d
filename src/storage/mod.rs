//! Cloud Storage for Firebase module.
//!
//! Uploads article images with a Firebase download token, deletes them, and
//! maps download URLs back to object paths.
//!
//! # Examples
//!
//! ```rust,ignore
//! # use quiz_catalog_admin::storage::FirebaseStorage;
//! # async fn run(storage: FirebaseStorage) {
//! let bucket = storage.bucket(None); // Use default bucket
//!
//! let file = bucket.file("articles/hello.jpg");
//! let _ = file.save(jpeg_bytes, "image/jpeg").await;
//! # }
//! ```

pub mod bucket;
pub mod file;

use crate::core::build_client;
use crate::core::middleware::AuthMiddleware;
use async_trait::async_trait;
use bucket::Bucket;
use file::DOWNLOAD_TOKENS_KEY;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;

const STORAGE_API_ROOT: &str = "https://storage.googleapis.com";
const DOWNLOAD_ROOT: &str = "https://firebasestorage.googleapis.com";

/// Errors that can occur during Storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Wrapper for `reqwest::Error`.
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// Wrapper for `reqwest_middleware::Error`.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    /// Errors returned by the Cloud Storage API.
    #[error("API error: {0}")]
    ApiError(String),
    /// Wrapper for `serde_json::Error`.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    /// The URL does not point at an object of a known bucket.
    #[error("Not a storage object URL: {0}")]
    InvalidUrl(String),
}

/// Object storage as the article workflow needs it.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores `bytes` at `object_path` and returns a public download URL.
    async fn upload(&self, object_path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError>;

    /// Deletes the object a download URL (or `gs://` URL) points at.
    async fn delete_by_url(&self, url: &str) -> Result<(), StorageError>;
}

/// Client for interacting with Cloud Storage for Firebase.
#[derive(Clone)]
pub struct FirebaseStorage {
    client: ClientWithMiddleware,
    api_root: String,
    download_root: String,
    default_bucket: String,
}

impl FirebaseStorage {
    /// Creates a client whose default bucket is `default_bucket`
    /// (e.g. "my-project.appspot.com").
    pub fn new(middleware: AuthMiddleware, default_bucket: &str) -> Self {
        Self::new_with_url(middleware, default_bucket, STORAGE_API_ROOT, DOWNLOAD_ROOT)
    }

    /// Creates a client against custom endpoints such as the storage emulator.
    pub fn new_with_url(
        middleware: AuthMiddleware,
        default_bucket: &str,
        api_root: &str,
        download_root: &str,
    ) -> Self {
        Self {
            client: build_client(middleware),
            api_root: api_root.trim_end_matches('/').to_string(),
            download_root: download_root.trim_end_matches('/').to_string(),
            default_bucket: default_bucket.to_string(),
        }
    }

    /// Gets a `Bucket` instance, the default bucket when `name` is `None`.
    pub fn bucket(&self, name: Option<&str>) -> Bucket {
        Bucket::new(
            self.client.clone(),
            self.api_root.clone(),
            self.download_root.clone(),
            name.unwrap_or(&self.default_bucket).to_string(),
        )
    }
}

#[async_trait]
impl ImageStore for FirebaseStorage {
    async fn upload(&self, object_path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        let file = self.bucket(None).file(object_path);
        let metadata = file.save(bytes, content_type).await?;

        let token = metadata
            .metadata
            .as_ref()
            .and_then(|m| m.get(DOWNLOAD_TOKENS_KEY))
            .and_then(|tokens| tokens.split(',').next())
            .ok_or_else(|| StorageError::ApiError("Uploaded object has no download token".to_string()))?;

        Ok(file.download_url(token))
    }

    async fn delete_by_url(&self, url: &str) -> Result<(), StorageError> {
        let (bucket, path) = object_path_from_url(url)?;
        self.bucket(Some(&bucket)).file(&path).delete().await
    }
}

/// Resolves a Firebase download URL
/// (`https://host/v0/b/{bucket}/o/{encoded path}?...`) or a `gs://bucket/path`
/// URL to its bucket and object path.
pub fn object_path_from_url(raw: &str) -> Result<(String, String), StorageError> {
    let invalid = || StorageError::InvalidUrl(raw.to_string());
    let url = url::Url::parse(raw).map_err(|_| invalid())?;

    if url.scheme() == "gs" {
        let bucket = url.host_str().ok_or_else(invalid)?.to_string();
        let path = url.path().trim_start_matches('/');
        if path.is_empty() {
            return Err(invalid());
        }
        let path = urlencoding::decode(path).map_err(|_| invalid())?.into_owned();
        return Ok((bucket, path));
    }

    let segments: Vec<&str> = url.path_segments().ok_or_else(invalid)?.collect();
    let b = segments.iter().position(|s| *s == "b").ok_or_else(invalid)?;
    match (segments.get(b + 1), segments.get(b + 2), segments.get(b + 3)) {
        (Some(bucket), Some(&"o"), Some(object)) if !object.is_empty() => {
            let bucket = urlencoding::decode(bucket).map_err(|_| invalid())?.into_owned();
            let path = urlencoding::decode(object).map_err(|_| invalid())?.into_owned();
            Ok((bucket, path))
        }
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests;
