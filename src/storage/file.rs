use crate::core::parse_error_response;
use crate::storage::StorageError;
use rand::distr::Alphanumeric;
use rand::Rng;
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Custom metadata key Firebase uses to authorize token-based download URLs.
pub const DOWNLOAD_TOKENS_KEY: &str = "firebaseStorageDownloadTokens";

/// Represents a file within a Google Cloud Storage bucket.
pub struct File {
    client: ClientWithMiddleware,
    api_root: String,
    download_root: String,
    bucket_name: String,
    name: String,
}

/// Metadata for a Google Cloud Storage object.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

impl File {
    pub(crate) fn new(
        client: ClientWithMiddleware,
        api_root: String,
        download_root: String,
        bucket_name: String,
        name: String,
    ) -> Self {
        Self {
            client,
            api_root,
            download_root,
            bucket_name,
            name,
        }
    }

    /// Returns the name of the file.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the bucket containing the file.
    pub fn bucket(&self) -> &str {
        &self.bucket_name
    }

    /// Uploads `body` and attaches a fresh download token, returning the
    /// stored object's metadata.
    ///
    /// Uses a `multipart/related` upload so content and metadata are written
    /// in one request.
    pub async fn save(&self, body: Vec<u8>, mime_type: &str) -> Result<ObjectMetadata, StorageError> {
        let url = format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=multipart",
            self.api_root, self.bucket_name
        );

        let metadata = ObjectMetadata {
            name: Some(self.name.clone()),
            content_type: Some(mime_type.to_string()),
            metadata: Some(HashMap::from([(DOWNLOAD_TOKENS_KEY.to_string(), random_token())])),
            ..Default::default()
        };

        let boundary = format!("upload_{}", random_token());
        let mut payload = Vec::with_capacity(body.len() + 512);
        payload.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        payload.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        payload.extend_from_slice(&serde_json::to_vec(&metadata)?);
        payload.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
        payload.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime_type).as_bytes());
        payload.extend_from_slice(&body);
        payload.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        let response = self
            .client
            .post(&url)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StorageError::ApiError(
                parse_error_response(response, "Upload failed").await,
            ));
        }

        Ok(response.json().await?)
    }

    /// Deletes the file.
    pub async fn delete(&self) -> Result<(), StorageError> {
        let url = format!(
            "{}/storage/v1/b/{}/o/{}",
            self.api_root,
            self.bucket_name,
            urlencoding::encode(&self.name)
        );

        let response = self.client.delete(&url).send().await?;

        if !response.status().is_success() {
            return Err(StorageError::ApiError(
                parse_error_response(response, "Delete failed").await,
            ));
        }

        Ok(())
    }

    /// Builds the Firebase download URL for this file, given a download token
    /// from its metadata.
    pub fn download_url(&self, token: &str) -> String {
        format!(
            "{}/v0/b/{}/o/{}?alt=media&token={}",
            self.download_root,
            self.bucket_name,
            urlencoding::encode(&self.name),
            token
        )
    }
}

fn random_token() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}
