use super::models::{
    CommitRequest, CommitResponse, Document, DocumentMask, FieldTransform, Precondition,
    ServerValue, Write, WriteOperation, WriteResult,
};
use super::value::json_to_fields;
use super::FirestoreError;
use crate::core::parse_error_response;
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::{Map, Value};
use std::sync::Mutex;

/// A set of writes committed atomically through `documents:commit`.
///
/// # Examples
///
/// ```rust,no_run
/// # use quiz_catalog_admin::firestore::FirebaseFirestore;
/// # use serde_json::json;
/// # async fn run(firestore: FirebaseFirestore) -> Result<(), Box<dyn std::error::Error>> {
/// let batch = firestore.batch();
/// let topic = json!({ "name": { "en": "Science", "hi": "विज्ञान" } });
///
/// batch.set("topics/abc", topic.as_object().unwrap().clone(), &[])?;
/// batch.delete("topics/old")?;
/// batch.commit().await?;
/// # Ok(())
/// # }
/// ```
pub struct WriteBatch<'a> {
    client: &'a ClientWithMiddleware,
    base_url: String,
    resource_root: String,
    writes: Mutex<Vec<Write>>,
}

impl<'a> WriteBatch<'a> {
    pub(crate) fn new(client: &'a ClientWithMiddleware, base_url: String, resource_root: String) -> Self {
        Self {
            client,
            base_url,
            resource_root,
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Overwrites the document at `document_path`, creating it if missing.
    ///
    /// `server_timestamps` names top-level fields the backend fills with the
    /// commit time.
    pub fn set(
        &self,
        document_path: &str,
        fields: Map<String, Value>,
        server_timestamps: &[String],
    ) -> Result<&Self, FirestoreError> {
        let write = Write {
            operation: WriteOperation::Update(Document {
                name: self.resource_name(document_path),
                fields: json_to_fields(fields)?,
                ..Default::default()
            }),
            update_mask: None,
            update_transforms: transforms(server_timestamps),
            current_document: None,
        };

        self.push(write);
        Ok(self)
    }

    /// Updates the given top-level fields. The commit fails if the document
    /// does not exist.
    pub fn update(
        &self,
        document_path: &str,
        fields: Map<String, Value>,
        server_timestamps: &[String],
    ) -> Result<&Self, FirestoreError> {
        let field_paths = fields.keys().cloned().collect();

        let write = Write {
            operation: WriteOperation::Update(Document {
                name: self.resource_name(document_path),
                fields: json_to_fields(fields)?,
                ..Default::default()
            }),
            update_mask: Some(DocumentMask { field_paths }),
            update_transforms: transforms(server_timestamps),
            current_document: Some(Precondition {
                exists: Some(true),
                update_time: None,
            }),
        };

        self.push(write);
        Ok(self)
    }

    pub fn delete(&self, document_path: &str) -> Result<&Self, FirestoreError> {
        let write = Write {
            operation: WriteOperation::Delete(self.resource_name(document_path)),
            update_mask: None,
            update_transforms: None,
            current_document: None,
        };

        self.push(write);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Write>> {
        self.writes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, write: Write) {
        self.lock().push(write);
    }

    fn resource_name(&self, document_path: &str) -> String {
        format!("{}/{}", self.resource_root, document_path)
    }

    /// Commits the batch of writes. An empty batch makes no request.
    pub async fn commit(&self) -> Result<Vec<WriteResult>, FirestoreError> {
        let writes = std::mem::take(&mut *self.lock());

        if writes.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}:commit", self.base_url);
        let request = CommitRequest { writes };

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FirestoreError::ApiError(
                parse_error_response(response, "Commit batch failed").await,
            ));
        }

        let result: CommitResponse = response.json().await?;
        Ok(result.write_results)
    }
}

fn transforms(server_timestamps: &[String]) -> Option<Vec<FieldTransform>> {
    if server_timestamps.is_empty() {
        return None;
    }
    Some(
        server_timestamps
            .iter()
            .map(|field| FieldTransform {
                field_path: field.clone(),
                set_to_server_value: ServerValue::RequestTime,
            })
            .collect(),
    )
}
