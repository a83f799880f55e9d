//! Cloud Firestore module.
//!
//! A small REST client covering what the catalog needs: document reads,
//! collection listing, single-collection structured queries and atomic write
//! batches. [`FirebaseFirestore`] implements [`DocumentStore`], which is how the
//! importer, the fan-out and the admin services reach it.

pub mod batch;
pub mod models;
pub mod query;
pub mod reference;
pub mod value;

#[cfg(test)]
mod tests;

use self::batch::WriteBatch;
use self::models::{Document, FieldOperator};
use self::query::{ExecutableQuery, Query};
use self::reference::{CollectionReference, DocumentReference};
use self::value::fields_to_json;
use crate::core::build_client;
use crate::core::middleware::AuthMiddleware;
use crate::store::{
    split_parent, Batch, BatchWrite, DocumentStore, FieldFilter, StoreError, StoredDocument,
};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;

const FIRESTORE_V1_API: &str = "https://firestore.googleapis.com/v1";

/// Errors that can occur during Firestore operations.
#[derive(Error, Debug)]
pub enum FirestoreError {
    /// Wrapper for `reqwest::Error`.
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// Wrapper for `reqwest_middleware::Error`.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    /// Errors returned by the Firestore API.
    #[error("API error: {0}")]
    ApiError(String),
    /// Wrapper for `serde_json::Error`.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Client for interacting with Cloud Firestore.
pub struct FirebaseFirestore {
    client: ClientWithMiddleware,
    /// `.../v1/projects/{project}/databases/(default)/documents`
    base_url: String,
    /// `projects/{project}/databases/(default)/documents`
    resource_root: String,
}

impl FirebaseFirestore {
    /// Creates a client for the default database of `project_id`.
    pub fn new(middleware: AuthMiddleware, project_id: &str) -> Self {
        Self::new_with_url(middleware, FIRESTORE_V1_API, project_id)
    }

    /// Creates a client against a custom API root such as the emulator
    /// (`http://localhost:8080/v1`).
    pub fn new_with_url(middleware: AuthMiddleware, api_root: &str, project_id: &str) -> Self {
        Self::new_with_client(build_client(middleware), api_root, project_id)
    }

    pub(crate) fn new_with_client(client: ClientWithMiddleware, api_root: &str, project_id: &str) -> Self {
        let resource_root = format!("projects/{}/databases/(default)/documents", project_id);
        let base_url = format!("{}/{}", api_root.trim_end_matches('/'), resource_root);
        Self {
            client,
            base_url,
            resource_root,
        }
    }

    /// Gets a `CollectionReference` for a slash separated collection path.
    pub fn collection(&self, collection_path: &str) -> CollectionReference<'_> {
        CollectionReference {
            client: &self.client,
            path: format!("{}/{}", self.base_url, collection_path),
        }
    }

    /// Gets a `DocumentReference` for a slash separated document path.
    pub fn doc(&self, document_path: &str) -> DocumentReference<'_> {
        DocumentReference {
            client: &self.client,
            path: format!("{}/{}", self.base_url, document_path),
        }
    }

    /// Creates a write batch, used for performing multiple writes as a single atomic operation.
    pub fn batch(&self) -> WriteBatch<'_> {
        WriteBatch::new(&self.client, self.base_url.clone(), self.resource_root.clone())
    }

    /// Binds `query` to the document at `parent_path`, or to the database root
    /// when `None`.
    pub fn structured_query(&self, parent_path: Option<&str>, query: Query) -> ExecutableQuery<'_> {
        let parent = match parent_path {
            Some(p) => format!("{}/{}", self.base_url, p),
            None => self.base_url.clone(),
        };
        ExecutableQuery::new(&self.client, parent, query)
    }

    fn to_stored(&self, doc: Document) -> Result<StoredDocument, StoreError> {
        let prefix = format!("{}/", self.resource_root);
        let path = doc
            .name
            .strip_prefix(&prefix)
            .unwrap_or(&doc.name)
            .to_string();
        let id = split_parent(&path).1.to_string();

        Ok(StoredDocument {
            id,
            path,
            fields: fields_to_json(doc.fields)?,
            create_time: doc.create_time,
            update_time: doc.update_time,
        })
    }
}

#[async_trait]
impl DocumentStore for FirebaseFirestore {
    async fn get(&self, path: &str) -> Result<Option<StoredDocument>, StoreError> {
        match self.doc(path).get().await? {
            Some(doc) => Ok(Some(self.to_stored(doc)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, collection_path: &str) -> Result<Vec<StoredDocument>, StoreError> {
        self.collection(collection_path)
            .list_documents()
            .await?
            .into_iter()
            .map(|doc| self.to_stored(doc))
            .collect()
    }

    async fn query(
        &self,
        collection_path: &str,
        filter: &FieldFilter,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let (parent, collection_id) = split_parent(collection_path);
        let query = match filter {
            FieldFilter::Equal(field, value) => {
                Query::new(collection_id).where_filter(field, FieldOperator::Equal, value)?
            }
            FieldFilter::In(field, values) => {
                Query::new(collection_id).where_filter(field, FieldOperator::In, values)?
            }
        };

        self.structured_query(parent, query)
            .get()
            .await?
            .into_iter()
            .map(|doc| self.to_stored(doc))
            .collect()
    }

    async fn commit(&self, batch: Batch) -> Result<usize, StoreError> {
        let writes = self.batch();
        for write in batch.into_writes() {
            match write {
                BatchWrite::Set {
                    path,
                    fields,
                    server_timestamps,
                } => writes.set(&path, fields, &server_timestamps)?,
                BatchWrite::Update {
                    path,
                    fields,
                    server_timestamps,
                } => writes.update(&path, fields, &server_timestamps)?,
                BatchWrite::Delete { path } => writes.delete(&path)?,
            };
        }

        let count = writes.len();
        writes.commit().await?;
        Ok(count)
    }
}
