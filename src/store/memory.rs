use super::{
    split_parent, Batch, BatchWrite, DocumentStore, FieldFilter, StoreError, StoredDocument,
    MAX_BATCH_WRITES, MAX_IN_FILTER_VALUES,
};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    documents: BTreeMap<String, StoredDocument>,
    commits: usize,
    fail_next_commit: Option<String>,
    fail_next_query: Option<String>,
}

/// In-process [`DocumentStore`] with Firestore-like commit rules: batches are
/// atomic, limited to [`MAX_BATCH_WRITES`] writes, and an update of a missing
/// document rejects the whole batch.
///
/// Backs the CLI `--dry-run` mode and the orchestration tests.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores `value` at `path` outside of any batch.
    pub fn insert(&self, path: &str, fields: Value) {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Default::default(),
        };
        let now = now();
        let (_, id) = split_parent(path);
        let doc = StoredDocument {
            id: id.to_string(),
            path: path.to_string(),
            fields,
            create_time: Some(now.clone()),
            update_time: Some(now),
        };
        self.state().documents.insert(path.to_string(), doc);
    }

    /// Makes the next commit fail with `reason` without applying anything.
    pub fn fail_next_commit(&self, reason: impl Into<String>) {
        self.state().fail_next_commit = Some(reason.into());
    }

    /// Makes the next query fail with `reason`.
    pub fn fail_next_query(&self, reason: impl Into<String>) {
        self.state().fail_next_query = Some(reason.into());
    }

    /// Number of batches committed successfully so far.
    pub fn commit_count(&self) -> usize {
        self.state().commits
    }

    pub fn document(&self, path: &str) -> Option<StoredDocument> {
        self.state().documents.get(path).cloned()
    }

    /// Every document path currently stored, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.state().documents.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().documents.is_empty()
    }

    fn collection(&self, collection_path: &str) -> Vec<StoredDocument> {
        self.state()
            .documents
            .values()
            .filter(|doc| split_parent(&doc.path).0 == Some(collection_path))
            .cloned()
            .collect()
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<StoredDocument>, StoreError> {
        Ok(self.document(path))
    }

    async fn list(&self, collection_path: &str) -> Result<Vec<StoredDocument>, StoreError> {
        Ok(self.collection(collection_path))
    }

    async fn query(
        &self,
        collection_path: &str,
        filter: &FieldFilter,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        if let Some(reason) = self.state().fail_next_query.take() {
            return Err(StoreError::Rejected(reason));
        }

        if let FieldFilter::In(_, values) = filter {
            if values.is_empty() || values.len() > MAX_IN_FILTER_VALUES {
                return Err(StoreError::Rejected(format!(
                    "'IN' filters support between 1 and {} values, got {}",
                    MAX_IN_FILTER_VALUES,
                    values.len()
                )));
            }
        }

        Ok(self
            .collection(collection_path)
            .into_iter()
            .filter(|doc| filter.matches(&doc.fields))
            .collect())
    }

    async fn commit(&self, batch: Batch) -> Result<usize, StoreError> {
        let mut state = self.state();

        if let Some(reason) = state.fail_next_commit.take() {
            return Err(StoreError::Rejected(reason));
        }

        let writes = batch.into_writes();
        if writes.len() > MAX_BATCH_WRITES {
            return Err(StoreError::Rejected(format!(
                "maximum {} writes allowed per request, got {}",
                MAX_BATCH_WRITES,
                writes.len()
            )));
        }

        // Apply to a copy so a rejected write leaves the store untouched.
        let mut staged = state.documents.clone();
        let commit_time = now();

        for write in &writes {
            match write {
                BatchWrite::Set {
                    path,
                    fields,
                    server_timestamps,
                } => {
                    let mut fields = fields.clone();
                    for field in server_timestamps {
                        fields.insert(field.clone(), Value::String(commit_time.clone()));
                    }
                    let create_time = staged
                        .get(path)
                        .and_then(|d| d.create_time.clone())
                        .unwrap_or_else(|| commit_time.clone());
                    let (_, id) = split_parent(path);
                    staged.insert(
                        path.clone(),
                        StoredDocument {
                            id: id.to_string(),
                            path: path.clone(),
                            fields,
                            create_time: Some(create_time),
                            update_time: Some(commit_time.clone()),
                        },
                    );
                }
                BatchWrite::Update {
                    path,
                    fields,
                    server_timestamps,
                } => {
                    let doc = staged
                        .get_mut(path)
                        .ok_or_else(|| StoreError::NotFound(path.clone()))?;
                    for (key, value) in fields {
                        doc.fields.insert(key.clone(), value.clone());
                    }
                    for field in server_timestamps {
                        doc.fields
                            .insert(field.clone(), Value::String(commit_time.clone()));
                    }
                    doc.update_time = Some(commit_time.clone());
                }
                BatchWrite::Delete { path } => {
                    staged.remove(path);
                }
            }
        }

        state.documents = staged;
        state.commits += 1;
        Ok(writes.len())
    }
}
