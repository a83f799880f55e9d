//! Backend-neutral document store contract.
//!
//! The orchestration routines (bulk import, notification fan-out, admin CRUD)
//! only need a handful of primitives from a hierarchical document database:
//! point reads, collection listing, single-field queries and an atomic batch
//! commit. [`DocumentStore`] captures exactly that, so the routines run the same
//! against Cloud Firestore ([`crate::firestore::FirebaseFirestore`]) and the
//! in-process [`memory::MemoryStore`].

pub mod memory;


use crate::firestore::FirestoreError;
use async_trait::async_trait;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Length of store-generated document ids.
pub const AUTO_ID_LENGTH: usize = 20;

/// Maximum number of values accepted by an `IN` filter.
pub const MAX_IN_FILTER_VALUES: usize = 30;

/// Maximum number of writes accepted in one atomic commit.
pub const MAX_BATCH_WRITES: usize = 500;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Firestore(#[from] FirestoreError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The store refused the request; nothing was applied.
    #[error("Request rejected: {0}")]
    Rejected(String),
    #[error("Document not found: {0}")]
    NotFound(String),
}

/// Generates a random 20 character alphanumeric id, the same shape Firestore
/// clients allocate for `collection.doc()`.
pub fn auto_id() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(AUTO_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// A document read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Last path segment.
    pub id: String,
    /// Slash separated path relative to the database root, e.g. `topics/abc`.
    pub path: String,
    pub fields: Map<String, Value>,
    pub create_time: Option<String>,
    pub update_time: Option<String>,
}

impl StoredDocument {
    pub fn data<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }
}

/// Single field predicate for [`DocumentStore::query`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldFilter {
    Equal(String, Value),
    In(String, Vec<Value>),
}

impl FieldFilter {
    pub fn equal(field: &str, value: impl Into<Value>) -> Self {
        FieldFilter::Equal(field.to_string(), value.into())
    }

    pub fn one_of<V: Into<Value>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        FieldFilter::In(field.to_string(), values.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, fields: &Map<String, Value>) -> bool {
        match self {
            FieldFilter::Equal(field, expected) => fields.get(field) == Some(expected),
            FieldFilter::In(field, candidates) => fields
                .get(field)
                .map(|v| candidates.contains(v))
                .unwrap_or(false),
        }
    }
}

/// One staged write of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchWrite {
    /// Create or overwrite the document.
    Set {
        path: String,
        fields: Map<String, Value>,
        server_timestamps: Vec<String>,
    },
    /// Merge the given top-level fields; the document must already exist.
    Update {
        path: String,
        fields: Map<String, Value>,
        server_timestamps: Vec<String>,
    },
    Delete { path: String },
}

impl BatchWrite {
    pub fn path(&self) -> &str {
        match self {
            BatchWrite::Set { path, .. }
            | BatchWrite::Update { path, .. }
            | BatchWrite::Delete { path } => path,
        }
    }
}

/// Serializes `value` into a top-level field map.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serialization(serde::ser::Error::custom(format!(
            "Can only write objects as documents, got {}",
            other
        )))),
    }
}

/// Accumulates writes for one atomic commit.
#[derive(Debug, Default, Clone)]
pub struct Batch {
    writes: Vec<BatchWrite>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: Serialize>(&mut self, path: &str, value: &T) -> Result<&mut Self, StoreError> {
        self.writes.push(BatchWrite::Set {
            path: path.to_string(),
            fields: to_fields(value)?,
            server_timestamps: Vec::new(),
        });
        Ok(self)
    }

    pub fn update<T: Serialize>(&mut self, path: &str, value: &T) -> Result<&mut Self, StoreError> {
        self.writes.push(BatchWrite::Update {
            path: path.to_string(),
            fields: to_fields(value)?,
            server_timestamps: Vec::new(),
        });
        Ok(self)
    }

    pub fn delete(&mut self, path: &str) -> &mut Self {
        self.writes.push(BatchWrite::Delete {
            path: path.to_string(),
        });
        self
    }

    /// Asks the store to fill `field` of the last staged set/update with the
    /// commit time.
    pub fn server_timestamp(&mut self, field: &str) -> &mut Self {
        if let Some(BatchWrite::Set { server_timestamps, .. } | BatchWrite::Update { server_timestamps, .. }) =
            self.writes.last_mut()
        {
            server_timestamps.push(field.to_string());
        }
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn writes(&self) -> &[BatchWrite] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<BatchWrite> {
        self.writes
    }
}

/// Minimal surface of a hierarchical document database.
///
/// Paths are slash separated and relative to the database root:
/// collections have an odd number of segments (`topics`,
/// `topics/{id}/questions`), documents an even one.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Allocates an id for a new document. No round-trip is made.
    fn new_id(&self) -> String {
        auto_id()
    }

    async fn get(&self, path: &str) -> Result<Option<StoredDocument>, StoreError>;

    async fn list(&self, collection_path: &str) -> Result<Vec<StoredDocument>, StoreError>;

    async fn query(
        &self,
        collection_path: &str,
        filter: &FieldFilter,
    ) -> Result<Vec<StoredDocument>, StoreError>;

    /// Applies every write or none of them. Returns the number of writes applied.
    async fn commit(&self, batch: Batch) -> Result<usize, StoreError>;
}

/// Splits `a/b/c` into (`Some("a/b")`, `"c"`).
pub(crate) fn split_parent(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once('/') {
        Some((parent, last)) => (Some(parent), last),
        None => (None, path),
    }
}
