//! Document-created triggers.
//!
//! Handlers are registered per collection and invoked at most once per event
//! id, whatever the number of deliveries of that event.

use super::{ArticleCreated, ArticleNotifier};
use crate::catalog::{ArticleRecord, Bilingual, ARTICLES};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

/// A document was created in `collection`.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentCreated {
    /// Delivery id; redeliveries of the same event share it.
    pub event_id: String,
    pub collection: String,
    pub document_id: String,
    pub fields: Option<Map<String, Value>>,
}

#[async_trait]
pub trait CreateHandler: Send + Sync {
    async fn on_create(&self, event: &DocumentCreated) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The event id was seen before; nothing ran.
    Duplicate,
    Handled { succeeded: usize, failed: usize },
}

#[derive(Default)]
pub struct TriggerRegistry {
    handlers: HashMap<String, Vec<Arc<dyn CreateHandler>>>,
    delivered: Mutex<HashSet<String>>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_document_created(&mut self, collection: &str, handler: Arc<dyn CreateHandler>) -> &mut Self {
        self.handlers
            .entry(collection.to_string())
            .or_default()
            .push(handler);
        self
    }

    pub fn handler_count(&self, collection: &str) -> usize {
        self.handlers.get(collection).map_or(0, Vec::len)
    }

    /// Runs every handler of the event's collection in registration order.
    /// A failing handler does not stop the others.
    pub async fn dispatch(&self, event: &DocumentCreated) -> Dispatch {
        let first_delivery = self
            .delivered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(event.event_id.clone());
        if !first_delivery {
            debug!(event_id = %event.event_id, "Skipping redelivered event");
            return Dispatch::Duplicate;
        }

        let mut succeeded = 0;
        let mut failed = 0;
        for handler in self.handlers.get(&event.collection).into_iter().flatten() {
            match handler.on_create(event).await {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    error!(
                        event_id = %event.event_id,
                        collection = %event.collection,
                        document_id = %event.document_id,
                        error = %e,
                        "Trigger handler failed"
                    );
                    failed += 1;
                }
            }
        }
        Dispatch::Handled { succeeded, failed }
    }
}

impl ArticleNotifier {
    /// Registers the fan-out for creations in `articles`.
    pub fn register(self, registry: &mut TriggerRegistry) {
        registry.on_document_created(ARTICLES, Arc::new(self));
    }
}

#[async_trait]
impl CreateHandler for ArticleNotifier {
    async fn on_create(&self, event: &DocumentCreated) -> anyhow::Result<()> {
        let snapshot = event.fields.as_ref().map(article_snapshot);
        let report = self
            .handle(&ArticleCreated {
                article_id: event.document_id.clone(),
                snapshot,
            })
            .await?;
        debug!(article_id = %event.document_id, ?report, "Fan-out finished");
        Ok(())
    }
}

/// Reads the fields the push needs. Missing or mistyped fields come back
/// empty so the notification falls back instead of being dropped.
fn article_snapshot(fields: &Map<String, Value>) -> ArticleRecord {
    let text = |field: &str, lang: &str| {
        fields
            .get(field)
            .and_then(|value| value.get(lang))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let string = |field: &str| fields.get(field).and_then(Value::as_str).map(str::to_string);

    ArticleRecord {
        title: Bilingual::new(text("title", "en"), text("title", "hi")),
        description: Bilingual::new(text("description", "en"), text("description", "hi")),
        image_url: string("imageUrl"),
        reference_link: string("referenceLink"),
        created_at: string("createdAt"),
        updated_at: string("updatedAt"),
    }
}
