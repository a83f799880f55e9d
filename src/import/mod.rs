//! Bulk import of a topics → questions tree in one atomic batch.

mod sample;


pub use sample::sample_dataset;

use crate::catalog::{question_path, topic_path, Bilingual, QuestionRecord, TopicRecord};
use crate::store::{Batch, DocumentStore, StoreError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

pub const SUCCESS_MESSAGE: &str = "Bulk upload completed successfully";

/// Nested catalog data, shaped the way it will be stored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportDataset {
    #[serde(default)]
    pub topics: Vec<TopicSeed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSeed {
    pub name: Bilingual,
    #[serde(default)]
    pub questions: Vec<QuestionRecord>,
}

impl ImportDataset {
    /// Reads a dataset from a JSON file of the same shape.
    pub async fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read dataset {}: {}", path.display(), e))?;
        let dataset = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse dataset {}: {}", path.display(), e))?;
        Ok(dataset)
    }

    pub fn question_count(&self) -> usize {
        self.topics.iter().map(|t| t.questions.len()).sum()
    }
}

/// Result of one import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    pub success: bool,
    pub message: String,
    pub topics: usize,
    pub questions: usize,
}

#[derive(Clone)]
pub struct BulkImporter {
    store: Arc<dyn DocumentStore>,
}

impl BulkImporter {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Stages one write per topic and per question, with store-allocated ids.
    pub fn stage(&self, dataset: &ImportDataset) -> Result<Batch, StoreError> {
        let mut batch = Batch::new();
        for topic in &dataset.topics {
            let topic_id = self.store.new_id();
            batch.set(
                &topic_path(&topic_id),
                &TopicRecord {
                    name: topic.name.clone(),
                },
            )?;
            for question in &topic.questions {
                let question_id = self.store.new_id();
                batch.set(&question_path(&topic_id, &question_id), question)?;
            }
        }
        Ok(batch)
    }

    /// Writes the whole dataset or nothing. Never returns an error; failures
    /// are reported through [`ImportOutcome::success`] and `message`.
    pub async fn import(&self, dataset: &ImportDataset) -> ImportOutcome {
        let topics = dataset.topics.len();
        let questions = dataset.question_count();

        if topics == 0 {
            info!("Nothing to import");
            return ImportOutcome {
                success: true,
                message: SUCCESS_MESSAGE.to_string(),
                topics: 0,
                questions: 0,
            };
        }

        let result = match self.stage(dataset) {
            Ok(batch) => self.store.commit(batch).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(writes) => {
                info!(topics, questions, writes, "Bulk import committed");
                ImportOutcome {
                    success: true,
                    message: SUCCESS_MESSAGE.to_string(),
                    topics,
                    questions,
                }
            }
            Err(e) => {
                error!(error = %e, topics, questions, "Bulk import failed");
                ImportOutcome {
                    success: false,
                    message: e.to_string(),
                    topics: 0,
                    questions: 0,
                }
            }
        }
    }
}
