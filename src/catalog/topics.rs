use super::forms::TopicForm;
use super::{topic_path, CatalogError, Topic, TOPICS};
use crate::store::{Batch, DocumentStore};
use std::sync::Arc;
use tracing::info;

/// Topic CRUD.
#[derive(Clone)]
pub struct TopicService {
    store: Arc<dyn DocumentStore>,
}

impl TopicService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<Topic>, CatalogError> {
        let docs = self.store.list(TOPICS).await?;
        docs.iter()
            .map(|doc| Topic::from_document(doc).map_err(CatalogError::from))
            .collect()
    }

    pub async fn get(&self, id: &str) -> Result<Topic, CatalogError> {
        let path = topic_path(id);
        match self.store.get(&path).await? {
            Some(doc) => Ok(Topic::from_document(&doc)?),
            None => Err(CatalogError::NotFound(path)),
        }
    }

    /// Returns the id of the new topic.
    pub async fn create(&self, form: &TopicForm) -> Result<String, CatalogError> {
        check(form)?;
        let id = self.store.new_id();
        let mut batch = Batch::new();
        batch.set(&topic_path(&id), &form.to_record())?;
        self.store.commit(batch).await?;
        info!(topic_id = %id, "Topic created");
        Ok(id)
    }

    pub async fn update(&self, id: &str, form: &TopicForm) -> Result<(), CatalogError> {
        check(form)?;
        let mut batch = Batch::new();
        batch.update(&topic_path(id), &form.to_record())?;
        self.store.commit(batch).await?;
        info!(topic_id = %id, "Topic updated");
        Ok(())
    }

    /// Removes the topic document only. Its `questions` sub-collection is left
    /// in place.
    pub async fn delete(&self, id: &str) -> Result<(), CatalogError> {
        let mut batch = Batch::new();
        batch.delete(&topic_path(id));
        self.store.commit(batch).await?;
        info!(topic_id = %id, "Topic deleted");
        Ok(())
    }
}

fn check(form: &TopicForm) -> Result<(), CatalogError> {
    let violations = form.validate();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(CatalogError::Invalid(violations))
    }
}
