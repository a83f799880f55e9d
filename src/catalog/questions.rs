use super::forms::QuestionForm;
use super::{question_path, questions_path, CatalogError, Question};
use crate::store::{Batch, DocumentStore};
use std::sync::Arc;
use tracing::info;

/// Question CRUD inside one topic's `questions` sub-collection.
#[derive(Clone)]
pub struct QuestionService {
    store: Arc<dyn DocumentStore>,
}

impl QuestionService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, topic_id: &str) -> Result<Vec<Question>, CatalogError> {
        let docs = self.store.list(&questions_path(topic_id)).await?;
        docs.iter()
            .map(|doc| Question::from_document(doc).map_err(CatalogError::from))
            .collect()
    }

    pub async fn get(&self, topic_id: &str, question_id: &str) -> Result<Question, CatalogError> {
        let path = question_path(topic_id, question_id);
        match self.store.get(&path).await? {
            Some(doc) => Ok(Question::from_document(&doc)?),
            None => Err(CatalogError::NotFound(path)),
        }
    }

    pub async fn create(&self, topic_id: &str, form: &QuestionForm) -> Result<String, CatalogError> {
        check(form)?;
        let id = self.store.new_id();
        let mut batch = Batch::new();
        batch.set(&question_path(topic_id, &id), &form.to_record())?;
        self.store.commit(batch).await?;
        info!(topic_id, question_id = %id, "Question created");
        Ok(id)
    }

    pub async fn update(
        &self,
        topic_id: &str,
        question_id: &str,
        form: &QuestionForm,
    ) -> Result<(), CatalogError> {
        check(form)?;
        let mut batch = Batch::new();
        batch.update(&question_path(topic_id, question_id), &form.to_record())?;
        self.store.commit(batch).await?;
        info!(topic_id, question_id, "Question updated");
        Ok(())
    }

    pub async fn delete(&self, topic_id: &str, question_id: &str) -> Result<(), CatalogError> {
        let mut batch = Batch::new();
        batch.delete(&question_path(topic_id, question_id));
        self.store.commit(batch).await?;
        info!(topic_id, question_id, "Question deleted");
        Ok(())
    }
}

fn check(form: &QuestionForm) -> Result<(), CatalogError> {
    let violations = form.validate();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(CatalogError::Invalid(violations))
    }
}
