use super::forms::ArticleForm;
use super::media::{article_object_path, compress_image, ImageConfig};
use super::{article_path, Article, CatalogError, ARTICLES};
use crate::storage::ImageStore;
use crate::store::{Batch, DocumentStore};
use std::sync::Arc;
use tracing::{info, warn};

const CREATED_AT: &str = "createdAt";
const UPDATED_AT: &str = "updatedAt";

/// Article CRUD, including the image stored next to each article.
#[derive(Clone)]
pub struct ArticleService {
    store: Arc<dyn DocumentStore>,
    images: Arc<dyn ImageStore>,
    image_config: ImageConfig,
}

impl ArticleService {
    pub fn new(store: Arc<dyn DocumentStore>, images: Arc<dyn ImageStore>, image_config: ImageConfig) -> Self {
        Self {
            store,
            images,
            image_config,
        }
    }

    pub async fn list(&self) -> Result<Vec<Article>, CatalogError> {
        let docs = self.store.list(ARTICLES).await?;
        docs.iter()
            .map(|doc| Article::from_document(doc).map_err(CatalogError::from))
            .collect()
    }

    pub async fn get(&self, id: &str) -> Result<Article, CatalogError> {
        let path = article_path(id);
        match self.store.get(&path).await? {
            Some(doc) => Ok(Article::from_document(&doc)?),
            None => Err(CatalogError::NotFound(path)),
        }
    }

    /// Uploads the selected image and writes the article. Returns its id.
    pub async fn create(&self, form: &ArticleForm) -> Result<String, CatalogError> {
        check(form, false)?;
        let bytes = form.new_image.clone().ok_or_else(|| {
            CatalogError::Invalid(vec![super::forms::Violation::MissingImage])
        })?;
        let image_url = self.upload(bytes).await?;

        let id = self.store.new_id();
        let mut batch = Batch::new();
        batch
            .set(&article_path(&id), &form.to_record(Some(image_url)))?
            .server_timestamp(CREATED_AT)
            .server_timestamp(UPDATED_AT);
        self.store.commit(batch).await?;

        info!(article_id = %id, "Article created");
        Ok(id)
    }

    /// Rewrites the article. A newly selected image replaces the stored one;
    /// the old object is removed only once the new upload succeeded.
    pub async fn update(&self, id: &str, form: &ArticleForm) -> Result<(), CatalogError> {
        check(form, true)?;

        let (image_url, replaced) = match &form.new_image {
            Some(bytes) => (Some(self.upload(bytes.clone()).await?), form.image_url.clone()),
            None => (form.image_url.clone(), None),
        };

        let mut batch = Batch::new();
        batch
            .update(&article_path(id), &form.to_record(image_url))?
            .server_timestamp(UPDATED_AT);
        self.store.commit(batch).await?;

        if let Some(old_url) = replaced {
            self.delete_image(id, &old_url).await;
        }

        info!(article_id = %id, "Article updated");
        Ok(())
    }

    /// Removes the article's image, then the document. A failed image delete is
    /// logged and does not stop the document delete.
    pub async fn delete(&self, id: &str) -> Result<(), CatalogError> {
        let path = article_path(id);
        if let Some(doc) = self.store.get(&path).await? {
            if let Some(url) = doc.get_str("imageUrl").filter(|url| !url.is_empty()) {
                self.delete_image(id, url).await;
            }
        }

        let mut batch = Batch::new();
        batch.delete(&path);
        self.store.commit(batch).await?;
        info!(article_id = %id, "Article deleted");
        Ok(())
    }

    async fn upload(&self, bytes: Vec<u8>) -> Result<String, CatalogError> {
        let prepared = compress_image(bytes, &self.image_config);
        let object_path = article_object_path();
        let url = self
            .images
            .upload(&object_path, prepared.bytes, &prepared.content_type)
            .await?;
        info!(object_path = %object_path, compressed = prepared.compressed, "Image uploaded");
        Ok(url)
    }

    async fn delete_image(&self, article_id: &str, url: &str) {
        if let Err(e) = self.images.delete_by_url(url).await {
            warn!(article_id, url, error = %e, "Failed to delete article image");
        }
    }
}

fn check(form: &ArticleForm, editing: bool) -> Result<(), CatalogError> {
    let violations = form.validate(editing);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(CatalogError::Invalid(violations))
    }
}
