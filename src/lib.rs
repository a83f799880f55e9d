pub mod catalog;
pub mod config;
pub mod core;
pub mod firestore;
pub mod import;
pub mod messaging;
pub mod notify;
pub mod storage;
pub mod store;

use anyhow::anyhow;
use catalog::articles::ArticleService;
use catalog::questions::QuestionService;
use catalog::topics::TopicService;
use config::AdminConfig;
use crate::core::middleware::AuthMiddleware;
use firestore::FirebaseFirestore;
use import::BulkImporter;
use messaging::{FirebaseMessaging, PushProvider};
use notify::trigger::TriggerRegistry;
use notify::ArticleNotifier;
use std::sync::Arc;
use storage::{FirebaseStorage, ImageStore};
use store::DocumentStore;
use tracing::info;

/// Wires the catalog services to a set of backends.
pub struct CatalogApp {
    config: AdminConfig,
    store: Arc<dyn DocumentStore>,
    push: Arc<dyn PushProvider>,
    images: Arc<dyn ImageStore>,
}

impl CatalogApp {
    /// Connects to Firebase (or the emulators) as described by `config`.
    pub async fn connect(config: AdminConfig) -> anyhow::Result<Self> {
        let (middleware, project_id) = match &config.firebase.emulator {
            Some(emulator) => {
                let project_id = config
                    .firebase
                    .project_id
                    .clone()
                    .ok_or_else(|| anyhow!("firebase.project_id is required when using the emulators"))?;
                (AuthMiddleware::static_token(emulator.token.clone()), project_id)
            }
            None => {
                let path = config.firebase.credentials_path().ok_or_else(|| {
                    anyhow!(
                        "No service account key: set firebase.service_account_path or {}",
                        crate::config::CREDENTIALS_ENV
                    )
                })?;
                let key = yup_oauth2::read_service_account_key(&path)
                    .await
                    .map_err(|e| anyhow!("Failed to read service account key '{}': {}", path.display(), e))?;
                let middleware = AuthMiddleware::service_account(key);
                let project_id = config
                    .firebase
                    .project_id
                    .clone()
                    .or_else(|| middleware.project_id().map(str::to_string))
                    .ok_or_else(|| anyhow!("project_id is missing from config and service account key"))?;
                (middleware, project_id)
            }
        };

        let bucket = config.storage.bucket_name(&project_id);
        let (firestore, storage) = match &config.firebase.emulator {
            Some(emulator) => (
                FirebaseFirestore::new_with_url(middleware.clone(), &emulator.firestore_url, &project_id),
                FirebaseStorage::new_with_url(middleware.clone(), &bucket, &emulator.storage_url, &emulator.storage_url),
            ),
            None => (
                FirebaseFirestore::new(middleware.clone(), &project_id),
                FirebaseStorage::new(middleware.clone(), &bucket),
            ),
        };
        let messaging = match &config.firebase.fcm_batch_url {
            Some(url) => FirebaseMessaging::new_with_url(middleware, &project_id, url),
            None => FirebaseMessaging::new(middleware, &project_id),
        }
        .validate_only(config.firebase.fcm_validate_only);

        info!(
            project_id = %project_id,
            bucket = %bucket,
            emulator = config.firebase.emulator.is_some(),
            "Connected to Firebase"
        );
        Ok(Self::with_backends(
            config,
            Arc::new(firestore),
            Arc::new(messaging),
            Arc::new(storage),
        ))
    }

    pub fn with_backends(
        config: AdminConfig,
        store: Arc<dyn DocumentStore>,
        push: Arc<dyn PushProvider>,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            config,
            store,
            push,
            images,
        }
    }

    pub fn config(&self) -> &AdminConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    pub fn topics(&self) -> TopicService {
        TopicService::new(self.store.clone())
    }

    pub fn questions(&self) -> QuestionService {
        QuestionService::new(self.store.clone())
    }

    pub fn articles(&self) -> ArticleService {
        ArticleService::new(
            self.store.clone(),
            self.images.clone(),
            self.config.storage.image.clone(),
        )
    }

    pub fn importer(&self) -> BulkImporter {
        BulkImporter::new(self.store.clone())
    }

    pub fn notifier(&self) -> ArticleNotifier {
        ArticleNotifier::new(
            self.store.clone(),
            self.push.clone(),
            self.config.notifications.clone(),
        )
    }

    /// A registry with the article fan-out bound to `articles` creations.
    pub fn triggers(&self) -> TriggerRegistry {
        let mut registry = TriggerRegistry::new();
        self.notifier().register(&mut registry);
        registry
    }
}
