//! TOML configuration for the admin tool.
//!
//! ```toml
//! [firebase]
//! project_id = "quiz-app"
//! service_account_path = "service-account.json"
//!
//! [storage]
//! bucket = "quiz-app.appspot.com"
//!
//! [storage.image]
//! compress_threshold_kb = 25
//! max_dimension = 600
//! jpeg_quality = 50
//!
//! [notifications]
//! headline = "New Article Published!"
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```

use crate::catalog::media::ImageConfig;
use crate::notify::NotificationSettings;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable consulted when no key path is configured.
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub firebase: FirebaseConfig,
    pub storage: StorageConfig,
    pub notifications: NotificationSettings,
    pub logging: LoggingConfig,
}

impl AdminConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: AdminConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`AdminConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Collects all validation errors and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if let Some(project_id) = &self.firebase.project_id {
            if project_id.trim().is_empty() {
                errors.push("firebase.project_id must not be empty".to_string());
            }
        }
        if let Some(emulator) = &self.firebase.emulator {
            if self.firebase.project_id.is_none() {
                errors.push("firebase.project_id is required when using the emulators".to_string());
            }
            if emulator.token.is_empty() {
                errors.push("firebase.emulator.token must not be empty".to_string());
            }
        }
        if let Some(bucket) = &self.storage.bucket {
            if bucket.trim().is_empty() || bucket.contains('/') {
                errors.push(format!("storage.bucket '{}' is not a bucket name", bucket));
            }
        }

        let image = &self.storage.image;
        if image.max_dimension == 0 {
            errors.push("storage.image.max_dimension must be positive".to_string());
        }
        if image.jpeg_quality == 0 || image.jpeg_quality > 100 {
            errors.push("storage.image.jpeg_quality must be between 1 and 100".to_string());
        }

        if self.notifications.headline.trim().is_empty() {
            errors.push("notifications.headline must not be empty".to_string());
        }
        if self.notifications.fallback_title.trim().is_empty() {
            errors.push("notifications.fallback_title must not be empty".to_string());
        }

        if let Err(e) = tracing_subscriber::EnvFilter::try_new(&self.logging.level) {
            errors.push(format!("logging.level '{}' is invalid: {}", self.logging.level, e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirebaseConfig {
    /// Defaults to the project of the service account key.
    pub project_id: Option<String>,
    pub service_account_path: Option<PathBuf>,
    /// Talk to the local emulator suite with a fixed token instead of OAuth2.
    pub emulator: Option<EmulatorConfig>,
    /// Overrides the FCM batch endpoint.
    pub fcm_batch_url: Option<String>,
    /// Have FCM validate pushes without delivering them.
    pub fcm_validate_only: bool,
}

impl FirebaseConfig {
    /// The configured key path, falling back to `GOOGLE_APPLICATION_CREDENTIALS`.
    pub fn credentials_path(&self) -> Option<PathBuf> {
        self.service_account_path
            .clone()
            .or_else(|| std::env::var_os(CREDENTIALS_ENV).map(PathBuf::from))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    pub firestore_url: String,
    pub storage_url: String,
    pub token: String,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            firestore_url: "http://127.0.0.1:8080/v1".to_string(),
            storage_url: "http://127.0.0.1:9199".to_string(),
            token: "owner".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Defaults to `{project_id}.appspot.com`.
    pub bucket: Option<String>,
    pub image: ImageConfig,
}

impl StorageConfig {
    pub fn bucket_name(&self, project_id: &str) -> String {
        self.bucket
            .clone()
            .unwrap_or_else(|| format!("{}.appspot.com", project_id))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `quiz_catalog_admin=debug`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AdminConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.image.compress_threshold_kb, 25);
        assert_eq!(config.storage.image.max_dimension, 600);
        assert_eq!(config.storage.image.jpeg_quality, 50);
        assert_eq!(config.notifications.fallback_title, "A new article has been added.");
    }

    #[test]
    fn test_parse_partial_file() {
        let config: AdminConfig = toml::from_str(
            r#"
            [firebase]
            project_id = "quiz-app"

            [firebase.emulator]
            firestore_url = "http://localhost:8080/v1"

            [storage.image]
            jpeg_quality = 70

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.firebase.project_id.as_deref(), Some("quiz-app"));
        let emulator = config.firebase.emulator.unwrap();
        assert_eq!(emulator.firestore_url, "http://localhost:8080/v1");
        assert_eq!(emulator.token, "owner");
        assert_eq!(config.storage.image.jpeg_quality, 70);
        assert_eq!(config.storage.image.max_dimension, 600);
        assert_eq!(config.storage.bucket_name("quiz-app"), "quiz-app.appspot.com");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validate_collects_every_error() {
        let mut config = AdminConfig::default();
        config.firebase.emulator = Some(EmulatorConfig::default());
        config.storage.bucket = Some("bad/bucket".to_string());
        config.storage.image.jpeg_quality = 0;
        config.notifications.headline = " ".to_string();

        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("project_id is required"));
        assert!(message.contains("storage.bucket"));
        assert!(message.contains("jpeg_quality"));
        assert!(message.contains("headline"));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("quiz-admin-config-that-does-not-exist.toml");
        let config = AdminConfig::load_or_default(&path).unwrap();
        assert_eq!(config, AdminConfig::default());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let path = std::env::temp_dir().join(format!("quiz-admin-{}.toml", crate::store::auto_id()));
        std::fs::write(&path, "[storage.image]\nmax_dimension = 0\n").unwrap();

        let result = AdminConfig::load(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(result.unwrap_err().to_string().contains("max_dimension"));
    }
}
