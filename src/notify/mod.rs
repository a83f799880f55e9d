//! Push fan-out for newly created articles.
//!
//! On article creation every active device token receives one multicast push.
//! Tokens the provider reports as invalid or unregistered are switched to
//! `isActive = false` afterwards, so they drop out of later fan-outs.

pub mod trigger;

#[cfg(test)]
mod tests;

use crate::catalog::{ArticleRecord, TokenRecord, FCM_TOKENS};
use crate::messaging::models::{
    AndroidConfig, AndroidMessagePriority, AndroidNotification, ApnsConfig, ApnsFcmOptions,
    ApnsPayload, Aps, Message, Notification,
};
use crate::messaging::{MessagingError, PushProvider};
use crate::store::{Batch, DocumentStore, FieldFilter, StoreError, MAX_BATCH_WRITES, MAX_IN_FILTER_VALUES};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Strings used to build the notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub headline: String,
    /// Used when the article has no English title.
    pub fallback_title: String,
    /// Body is `"{body_prefix} {title}"`.
    pub body_prefix: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            headline: "New Article Published!".to_string(),
            fallback_title: "A new article has been added.".to_string(),
            body_prefix: "Article is about".to_string(),
        }
    }
}

/// A new document appeared in `articles`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleCreated {
    pub article_id: String,
    /// `None` when the event carried no document data.
    pub snapshot: Option<ArticleRecord>,
}

#[derive(Error, Debug)]
pub enum FanoutError {
    #[error("Failed to read active tokens: {0}")]
    TokenRead(#[source] StoreError),
    #[error("Failed to send notification: {0}")]
    Send(#[from] MessagingError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FanoutOutcome {
    NoArticleData,
    NoActiveTokens,
    Sent,
}

/// What one fan-out did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    pub outcome: FanoutOutcome,
    pub tokens: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// Token records switched to inactive.
    pub deactivated: usize,
    /// Set when marking invalid tokens failed; the push itself went out.
    pub deactivation_error: Option<String>,
}

impl FanoutReport {
    fn skipped(outcome: FanoutOutcome) -> Self {
        Self {
            outcome,
            tokens: 0,
            success_count: 0,
            failure_count: 0,
            deactivated: 0,
            deactivation_error: None,
        }
    }
}

#[derive(Clone)]
pub struct ArticleNotifier {
    store: Arc<dyn DocumentStore>,
    push: Arc<dyn PushProvider>,
    settings: NotificationSettings,
}

impl ArticleNotifier {
    pub fn new(store: Arc<dyn DocumentStore>, push: Arc<dyn PushProvider>, settings: NotificationSettings) -> Self {
        Self { store, push, settings }
    }

    /// Title shown to users: the English title, or the configured fallback.
    pub fn display_title<'a>(&'a self, article: &'a ArticleRecord) -> &'a str {
        let title = article.title.en.trim();
        if title.is_empty() {
            &self.settings.fallback_title
        } else {
            title
        }
    }

    /// Builds the multicast template for one article.
    pub fn build_message(&self, article_id: &str, article: &ArticleRecord, sent_at: DateTime<Utc>) -> Message {
        let title = self.display_title(article).to_string();
        let image_url = article
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        let data = HashMap::from([
            ("articleId".to_string(), article_id.to_string()),
            ("title".to_string(), title.clone()),
            ("description".to_string(), article.description.en.trim().to_string()),
            ("imageUrl".to_string(), image_url.clone().unwrap_or_default()),
            ("timestamp".to_string(), sent_at.timestamp_millis().to_string()),
        ]);

        let mut custom_data = HashMap::new();
        if let Some(url) = &image_url {
            custom_data.insert("imageUrl".to_string(), Value::String(url.clone()));
        }

        Message {
            data: Some(data),
            notification: Some(Notification {
                title: Some(self.settings.headline.clone()),
                body: Some(format!("{} {}", self.settings.body_prefix, title)),
                image: image_url.clone(),
            }),
            android: Some(AndroidConfig {
                priority: Some(AndroidMessagePriority::High),
                notification: Some(AndroidNotification {
                    image: image_url.clone(),
                    ..Default::default()
                }),
            }),
            apns: Some(ApnsConfig {
                headers: None,
                payload: Some(ApnsPayload {
                    aps: Some(Aps {
                        sound: None,
                        content_available: Some(1),
                        mutable_content: Some(1),
                    }),
                    custom_data,
                }),
                fcm_options: image_url.map(|image| ApnsFcmOptions { image: Some(image) }),
            }),
            ..Default::default()
        }
    }

    /// Runs the fan-out for one created article.
    pub async fn handle(&self, event: &ArticleCreated) -> Result<FanoutReport, FanoutError> {
        let article_id = event.article_id.as_str();
        let Some(article) = &event.snapshot else {
            info!(article_id, "No article data found");
            return Ok(FanoutReport::skipped(FanoutOutcome::NoArticleData));
        };

        let records = self
            .store
            .query(FCM_TOKENS, &FieldFilter::equal("isActive", true))
            .await
            .map_err(|e| {
                error!(article_id, error = %e, "Failed to read active tokens");
                FanoutError::TokenRead(e)
            })?;

        if records.is_empty() {
            info!(article_id, "No active FCM tokens available");
            return Ok(FanoutReport::skipped(FanoutOutcome::NoActiveTokens));
        }

        // Tokens are sent as stored so deactivation finds the same records.
        let mut tokens = Vec::with_capacity(records.len());
        for doc in &records {
            match doc.data::<TokenRecord>() {
                Ok(record) if !record.token.trim().is_empty() => tokens.push(record.token),
                Ok(_) => warn!(article_id, path = %doc.path, "Skipping blank token record"),
                Err(e) => warn!(article_id, path = %doc.path, error = %e, "Skipping unreadable token record"),
            }
        }

        if tokens.is_empty() {
            info!(article_id, records = records.len(), "No valid FCM tokens found");
            return Ok(FanoutReport::skipped(FanoutOutcome::NoActiveTokens));
        }

        let message = self.build_message(article_id, article, Utc::now());
        let response = self
            .push
            .send_each_for_multicast(&message, &tokens)
            .await
            .map_err(|e| {
                error!(article_id, token_count = tokens.len(), error = %e, "Error sending notification");
                FanoutError::Send(e)
            })?;

        info!(
            article_id,
            token_count = tokens.len(),
            success_count = response.success_count,
            failure_count = response.failure_count,
            "Notification sent"
        );

        let mut invalid = Vec::new();
        for (token, result) in tokens.iter().zip(&response.responses) {
            if result.success {
                continue;
            }
            let Some(err) = &result.error else {
                warn!(article_id, token = %token, "Error sending to token with no error detail");
                continue;
            };
            if err.code.is_token_invalid() {
                warn!(article_id, token = %token, error = %err, "Token is no longer valid");
                invalid.push(token.clone());
            } else {
                warn!(article_id, token = %token, error = %err, "Error sending to token");
            }
        }

        let mut report = FanoutReport {
            outcome: FanoutOutcome::Sent,
            tokens: tokens.len(),
            success_count: response.success_count,
            failure_count: response.failure_count,
            deactivated: 0,
            deactivation_error: None,
        };

        if !invalid.is_empty() {
            match self.deactivate(&invalid).await {
                Ok(count) => {
                    info!(article_id, deactivated = count, "Deactivated invalid tokens");
                    report.deactivated = count;
                }
                Err(e) => {
                    error!(article_id, error = %e, "Failed to deactivate invalid tokens");
                    report.deactivation_error = Some(e.to_string());
                }
            }
        }

        Ok(report)
    }

    /// Marks every record holding one of `tokens` inactive. Lookups are split
    /// to respect the `IN` filter limit; updates go out in as few batches as
    /// the batch limit allows.
    pub async fn deactivate(&self, tokens: &[String]) -> Result<usize, StoreError> {
        let mut seen = HashSet::new();
        let unique: Vec<&String> = tokens.iter().filter(|t| seen.insert(t.as_str())).collect();

        let mut paths = Vec::new();
        for chunk in unique.chunks(MAX_IN_FILTER_VALUES) {
            let filter = FieldFilter::one_of("token", chunk.iter().map(|t| t.as_str()));
            for doc in self.store.query(FCM_TOKENS, &filter).await? {
                if doc.fields.get("isActive") != Some(&Value::Bool(false)) {
                    paths.push(doc.path);
                }
            }
        }

        let mut updated = 0;
        for group in paths.chunks(MAX_BATCH_WRITES) {
            let mut batch = Batch::new();
            for path in group {
                batch.update(path, &json!({ "isActive": false }))?;
            }
            updated += self.store.commit(batch).await?;
        }
        Ok(updated)
    }
}
