use super::trigger::{CreateHandler, Dispatch, DocumentCreated, TriggerRegistry};
use super::*;
use crate::catalog::{Bilingual, ARTICLES};
use crate::messaging::models::{BatchResponse, MessagingErrorCode, SendError, SendResponse};
use crate::store::memory::MemoryStore;
use async_trait::async_trait;
use chrono::TimeZone;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Answers every token with success unless a code is configured for it.
#[derive(Default)]
struct RecordingPush {
    failures: HashMap<String, MessagingErrorCode>,
    calls: Mutex<Vec<(Message, Vec<String>)>>,
    unavailable: bool,
}

impl RecordingPush {
    fn failing(failures: &[(&str, MessagingErrorCode)]) -> Self {
        Self {
            failures: failures
                .iter()
                .map(|(token, code)| (token.to_string(), code.clone()))
                .collect(),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<(Message, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushProvider for RecordingPush {
    async fn send_each_for_multicast(
        &self,
        message: &Message,
        tokens: &[String],
    ) -> Result<BatchResponse, MessagingError> {
        self.calls
            .lock()
            .unwrap()
            .push((message.clone(), tokens.to_vec()));
        if self.unavailable {
            return Err(MessagingError::ApiError("Service Unavailable".to_string()));
        }
        let responses = tokens
            .iter()
            .enumerate()
            .map(|(i, token)| match self.failures.get(token) {
                Some(code) => SendResponse::failed(SendError {
                    code: code.clone(),
                    message: format!("failure for {}", token),
                }),
                None => SendResponse::sent(format!("projects/p/messages/{}", i)),
            })
            .collect();
        Ok(BatchResponse::from_responses(responses))
    }
}

fn article(title_en: &str, image_url: Option<&str>) -> ArticleRecord {
    ArticleRecord {
        title: Bilingual::new(title_en, ""),
        description: Bilingual::new("About greetings", "अभिवादन"),
        image_url: image_url.map(str::to_string),
        ..Default::default()
    }
}

fn created(article: ArticleRecord) -> ArticleCreated {
    ArticleCreated {
        article_id: "art1".to_string(),
        snapshot: Some(article),
    }
}

fn seed_tokens(store: &MemoryStore, tokens: &[(&str, &str, bool)]) {
    for (id, token, active) in tokens {
        store.insert(
            &format!("{}/{}", FCM_TOKENS, id),
            json!({ "token": token, "isActive": active }),
        );
    }
}

fn notifier(store: &Arc<MemoryStore>, push: &Arc<RecordingPush>) -> ArticleNotifier {
    ArticleNotifier::new(store.clone(), push.clone(), NotificationSettings::default())
}

fn is_active(store: &MemoryStore, id: &str) -> bool {
    store.document(&format!("{}/{}", FCM_TOKENS, id)).unwrap().fields["isActive"] == json!(true)
}

#[test]
fn test_message_payload() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::default());
    let sent_at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

    let message = notifier(&store, &push).build_message("art1", &article("Hello", Some("https://x/y.jpg")), sent_at);

    let notification = message.notification.clone().unwrap();
    assert_eq!(notification.title.as_deref(), Some("New Article Published!"));
    assert_eq!(notification.body.as_deref(), Some("Article is about Hello"));

    let data = message.data.clone().unwrap();
    assert_eq!(data["articleId"], "art1");
    assert_eq!(data["title"], "Hello");
    assert_eq!(data["description"], "About greetings");
    assert_eq!(data["imageUrl"], "https://x/y.jpg");
    assert_eq!(data["timestamp"], sent_at.timestamp_millis().to_string());

    let value = serde_json::to_value(&message).unwrap();
    assert_eq!(value["android"]["priority"], json!("HIGH"));
    assert_eq!(value["android"]["notification"]["image"], json!("https://x/y.jpg"));
    assert_eq!(value["apns"]["payload"]["aps"]["mutable-content"], json!(1));
    assert_eq!(value["apns"]["payload"]["aps"]["content-available"], json!(1));
    assert_eq!(value["apns"]["payload"]["imageUrl"], json!("https://x/y.jpg"));
    assert_eq!(value["apns"]["fcmOptions"]["image"], json!("https://x/y.jpg"));
    assert!(!message.has_target());
}

#[test]
fn test_message_falls_back_when_title_missing() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::default());

    let message = notifier(&store, &push).build_message("art1", &article("  ", None), Utc::now());

    let data = message.data.unwrap();
    assert_eq!(data["title"], "A new article has been added.");
    assert_eq!(data["imageUrl"], "");
    assert_eq!(
        message.notification.unwrap().body.as_deref(),
        Some("Article is about A new article has been added.")
    );
    assert!(message.apns.unwrap().fcm_options.is_none());
}

#[tokio::test]
async fn test_no_tokens_means_no_push() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::default());
    seed_tokens(&store, &[("t1", "tok-1", false)]);

    let report = notifier(&store, &push).handle(&created(article("Hello", None))).await.unwrap();

    assert_eq!(report.outcome, FanoutOutcome::NoActiveTokens);
    assert!(push.calls().is_empty());
    assert_eq!(store.commit_count(), 0);
}

#[tokio::test]
async fn test_blank_token_strings_are_skipped() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::default());
    seed_tokens(&store, &[("t1", "  ", true), ("t2", "tok-2", true)]);

    let report = notifier(&store, &push).handle(&created(article("Hello", None))).await.unwrap();

    assert_eq!(report.tokens, 1);
    assert_eq!(push.calls()[0].1, vec!["tok-2".to_string()]);
}

#[tokio::test]
async fn test_missing_snapshot_is_a_no_op() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::default());
    seed_tokens(&store, &[("t1", "tok-1", true)]);

    let report = notifier(&store, &push)
        .handle(&ArticleCreated {
            article_id: "art1".to_string(),
            snapshot: None,
        })
        .await
        .unwrap();

    assert_eq!(report.outcome, FanoutOutcome::NoArticleData);
    assert!(push.calls().is_empty());
}

#[tokio::test]
async fn test_unregistered_token_is_deactivated() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::failing(&[(
        "tok-2",
        MessagingErrorCode::RegistrationTokenNotRegistered,
    )]));
    seed_tokens(
        &store,
        &[("t1", "tok-1", true), ("t2", "tok-2", true), ("t3", "tok-3", true)],
    );

    let report = notifier(&store, &push)
        .handle(&created(article("Hello", Some("https://x/y.jpg"))))
        .await
        .unwrap();

    let calls = push.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.len(), 3);

    assert_eq!(report.outcome, FanoutOutcome::Sent);
    assert_eq!((report.success_count, report.failure_count), (2, 1));
    assert_eq!(report.deactivated, 1);
    assert_eq!(store.commit_count(), 1);
    assert!(is_active(&store, "t1"));
    assert!(!is_active(&store, "t2"));
    assert!(is_active(&store, "t3"));
    assert_eq!(
        store.document("fcmTokens/t2").unwrap().fields["token"],
        json!("tok-2")
    );
}

#[tokio::test]
async fn test_padded_token_is_sent_and_deactivated_as_stored() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::failing(&[(
        "tok-2 ",
        MessagingErrorCode::RegistrationTokenNotRegistered,
    )]));
    seed_tokens(&store, &[("t1", "tok-1", true), ("t2", "tok-2 ", true)]);

    let report = notifier(&store, &push).handle(&created(article("Hello", None))).await.unwrap();

    assert_eq!(push.calls()[0].1, vec!["tok-1".to_string(), "tok-2 ".to_string()]);
    assert_eq!(report.deactivated, 1);
    assert!(is_active(&store, "t1"));
    assert!(!is_active(&store, "t2"));
}

#[tokio::test]
async fn test_unreadable_token_records_are_skipped() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::default());
    store.insert("fcmTokens/t1", json!({ "token": 42, "isActive": true }));
    seed_tokens(&store, &[("t2", "tok-2", true)]);

    let report = notifier(&store, &push).handle(&created(article("Hello", None))).await.unwrap();

    assert_eq!(report.tokens, 1);
    assert_eq!(push.calls()[0].1, vec!["tok-2".to_string()]);
}

#[tokio::test]
async fn test_token_read_failure_is_an_error_and_sends_nothing() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::default());
    seed_tokens(&store, &[("t1", "tok-1", true)]);
    store.fail_next_query("UNAVAILABLE");

    let err = notifier(&store, &push)
        .handle(&created(article("Hello", None)))
        .await
        .unwrap_err();

    assert!(matches!(err, FanoutError::TokenRead(_)));
    assert!(err.to_string().contains("UNAVAILABLE"));
    assert!(push.calls().is_empty());
    assert_eq!(store.commit_count(), 0);
    assert!(is_active(&store, "t1"));
}

#[tokio::test]
async fn test_transient_errors_keep_tokens_active() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::failing(&[
        ("tok-1", MessagingErrorCode::ServerUnavailable),
        ("tok-2", MessagingErrorCode::InvalidRegistrationToken),
        ("tok-3", MessagingErrorCode::MessageRateExceeded),
    ]));
    seed_tokens(
        &store,
        &[("t1", "tok-1", true), ("t2", "tok-2", true), ("t3", "tok-3", true)],
    );

    let report = notifier(&store, &push).handle(&created(article("Hello", None))).await.unwrap();

    assert_eq!(report.failure_count, 3);
    assert_eq!(report.deactivated, 1);
    assert!(is_active(&store, "t1"));
    assert!(!is_active(&store, "t2"));
    assert!(is_active(&store, "t3"));
}

#[tokio::test]
async fn test_send_failure_is_an_error_and_changes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush {
        unavailable: true,
        ..Default::default()
    });
    seed_tokens(&store, &[("t1", "tok-1", true)]);

    let err = notifier(&store, &push)
        .handle(&created(article("Hello", None)))
        .await
        .unwrap_err();

    assert!(matches!(err, FanoutError::Send(_)));
    assert_eq!(store.commit_count(), 0);
    assert!(is_active(&store, "t1"));
}

#[tokio::test]
async fn test_deactivation_failure_is_reported_not_fatal() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::failing(&[(
        "tok-1",
        MessagingErrorCode::RegistrationTokenNotRegistered,
    )]));
    seed_tokens(&store, &[("t1", "tok-1", true)]);
    store.fail_next_commit("DEADLINE_EXCEEDED");

    let report = notifier(&store, &push).handle(&created(article("Hello", None))).await.unwrap();

    assert_eq!(report.outcome, FanoutOutcome::Sent);
    assert_eq!(report.deactivated, 0);
    assert!(report.deactivation_error.unwrap().contains("DEADLINE_EXCEEDED"));
    assert!(is_active(&store, "t1"));
}

#[tokio::test]
async fn test_deactivation_splits_lookups_by_in_limit() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::default());
    let tokens: Vec<String> = (0..75).map(|i| format!("tok-{}", i)).collect();
    for (i, token) in tokens.iter().enumerate() {
        store.insert(
            &format!("fcmTokens/t{}", i),
            json!({ "token": token, "isActive": true }),
        );
    }

    let mut with_duplicates = tokens.clone();
    with_duplicates.push("tok-0".to_string());
    let count = notifier(&store, &push).deactivate(&with_duplicates).await.unwrap();

    assert_eq!(count, 75);
    assert_eq!(store.commit_count(), 1);
    assert!((0..75).all(|i| !is_active(&store, &format!("t{}", i))));
}

#[tokio::test]
async fn test_duplicate_records_for_one_token_are_all_deactivated() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::default());
    seed_tokens(&store, &[("t1", "tok-1", true), ("t2", "tok-1", true)]);

    let count = notifier(&store, &push).deactivate(&["tok-1".to_string()]).await.unwrap();

    assert_eq!(count, 2);
    assert!(!is_active(&store, "t1"));
    assert!(!is_active(&store, "t2"));
}

#[tokio::test]
async fn test_registry_runs_handler_once_per_event() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::default());
    seed_tokens(&store, &[("t1", "tok-1", true)]);

    let mut registry = TriggerRegistry::new();
    notifier(&store, &push).register(&mut registry);
    assert_eq!(registry.handler_count(ARTICLES), 1);

    let event = DocumentCreated {
        event_id: "evt-1".to_string(),
        collection: ARTICLES.to_string(),
        document_id: "art1".to_string(),
        fields: json!({"title": {"en": "Hello"}}).as_object().cloned(),
    };

    assert_eq!(
        registry.dispatch(&event).await,
        Dispatch::Handled {
            succeeded: 1,
            failed: 0
        }
    );
    assert_eq!(registry.dispatch(&event).await, Dispatch::Duplicate);
    assert_eq!(push.calls().len(), 1);
    assert_eq!(
        push.calls()[0].0.data.as_ref().unwrap()["articleId"],
        "art1"
    );
}

struct Counting(AtomicUsize, bool);

#[async_trait]
impl CreateHandler for Counting {
    async fn on_create(&self, _event: &DocumentCreated) -> anyhow::Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        if self.1 {
            anyhow::bail!("handler failed");
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_registry_routes_by_collection_and_isolates_failures() {
    let failing = Arc::new(Counting(AtomicUsize::new(0), true));
    let ok = Arc::new(Counting(AtomicUsize::new(0), false));
    let other = Arc::new(Counting(AtomicUsize::new(0), false));

    let mut registry = TriggerRegistry::new();
    registry
        .on_document_created("articles", failing.clone())
        .on_document_created("articles", ok.clone())
        .on_document_created("topics", other.clone());

    let event = DocumentCreated {
        event_id: "evt-9".to_string(),
        collection: "articles".to_string(),
        document_id: "a".to_string(),
        fields: None,
    };

    assert_eq!(
        registry.dispatch(&event).await,
        Dispatch::Handled {
            succeeded: 1,
            failed: 1
        }
    );
    assert_eq!(failing.0.load(Ordering::SeqCst), 1);
    assert_eq!(ok.0.load(Ordering::SeqCst), 1);
    assert_eq!(other.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_mistyped_article_fields_still_notify() {
    let store = Arc::new(MemoryStore::new());
    let push = Arc::new(RecordingPush::default());
    seed_tokens(&store, &[("t1", "tok-1", true)]);

    let mut registry = TriggerRegistry::new();
    notifier(&store, &push).register(&mut registry);

    let event = DocumentCreated {
        event_id: "evt-2".to_string(),
        collection: ARTICLES.to_string(),
        document_id: "art2".to_string(),
        fields: json!({ "title": "Hello", "description": 7, "imageUrl": "https://x/y.jpg" })
            .as_object()
            .cloned(),
    };

    assert_eq!(
        registry.dispatch(&event).await,
        Dispatch::Handled {
            succeeded: 1,
            failed: 0
        }
    );
    let calls = push.calls();
    assert_eq!(calls.len(), 1);
    let data = calls[0].0.data.as_ref().unwrap();
    assert_eq!(data["title"], "A new article has been added.");
    assert_eq!(data["description"], "");
    assert_eq!(data["imageUrl"], "https://x/y.jpg");
}
