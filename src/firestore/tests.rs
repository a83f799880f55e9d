use super::models::{Value, ValueType};
use super::value::{fields_to_json, json_to_value};
use super::FirebaseFirestore;
use crate::core::middleware::AuthMiddleware;
use crate::store::{Batch, DocumentStore, FieldFilter, StoreError};
use httpmock::prelude::*;
use serde_json::json;

const DOCUMENTS: &str = "/v1/projects/test-project/databases/(default)/documents";

fn firestore(server: &MockServer) -> FirebaseFirestore {
    FirebaseFirestore::new_with_url(
        AuthMiddleware::static_token("owner"),
        &server.url("/v1"),
        "test-project",
    )
}

#[test]
fn test_value_conversion_keeps_nested_bilingual_maps() {
    let value = json_to_value(json!({
        "en": "GK",
        "hi": "सा",
        "count": 2,
        "ok": true,
        "link": null
    }))
    .unwrap();

    let fields = match value.value_type {
        ValueType::MapValue(map) => map.fields,
        other => panic!("expected map, got {:?}", other),
    };
    assert_eq!(
        fields.get("count"),
        Some(&Value {
            value_type: ValueType::IntegerValue("2".to_string())
        })
    );

    let back = fields_to_json(fields).unwrap();
    assert_eq!(back.get("hi"), Some(&json!("सा")));
    assert_eq!(back.get("link"), Some(&json!(null)));
    assert_eq!(back.get("count"), Some(&json!(2)));
}

#[test]
fn test_value_wire_format() {
    let value = json_to_value(json!(true)).unwrap();
    assert_eq!(serde_json::to_value(&value).unwrap(), json!({ "booleanValue": true }));

    let parsed: Value = serde_json::from_value(json!({ "timestampValue": "2024-01-01T00:00:00Z" })).unwrap();
    assert_eq!(parsed.value_type, ValueType::TimestampValue("2024-01-01T00:00:00Z".to_string()));
}

#[tokio::test]
async fn test_commit_sends_writes_with_resource_names() {
    let server = MockServer::start();
    let db = firestore(&server);

    let commit_mock = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{}:commit", DOCUMENTS))
            .header("authorization", "Bearer owner");
        then.status(200).json_body(json!({
            "writeResults": [{ "updateTime": "2024-01-01T00:00:01Z" }, {}],
            "commitTime": "2024-01-01T00:00:01Z"
        }));
    });

    let mut batch = Batch::new();
    batch
        .set("topics/t1", &json!({ "name": { "en": "GK", "hi": "सा" } }))
        .unwrap();
    batch
        .update("fcmTokens/a", &json!({ "isActive": false }))
        .unwrap();

    let written = db.commit(batch).await.unwrap();
    assert_eq!(written, 2);
    commit_mock.assert();
}

#[tokio::test]
async fn test_commit_failure_surfaces_api_message() {
    let server = MockServer::start();
    let db = firestore(&server);

    let _commit_mock = server.mock(|when, then| {
        when.method(POST).path(format!("{}:commit", DOCUMENTS));
        then.status(403).json_body(json!({
            "error": {
                "code": 403,
                "message": "Missing or insufficient permissions.",
                "status": "PERMISSION_DENIED"
            }
        }));
    });

    let mut batch = Batch::new();
    batch.set("topics/t1", &json!({ "name": "x" })).unwrap();

    let err = db.commit(batch).await.unwrap_err();
    assert!(matches!(err, StoreError::Firestore(_)));
    assert!(err.to_string().contains("Missing or insufficient permissions."));
}

#[tokio::test]
async fn test_empty_commit_makes_no_request() {
    let server = MockServer::start();
    let db = firestore(&server);

    let commit_mock = server.mock(|when, then| {
        when.method(POST).path(format!("{}:commit", DOCUMENTS));
        then.status(500);
    });

    assert_eq!(db.commit(Batch::new()).await.unwrap(), 0);
    commit_mock.assert_calls(0);
}

#[tokio::test]
async fn test_query_active_tokens() {
    let server = MockServer::start();
    let db = firestore(&server);

    let query_mock = server.mock(|when, then| {
        when.method(POST).path(format!("{}:runQuery", DOCUMENTS));
        then.status(200).json_body(json!([
            {
                "document": {
                    "name": "projects/test-project/databases/(default)/documents/fcmTokens/d1",
                    "fields": {
                        "token": { "stringValue": "tok-1" },
                        "isActive": { "booleanValue": true }
                    },
                    "createTime": "2024-01-01T00:00:00Z",
                    "updateTime": "2024-01-01T00:00:00Z"
                },
                "readTime": "2024-01-01T00:00:02Z"
            }
        ]));
    });

    let docs = db
        .query("fcmTokens", &FieldFilter::equal("isActive", true))
        .await
        .unwrap();

    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, "d1");
    assert_eq!(docs[0].path, "fcmTokens/d1");
    assert_eq!(docs[0].get_str("token"), Some("tok-1"));
    query_mock.assert();
}

#[tokio::test]
async fn test_query_with_no_results_returns_empty() {
    let server = MockServer::start();
    let db = firestore(&server);

    let _query_mock = server.mock(|when, then| {
        when.method(POST).path(format!("{}:runQuery", DOCUMENTS));
        then.status(200)
            .json_body(json!([{ "readTime": "2024-01-01T00:00:02Z" }]));
    });

    let docs = db
        .query("fcmTokens", &FieldFilter::one_of("token", ["a", "b"]))
        .await
        .unwrap();
    assert!(docs.is_empty());
}

#[tokio::test]
async fn test_subcollection_query_runs_against_parent_document() {
    let server = MockServer::start();
    let db = firestore(&server);

    let query_mock = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{}/topics/t1:runQuery", DOCUMENTS));
        then.status(200).json_body(json!([]));
    });

    db.query("topics/t1/questions", &FieldFilter::equal("correctOption", "B"))
        .await
        .unwrap();
    query_mock.assert();
}

#[tokio::test]
async fn test_list_documents() {
    let server = MockServer::start();
    let db = firestore(&server);

    let list_mock = server.mock(|when, then| {
        when.method(GET).path(format!("{}/topics", DOCUMENTS));
        then.status(200).json_body(json!({
            "documents": [
                {
                    "name": "projects/test-project/databases/(default)/documents/topics/t1",
                    "fields": {
                        "name": { "mapValue": { "fields": {
                            "en": { "stringValue": "Science" },
                            "hi": { "stringValue": "विज्ञान" }
                        } } }
                    }
                }
            ]
        }));
    });

    let docs = db.list("topics").await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].fields["name"]["en"], json!("Science"));
    list_mock.assert();
}

#[tokio::test]
async fn test_get_missing_document_is_none() {
    let server = MockServer::start();
    let db = firestore(&server);

    let _get_mock = server.mock(|when, then| {
        when.method(GET).path(format!("{}/articles/nope", DOCUMENTS));
        then.status(404).json_body(json!({
            "error": { "code": 404, "message": "Document not found", "status": "NOT_FOUND" }
        }));
    });

    assert!(db.get("articles/nope").await.unwrap().is_none());
}
