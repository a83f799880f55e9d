use super::*;
use crate::messaging::models::{Message, MessagingErrorCode, Notification};
use httpmock::prelude::*;

const BOUNDARY: &str = "batch_test";

fn part(id: usize, status: &str, json: &str) -> String {
    format!(
        "--{b}\r\nContent-Type: application/http\r\nContent-ID: response-{id}\r\n\r\nHTTP/1.1 {status}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{json}\r\n",
        b = BOUNDARY,
        id = id,
        status = status,
        json = json
    )
}

fn unregistered_part(id: usize) -> String {
    part(
        id,
        "404 Not Found",
        r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND","details":[{"@type":"type.googleapis.com/google.firebase.fcm.v1.FcmError","errorCode":"UNREGISTERED"}]}}"#,
    )
}

fn messaging(server: &MockServer) -> FirebaseMessaging {
    FirebaseMessaging::new_with_url(
        AuthMiddleware::static_token("owner"),
        "test-project",
        &server.url("/batch"),
    )
}

fn template() -> Message {
    Message {
        notification: Some(Notification {
            title: Some("New Article Published!".to_string()),
            body: Some("Article is about Hello".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[test]
fn test_parse_multipart_response_classifies_errors() {
    let body = format!(
        "{}{}{}--{}--\r\n",
        part(1, "200 OK", r#"{"name":"projects/test-project/messages/1"}"#),
        unregistered_part(2),
        part(
            3,
            "503 Service Unavailable",
            r#"{"error":{"code":503,"message":"Service unavailable","status":"UNAVAILABLE"}}"#
        ),
        BOUNDARY
    );

    let responses = parse_multipart_response(&body, BOUNDARY).unwrap();
    assert_eq!(responses.len(), 3);
    assert!(responses[0].success);
    assert_eq!(responses[0].message_id.as_deref(), Some("projects/test-project/messages/1"));

    let second = responses[1].error.as_ref().unwrap();
    assert_eq!(second.code, MessagingErrorCode::RegistrationTokenNotRegistered);
    assert!(second.code.is_token_invalid());

    let third = responses[2].error.as_ref().unwrap();
    assert_eq!(third.code, MessagingErrorCode::ServerUnavailable);
    assert!(!third.code.is_token_invalid());
}

#[test]
fn test_parse_multipart_response_orders_by_content_id() {
    let body = format!(
        "{}{}--{}--\r\n",
        unregistered_part(2),
        part(1, "200 OK", r#"{"name":"m1"}"#),
        BOUNDARY
    );

    let responses = parse_multipart_response(&body, BOUNDARY).unwrap();
    assert!(responses[0].success);
    assert!(!responses[1].success);
}

#[test]
fn test_invalid_token_message_maps_to_invalid_registration_token() {
    let code = MessagingErrorCode::from_fcm(
        Some("INVALID_ARGUMENT"),
        Some("INVALID_ARGUMENT"),
        "The registration token is not a valid FCM registration token",
    );
    assert_eq!(code, MessagingErrorCode::InvalidRegistrationToken);
    assert_eq!(code.as_str(), "messaging/invalid-registration-token");

    let other = MessagingErrorCode::from_fcm(Some("INVALID_ARGUMENT"), None, "Invalid JSON payload");
    assert_eq!(other, MessagingErrorCode::InvalidArgument);
    assert!(!other.is_token_invalid());
}

#[test]
fn test_build_multipart_body_has_one_part_per_token() {
    let server = MockServer::start();
    let client = messaging(&server);
    let mut a = template();
    a.token = Some("tok-a".to_string());
    let mut b = template();
    b.token = Some("tok-b".to_string());

    let body = String::from_utf8(client.build_multipart_body(&[a, b], false, BOUNDARY).unwrap()).unwrap();

    assert_eq!(body.matches("POST /v1/projects/test-project/messages:send").count(), 2);
    assert!(body.contains("Content-ID: 1\r\n"));
    assert!(body.contains("Content-ID: 2\r\n"));
    assert!(body.contains(r#""token":"tok-b""#));
    assert!(body.ends_with("--batch_test--\r\n"));
}

#[test]
fn test_build_multipart_body_marks_validate_only() {
    let server = MockServer::start();
    let client = messaging(&server);
    let mut a = template();
    a.token = Some("tok-a".to_string());

    let body = String::from_utf8(client.build_multipart_body(&[a.clone()], true, BOUNDARY).unwrap()).unwrap();
    assert!(body.contains(r#""validate_only":true"#));

    let body = String::from_utf8(client.build_multipart_body(&[a], false, BOUNDARY).unwrap()).unwrap();
    assert!(body.contains(r#""validate_only":false"#));
}

#[tokio::test]
async fn test_send_multicast_single_request() {
    let server = MockServer::start();
    let client = messaging(&server);

    let body = format!(
        "{}{}--{}--\r\n",
        part(1, "200 OK", r#"{"name":"projects/test-project/messages/1"}"#),
        unregistered_part(2),
        BOUNDARY
    );

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/batch")
            .header("authorization", "Bearer owner");
        then.status(200)
            .header("content-type", format!("multipart/mixed; boundary={}", BOUNDARY))
            .body(body);
    });

    let tokens = vec!["tok-1".to_string(), "tok-2".to_string()];
    let result = client.send_each_for_multicast(&template(), &tokens).await.unwrap();

    assert_eq!(result.success_count, 1);
    assert_eq!(result.failure_count, 1);
    mock.assert_calls(1);
}

#[tokio::test]
async fn test_send_multicast_rejects_targeted_template() {
    let server = MockServer::start();
    let client = messaging(&server);
    let mut message = template();
    message.topic = Some("news".to_string());

    let err = client
        .send_multicast(&message, &["tok".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, MessagingError::ApiError(_)));
}

#[tokio::test]
async fn test_send_multicast_surfaces_call_failure() {
    let server = MockServer::start();
    let client = messaging(&server);

    let _mock = server.mock(|when, then| {
        when.method(POST).path("/batch");
        then.status(401).body(
            r#"{"error":{"code":401,"message":"Request had invalid authentication credentials.","status":"UNAUTHENTICATED"}}"#,
        );
    });

    let err = client
        .send_multicast(&template(), &["tok".to_string()])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("invalid authentication credentials"));
}
