use super::*;
use httpmock::prelude::*;
use serde_json::json;

fn storage(server: &MockServer) -> FirebaseStorage {
    FirebaseStorage::new_with_url(
        AuthMiddleware::static_token("owner"),
        "test-project.appspot.com",
        &server.url(""),
        "https://firebasestorage.googleapis.com",
    )
}

#[test]
fn test_object_path_from_download_url() {
    let (bucket, path) = object_path_from_url(
        "https://firebasestorage.googleapis.com/v0/b/test-project.appspot.com/o/articles%2F1700000000000_abc1234.jpg?alt=media&token=t",
    )
    .unwrap();

    assert_eq!(bucket, "test-project.appspot.com");
    assert_eq!(path, "articles/1700000000000_abc1234.jpg");
}

#[test]
fn test_object_path_from_gs_url() {
    let (bucket, path) = object_path_from_url("gs://test-project.appspot.com/articles/a.jpg").unwrap();
    assert_eq!(bucket, "test-project.appspot.com");
    assert_eq!(path, "articles/a.jpg");
}

#[test]
fn test_object_path_from_unrelated_url_is_rejected() {
    assert!(matches!(
        object_path_from_url("https://example.com/picture.jpg"),
        Err(StorageError::InvalidUrl(_))
    ));
    assert!(object_path_from_url("not a url").is_err());
}

#[test]
fn test_download_url_round_trips() {
    let server = MockServer::start();
    let file = storage(&server).bucket(None).file("articles/x y.jpg");

    let url = file.download_url("tok");
    let (bucket, path) = object_path_from_url(&url).unwrap();
    assert_eq!(bucket, "test-project.appspot.com");
    assert_eq!(path, "articles/x y.jpg");
}

#[tokio::test]
async fn test_upload_returns_tokenized_download_url() {
    let server = MockServer::start();
    let client = storage(&server);

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/upload/storage/v1/b/test-project.appspot.com/o")
            .query_param("uploadType", "multipart");
        then.status(200).json_body(json!({
            "name": "articles/a.jpg",
            "bucket": "test-project.appspot.com",
            "contentType": "image/jpeg",
            "metadata": { "firebaseStorageDownloadTokens": "abc-token" }
        }));
    });

    let url = client
        .upload("articles/a.jpg", vec![0xFF, 0xD8, 0xFF], "image/jpeg")
        .await
        .unwrap();

    assert_eq!(
        url,
        "https://firebasestorage.googleapis.com/v0/b/test-project.appspot.com/o/articles%2Fa.jpg?alt=media&token=abc-token"
    );
    mock.assert();
}

#[tokio::test]
async fn test_delete_by_url() {
    let server = MockServer::start();
    let client = storage(&server);

    let mock = server.mock(|when, then| {
        when.method(DELETE)
            .path_matches(r"^/storage/v1/b/test-project\.appspot\.com/o/articles");
        then.status(204);
    });

    client
        .delete_by_url("https://firebasestorage.googleapis.com/v0/b/test-project.appspot.com/o/articles%2Fa.jpg?alt=media&token=t")
        .await
        .unwrap();
    mock.assert();
}
