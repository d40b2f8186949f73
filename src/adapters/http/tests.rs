use super::*;
use crate::application::pipeline_tests::{Harness, ScriptedRunner};
use crate::domain::validation::tests::mp4_bytes;
use crate::ports::auth::AuthError;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "framezip-test-boundary";

/// Accepts `Bearer ok-{owner_id}`; `Bearer down` simulates an outage.
struct StaticTokens;

#[async_trait]
impl TokenValidator for StaticTokens {
    async fn validate(&self, token: &str, owner_id: &str) -> Result<bool, AuthError> {
        if token == "Bearer down" {
            return Err(AuthError::Unreachable("connection refused".to_string()));
        }
        Ok(token == format!("Bearer ok-{}", owner_id))
    }
}

fn app<S: crate::ports::storage::RemoteStore + 'static>(harness: &Harness<S>) -> Router {
    app_with_limit(harness, None)
}

fn app_with_limit<S: crate::ports::storage::RemoteStore + 'static>(
    harness: &Harness<S>,
    max_upload_bytes: Option<usize>,
) -> Router {
    router(AppState {
        service: harness.service.clone(),
        auth: Arc::new(StaticTokens),
        spool_dir: harness.uploads.path().join("spool"),
        max_upload_bytes,
    })
}

fn multipart_body(field: &str, file_name: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(owner: &str, token: &str, file_name: &str, content: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/video?owner_id={}", owner))
        .header(header::AUTHORIZATION, token)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body("video", file_name, content)))
        .unwrap()
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, token)
        .body(Body::empty())
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn test_upload_list_and_download() {
    let harness = Harness::new(ScriptedRunner::default());
    let app = app(&harness);

    let response = app
        .clone()
        .oneshot(upload_request("7", "Bearer ok-7", "clip.mp4", &mp4_bytes(b"clip")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(created["status"], "ready_to_download");
    let video_id = created["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get("/zips?owner_id=7", "Bearer ok-7"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["owner_id"], "7");
    assert_eq!(listed[0]["id"], video_id.as_str());

    let response = app
        .clone()
        .oneshot(get(
            &format!("/zip/download?owner_id=7&video_id={}", video_id),
            "Bearer ok-7",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename={}.zip", video_id).as_str()
    );
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/octet-stream"
    );
    let stored =
        std::fs::read(harness.bucket.path().join(format!("{}.zip", video_id))).unwrap();
    assert_eq!(body_bytes(response).await, stored);

    harness.drain().await;
}

#[tokio::test]
async fn test_missing_owner_is_bad_request() {
    let harness = Harness::new(ScriptedRunner::default());
    let response = app(&harness)
        .oneshot(get("/zips", "Bearer ok-7"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    harness.drain().await;
}

#[tokio::test]
async fn test_invalid_token_is_unauthorized() {
    let harness = Harness::new(ScriptedRunner::default());
    let response = app(&harness)
        .oneshot(upload_request("7", "Bearer ok-8", "clip.mp4", &mp4_bytes(b"x")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (repo, _, _) = harness.drain().await;
    assert!(repo.is_empty().await);
}

#[tokio::test]
async fn test_identity_outage_is_internal_error() {
    let harness = Harness::new(ScriptedRunner::default());
    let response = app(&harness)
        .oneshot(get("/zips?owner_id=7", "Bearer down"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["error"], "Error validating token");
    harness.drain().await;
}

#[tokio::test]
async fn test_invalid_upload_is_bad_request() {
    let harness = Harness::new(ScriptedRunner::default());
    let app = app(&harness);

    let response = app
        .clone()
        .oneshot(upload_request("7", "Bearer ok-7", "notes.txt", b"hello"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method("POST")
        .uri("/video?owner_id=7")
        .header(header::AUTHORIZATION, "Bearer ok-7")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body("other", "clip.mp4", b"x")))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (repo, _, _) = harness.drain().await;
    assert!(repo.is_empty().await);
}

#[tokio::test]
async fn test_download_of_foreign_video_is_not_found() {
    let harness = Harness::new(ScriptedRunner::default());
    let app = app(&harness);

    let response = app
        .clone()
        .oneshot(upload_request("7", "Bearer ok-7", "clip.mp4", &mp4_bytes(b"clip")))
        .await
        .unwrap();
    let created: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    let video_id = created["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get(
            &format!("/zip/download?owner_id=8&video_id={}", video_id),
            "Bearer ok-8",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(get("/zip/download?owner_id=7", "Bearer ok-7"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    harness.drain().await;
}

#[tokio::test]
async fn test_upload_larger_than_ten_mib_is_accepted() {
    let harness = Harness::new(ScriptedRunner::default());
    let video = mp4_bytes(&vec![0u8; 11 << 20]);

    let response = app(&harness)
        .oneshot(upload_request("7", "Bearer ok-7", "big.mp4", &video))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(created["status"], "ready_to_download");

    harness.drain().await;
}

#[tokio::test]
async fn test_configured_upload_cap_is_enforced() {
    let harness = Harness::new(ScriptedRunner::default());
    let video = mp4_bytes(&vec![0u8; 64 << 10]);

    let response = app_with_limit(&harness, Some(1024))
        .oneshot(upload_request("7", "Bearer ok-7", "big.mp4", &video))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let (repo, _, _) = harness.drain().await;
    assert!(repo.is_empty().await);
}
