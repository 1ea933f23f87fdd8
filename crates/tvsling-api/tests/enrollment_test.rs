#![allow(clippy::unwrap_used)]
// Integration tests for `EnrollmentClient`, `ServerInfoClient`, and the
// download helper using wiremock.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{body_json_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tvsling_api::{ApiError, EnrollmentClient, ServerInfoClient, download_to_file};

const CSR: &str = "-----BEGIN CERTIFICATE REQUEST-----\nMIIB\n-----END CERTIFICATE REQUEST-----\n";

#[tokio::test]
async fn enroll_returns_certificate_chain() {
    let server = MockServer::start().await;
    let endpoint = Url::parse(&format!("{}/enroll", server.uri())).unwrap();

    Mock::given(method("POST"))
        .and(path("/enroll"))
        .and(header("authorization", "Bearer token-123"))
        .and(body_json_string(
            json!({ "csr": CSR, "userId": "user-1" }).to_string(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "certificates": [
                "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----",
                "-----BEGIN CERTIFICATE-----\nBBBB\n-----END CERTIFICATE-----"
            ]
        })))
        .mount(&server)
        .await;

    let client = EnrollmentClient::new(endpoint, Duration::from_secs(2)).unwrap();
    let token = SecretString::from("token-123".to_owned());
    let chain = client.enroll(CSR, &token, "user-1").await.unwrap();

    assert_eq!(chain.certificates.len(), 2);
    let pem = chain.to_pem();
    assert!(pem.starts_with("-----BEGIN CERTIFICATE-----"));
    assert!(pem.ends_with("-----END CERTIFICATE-----\n"));
}

#[tokio::test]
async fn enroll_rejection_is_recoverable_error() {
    let server = MockServer::start().await;
    let endpoint = Url::parse(&format!("{}/enroll", server.uri())).unwrap();

    Mock::given(method("POST"))
        .and(path("/enroll"))
        .respond_with(ResponseTemplate::new(403).set_body_string("device quota exceeded"))
        .mount(&server)
        .await;

    let client = EnrollmentClient::new(endpoint, Duration::from_secs(2)).unwrap();
    let token = SecretString::from("token-123".to_owned());
    let result = client.enroll(CSR, &token, "user-1").await;

    match result {
        Err(ApiError::Enrollment { status, message }) => {
            assert_eq!(status, 403);
            assert!(message.contains("quota"));
        }
        other => panic!("expected Enrollment error, got: {other:?}"),
    }
}

#[tokio::test]
async fn enroll_rejection_body_truncated_on_char_boundary() {
    let server = MockServer::start().await;
    let endpoint = Url::parse(&format!("{}/enroll", server.uri())).unwrap();

    // The 200-byte preview cut lands inside the multi-byte '€'.
    let body = format!("{}€ rejected", "a".repeat(199));
    Mock::given(method("POST"))
        .and(path("/enroll"))
        .respond_with(ResponseTemplate::new(403).set_body_string(body))
        .mount(&server)
        .await;

    let client = EnrollmentClient::new(endpoint, Duration::from_secs(2)).unwrap();
    let token = SecretString::from("token-123".to_owned());
    let result = client.enroll(CSR, &token, "user-1").await;

    match result {
        Err(ApiError::Enrollment { status, message }) => {
            assert_eq!(status, 403);
            assert!(message.len() <= 200);
            assert!(message.starts_with("aaa"));
        }
        other => panic!("expected Enrollment error, got: {other:?}"),
    }
}

#[tokio::test]
async fn enroll_empty_chain_is_rejected() {
    let server = MockServer::start().await;
    let endpoint = Url::parse(&format!("{}/enroll", server.uri())).unwrap();

    Mock::given(method("POST"))
        .and(path("/enroll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "certificates": [] })))
        .mount(&server)
        .await;

    let client = EnrollmentClient::new(endpoint, Duration::from_secs(2)).unwrap();
    let token = SecretString::from("token-123".to_owned());
    let result = client.enroll(CSR, &token, "user-1").await;

    assert!(matches!(result, Err(ApiError::Enrollment { .. })));
}

#[tokio::test]
async fn public_info_fetch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/System/Info/Public"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Id": "abcdef0123456789",
            "ServerName": "Den",
            "Version": "10.9.0"
        })))
        .mount(&server)
        .await;

    let client = ServerInfoClient::new(Duration::from_secs(2)).unwrap();
    let base = Url::parse(&server.uri()).unwrap();
    let info = client.fetch_public_info(&base).await.unwrap();

    assert_eq!(info.id, "abcdef0123456789");
    assert_eq!(info.server_name.as_deref(), Some("Den"));
}

#[tokio::test]
async fn download_reports_progress_and_writes_file() {
    let server = MockServer::start().await;
    let payload = vec![0xABu8; 64 * 1024];

    Mock::given(method("GET"))
        .and(path("/app.wgt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("app.wgt");
    let url = Url::parse(&format!("{}/app.wgt", server.uri())).unwrap();

    let mut last = 0u64;
    download_to_file(
        &reqwest::Client::new(),
        &url,
        &dest,
        &CancellationToken::new(),
        |received, _total| last = received,
    )
    .await
    .unwrap();

    assert_eq!(last, payload.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), payload);
}

#[tokio::test]
async fn download_honours_cancellation() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/app.wgt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0u8; 1024 * 1024])
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("app.wgt");
    let url = Url::parse(&format!("{}/app.wgt", server.uri())).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = download_to_file(&reqwest::Client::new(), &url, &dest, &cancel, |_, _| {}).await;

    assert!(matches!(result, Err(ApiError::Cancelled)));
}
