//! Snapshot fetcher against a mocked Traefik API: success, every failure
//! kind, and decode classification.

use std::time::Duration;

use serde_json::json;
use traefik_kv_sync::traefik::{RouterEntry, SnapshotFetcher};
use traefik_kv_sync::FetchError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve(template: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/rawdata"))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

fn fetcher_for(server: &MockServer) -> SnapshotFetcher {
    SnapshotFetcher::new(format!("{}/api/rawdata", server.uri()), reqwest::Client::new())
}

#[tokio::test]
async fn test_fetch_decodes_routers() {
    let server = serve(ResponseTemplate::new(200).set_body_json(json!({
        "routers": {
            "api@internal": {"rule": "PathPrefix(`/api`)", "service": "api@internal"},
            "whoami@docker": {"rule": "Host(`whoami.example.com`)", "entryPoints": ["web"]},
        },
        "services": {},
        "middlewares": {},
    })))
    .await;

    let snapshot = fetcher_for(&server).fetch().await.expect("fetch should succeed");
    assert_eq!(snapshot.len(), 2);
    match &snapshot.routers["whoami@docker"] {
        RouterEntry::WellFormed(desc) => assert_eq!(desc.rule, "Host(`whoami.example.com`)"),
        other => panic!("unexpected entry: {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_non_success_status_carries_body() {
    let server = serve(ResponseTemplate::new(503).set_body_string("traefik starting")).await;

    let err = fetcher_for(&server).fetch().await.unwrap_err();
    match err {
        FetchError::Status { status, body, .. } => {
            assert_eq!(status, 503);
            assert_eq!(body, "traefik starting");
        }
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_malformed_body() {
    let server = serve(ResponseTemplate::new(200).set_body_string("not json")).await;
    let err = fetcher_for(&server).fetch().await.unwrap_err();
    assert!(matches!(err, FetchError::Decode { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_fetch_missing_routers() {
    let server = serve(ResponseTemplate::new(200).set_body_json(json!({"services": {}}))).await;
    let err = fetcher_for(&server).fetch().await.unwrap_err();
    assert!(matches!(err, FetchError::RoutersMissing), "got {err:?}");
}

#[tokio::test]
async fn test_fetch_mistyped_routers() {
    let server = serve(ResponseTemplate::new(200).set_body_json(json!({"routers": "none"}))).await;
    let err = fetcher_for(&server).fetch().await.unwrap_err();
    assert!(matches!(err, FetchError::RoutersNotObject { found: "string" }), "got {err:?}");
}

#[tokio::test]
async fn test_fetch_times_out_on_hung_endpoint() {
    let server = serve(
        ResponseTemplate::new(200)
            .set_body_json(json!({"routers": {}}))
            .set_delay(Duration::from_secs(3)),
    )
    .await;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .expect("client");
    let fetcher = SnapshotFetcher::new(format!("{}/api/rawdata", server.uri()), client);

    let err = fetcher.fetch().await.unwrap_err();
    assert!(matches!(err, FetchError::Timeout { .. }), "got {err:?}");
}
