//! Admin routes over an in-memory database, driven with `oneshot`.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use docketcc_api::{router, AppState};
use docketcc_pipeline::testing::{deps, filing, MockSource, RecordingSender};
use docketcc_pipeline::Pipeline;
use docketcc_store::memory_pool;
use serde_json::{json, Value};
use tower::ServiceExt;

const TOKEN: &str = "test-admin-token";

async fn app_with(source: MockSource, admin_token: Option<&str>) -> (Router, Arc<AppState>) {
    let pool = memory_pool().await.unwrap();
    let pipeline = Pipeline::new(deps(
        pool,
        Arc::new(source),
        None,
        Arc::new(RecordingSender::new()),
    ));
    let state = Arc::new(AppState::new(pipeline, admin_token.map(String::from)));
    (router(state.clone()), state)
}

fn authed(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_needs_no_token() {
    let (app, _) = app_with(MockSource::new(), Some(TOKEN)).await;
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn admin_routes_require_the_bearer_token() {
    let (app, _) = app_with(MockSource::new(), Some(TOKEN)).await;

    let missing = app
        .clone()
        .oneshot(Request::builder().uri("/api/admin/dockets").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/admin/dockets")
                .header(header::AUTHORIZATION, "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let ok = app.oneshot(authed("GET", "/api/admin/dockets", None)).await.unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_routes_are_closed_without_a_configured_token() {
    let (app, _) = app_with(MockSource::new(), None).await;
    let response = app.oneshot(authed("GET", "/api/admin/queue", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn trigger_polls_and_reports() {
    let source = MockSource::new().on_docket(
        "23-108",
        vec![filing("A", "23-108", Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap())],
    );
    let (app, _) = app_with(source, Some(TOKEN)).await;

    let response = app
        .clone()
        .oneshot(authed(
            "POST",
            "/api/admin/trigger",
            Some(json!({ "docket_number": "23-108" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = json_body(response).await;
    assert_eq!(report["filings_stored"], 1);
    assert_eq!(report["dockets_polled"], 1);

    let dockets = json_body(app.clone().oneshot(authed("GET", "/api/admin/dockets", None)).await.unwrap()).await;
    assert_eq!(dockets[0]["docket_number"], "23-108");
    assert_eq!(dockets[0]["health"], "healthy");

    let filings = json_body(
        app.clone()
            .oneshot(authed("GET", "/api/admin/filings/23-108", None))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(filings.as_array().unwrap().len(), 1);
    assert_eq!(filings[0]["id"], "A");

    let stats = json_body(app.oneshot(authed("GET", "/api/admin/filings/stats", None)).await.unwrap()).await;
    assert_eq!(stats["total"], 1);
}

#[tokio::test]
async fn trigger_rejects_bad_docket_numbers() {
    let (app, _) = app_with(MockSource::new(), Some(TOKEN)).await;
    let response = app
        .oneshot(authed(
            "POST",
            "/api/admin/trigger",
            Some(json!({ "docket_number": "bogus" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn trigger_is_refused_while_a_poll_runs() {
    let (app, state) = app_with(MockSource::new(), Some(TOKEN)).await;
    let _held = state.run_lock.lock().await;

    let response = app
        .oneshot(authed(
            "POST",
            "/api/admin/trigger",
            Some(json!({ "docket_number": "23-108" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn docket_status_can_be_paused() {
    let (app, state) = app_with(MockSource::new(), Some(TOKEN)).await;
    state.pipeline.registry().register_or_touch("23-108").await.unwrap();

    let response = app
        .clone()
        .oneshot(authed(
            "PUT",
            "/api/admin/dockets/23-108/status",
            Some(json!({ "status": "paused" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(state.pipeline.registry().list_active().await.unwrap().is_empty());

    let unknown = app
        .oneshot(authed(
            "PUT",
            "/api/admin/dockets/11-42/status",
            Some(json!({ "status": "paused" })),
        ))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn queue_and_logs_are_readable() {
    let (app, _) = app_with(MockSource::new().failing("23-108"), Some(TOKEN)).await;

    app.clone()
        .oneshot(authed(
            "POST",
            "/api/admin/trigger",
            Some(json!({ "docket_number": "23-108" })),
        ))
        .await
        .unwrap();

    let queue = json_body(app.clone().oneshot(authed("GET", "/api/admin/queue", None)).await.unwrap()).await;
    assert_eq!(queue["stats"]["pending"], 0);
    assert!(queue["recent"].as_array().unwrap().is_empty());

    let logs = json_body(
        app.oneshot(authed("GET", "/api/admin/logs?level=error", None))
            .await
            .unwrap(),
    )
    .await;
    let logs = logs.as_array().unwrap();
    assert!(!logs.is_empty());
    assert!(logs.iter().all(|l| l["level"] == "error"));
}
