#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use rulegate_api::config::{ServerConfig, StoreKind};
use rulegate_api::routes;
use rulegate_api::state::AppState;
use rulegate_core::validation::engine::ValidationEngine;
use rulegate_core::validation::registry::RuleRegistry;
use rulegate_pipeline::memory::SeedData;
use rulegate_pipeline::{InMemoryStore, Orchestrator};

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        store: StoreKind::Memory,
        seed_file: None,
    }
}

/// Seed with one `CATALOGS/product` config and the `MST_CODES` reference set.
pub fn catalog_seed() -> SeedData {
    serde_json::from_value(json!({
        "configs": [{
            "context": "CATALOGS",
            "targetType": "product",
            "validations": [
                {
                    "validationId": "code-exists",
                    "ruleType": "EXISTENCE",
                    "referenceSource": "MST_CODES",
                    "priority": 20,
                    "blocking": true,
                    "params": {"sourceAttribute": "code", "referenceKey": "codes"}
                },
                {
                    "validationId": "status-allowed",
                    "ruleType": "ENUM_WHITELIST",
                    "priority": 5,
                    "params": {"sourceAttribute": "status", "allowedValues": ["A", "B"]}
                }
            ]
        }],
        "referenceData": {"MST_CODES": {"codes": ["X1", "X2"]}},
        "collections": {
            "products": [
                {"id": "p1", "code": "X1", "status": "A", "brand": "acme"},
                {"id": "p2", "code": "X9", "status": "A", "brand": "other"}
            ]
        }
    }))
    .unwrap()
}

pub fn seeded_store() -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::from_seed(catalog_seed()))
}

/// Build the full application router with all middleware layers over `store`.
///
/// Mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack production uses.
pub fn build_test_app(store: Arc<InMemoryStore>) -> Router {
    let engine = ValidationEngine::new(Arc::new(RuleRegistry::with_builtins()));
    let state = AppState {
        config: Arc::new(test_config()),
        orchestrator: Arc::new(Orchestrator::with_store(engine, store)),
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

async fn send_json(app: Router, method: Method, uri: &str, body: Value) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response {
    send_json(app, Method::POST, uri, body).await
}

pub async fn put_json(app: Router, uri: &str, body: Value) -> Response {
    send_json(app, Method::PUT, uri, body).await
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    bytes.to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

/// Poll until `store` holds `expected` results, failing after two seconds.
pub async fn wait_for_results(store: &InMemoryStore, expected: usize) {
    for _ in 0..200 {
        if store.result_count().await >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {expected} persisted results, found {}",
        store.result_count().await
    );
}
