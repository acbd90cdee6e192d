//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each diagnostics endpoint against a
//! cache backed by the JSON fixtures in `tests/data`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use refcache::payload::NamedValueDto;
use refcache::{
    api::create_router, AcceptAll, AppState, CacheConfig, ExceptionStrategy, FileDataSource,
    Locale, NamedValueCache,
};
use serde_json::Value;
use tower::ServiceExt;

// == Helper Functions ==

fn test_config(strategy: ExceptionStrategy) -> CacheConfig {
    CacheConfig::new("MatchStatus", [Locale::new("en"), Locale::new("de")])
        .strategy(strategy)
        .refresh(Duration::from_secs(3600), Duration::ZERO)
}

fn create_cache(config: CacheConfig) -> Arc<NamedValueCache> {
    let source: FileDataSource<NamedValueDto> = FileDataSource::new(
        concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data"),
        "match_status",
    );
    Arc::new(NamedValueCache::new(config, Arc::new(source), Arc::new(AcceptAll)).unwrap())
}

fn create_test_app(strategy: ExceptionStrategy) -> Router {
    create_router(AppState::new(create_cache(test_config(strategy))))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// == Resolve Endpoint Tests ==

#[tokio::test]
async fn test_resolve_endpoint_success() {
    let app = create_test_app(ExceptionStrategy::Throw);

    let response = app.oneshot(get("/entities/0?locales=en,de")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["id"], "0");
    assert_eq!(json["values"]["en"], "Not started");
    assert_eq!(json["values"]["de"], "Nicht begonnen");
    assert_eq!(json["shell"], false);
}

#[tokio::test]
async fn test_resolve_endpoint_defaults_to_prefetch_locales() {
    let app = create_test_app(ExceptionStrategy::Throw);

    let response = app.oneshot(get("/entities/100")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["fetched_locales"], serde_json::json!(["de", "en"]));
}

#[tokio::test]
async fn test_resolve_endpoint_extra_locale() {
    let app = create_test_app(ExceptionStrategy::Throw);

    let response = app.oneshot(get("/entities/0?locales=nl")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["values"]["nl"], "Niet begonnen");
}

#[tokio::test]
async fn test_resolve_endpoint_not_found_under_throw() {
    let app = create_test_app(ExceptionStrategy::Throw);

    let response = app.oneshot(get("/entities/1000")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("1000"));
}

#[tokio::test]
async fn test_resolve_endpoint_shell_under_catch() {
    let app = create_test_app(ExceptionStrategy::Catch);

    let response = app.oneshot(get("/entities/1000")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["shell"], true);
    assert!(json["values"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn test_resolve_endpoint_missing_locale_file_under_throw() {
    let app = create_test_app(ExceptionStrategy::Throw);

    let response = app.oneshot(get("/entities/0?locales=xx")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_resolve_endpoint_after_dispose() {
    let cache = create_cache(test_config(ExceptionStrategy::Catch));
    let app = create_router(AppState::new(Arc::clone(&cache)));
    cache.dispose();

    let response = app.clone().oneshot(get("/entities/0")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = app.oneshot(get("/health")).await.unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["caches"][0]["status"], "disposed");
}

// == Exists / Invalidate Endpoint Tests ==

#[tokio::test]
async fn test_exists_and_invalidate_endpoints() {
    let app = create_test_app(ExceptionStrategy::Throw);

    let response = app.clone().oneshot(get("/entities/6/exists")).await.unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["exists"], false);

    let response = app.clone().oneshot(get("/entities/6")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(get("/entities/6/exists")).await.unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["exists"], true);

    let response = app.clone().oneshot(delete("/entities/6")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], true);
    assert!(json["message"].as_str().unwrap().contains("invalidated"));

    let response = app.oneshot(delete("/entities/6")).await.unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], false);
}

// == STATS Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint() {
    let app = create_test_app(ExceptionStrategy::Throw);

    // Miss then hit
    app.clone().oneshot(get("/entities/0")).await.unwrap();
    app.clone().oneshot(get("/entities/0")).await.unwrap();

    let response = app.oneshot(get("/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    let stats = &json[0];
    assert_eq!(stats["cache"], "MatchStatus");
    assert!(stats["hits"].as_u64().unwrap() >= 1);
    assert!(stats["misses"].as_u64().unwrap() >= 1);
    assert_eq!(stats["total_entries"], 8);
    assert!(stats["size_bytes"].as_u64().unwrap() > 0);
}

// == HEALTH Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app(ExceptionStrategy::Catch);

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
    assert_eq!(json["caches"][0]["description"], "Cache has 0 items");
}

// == Error Response Tests ==

#[tokio::test]
async fn test_invalid_id_request() {
    let app = create_test_app(ExceptionStrategy::Catch);

    let response = app.oneshot(get("/entities/abc")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_empty_locales_request() {
    let app = create_test_app(ExceptionStrategy::Catch);

    let response = app.oneshot(get("/entities/0?locales=,")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// == TTL Expiration via API Tests ==

#[tokio::test]
async fn test_ttl_expiration_via_api() {
    let config = test_config(ExceptionStrategy::Throw)
        .no_expiration()
        .absolute_ttl(Duration::from_millis(200))
        .jitter_percent(0)
        .scan_interval(Duration::from_millis(50));
    let app = create_router(AppState::new(create_cache(config)));

    app.clone().oneshot(get("/entities/0")).await.unwrap();
    let response = app.clone().oneshot(get("/entities/0/exists")).await.unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["exists"], true);

    tokio::time::sleep(Duration::from_millis(400)).await;

    let response = app.clone().oneshot(get("/entities/0/exists")).await.unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["exists"], false);

    // The expired entry is fetched again on the next resolve
    let response = app.oneshot(get("/entities/0")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
