//! HTTP fetcher tests against a local axum server - classification, timeout,
//! URL resolution and dedup over a real network call

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use scanx::cache::RequestCache;
use scanx::fetcher::{Fetcher, HttpFetcher};
use scanx::runtime_config::{HttpConfigSource, LoadStatus, RuntimeConfig, RuntimeConfigCell};
use scanx::{classify_error, is_not_found_error, ApiError, ErrorKind, RequestDescriptor};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Default)]
struct Hits(Arc<AtomicUsize>);

async fn spawn_api() -> (SocketAddr, Hits) {
    let hits = Hits::default();
    let app = Router::new()
        .route(
            "/api/blocks",
            get(|State(hits): State<Hits>| async move {
                hits.0.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Json(json!({
                    "total_results": 2,
                    "blocks": [{"height": "2"}, {"height": "1"}]
                }))
            }),
        )
        .route(
            "/api/addresses",
            get(|| async { (StatusCode::NOT_FOUND, "no such address").into_response() }),
        )
        .route(
            "/api/tokens",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR.into_response() }),
        )
        .route(
            "/api/events",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(json!({"events": []}))
            }),
        )
        .route("/api/series", get(|| async { "<html>not json</html>" }))
        .route(
            "/config.json",
            get(|| async { Json(json!({"apiBaseUrl": "/api", "nftsEnabled": true})) }),
        )
        .with_state(hits.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, hits)
}

fn fetcher_for(addr: SocketAddr, timeout_ms: u64) -> HttpFetcher {
    let runtime = Arc::new(RuntimeConfigCell::preloaded(RuntimeConfig::with_base_url(
        format!("http://{addr}/api/"),
    )));
    HttpFetcher::new(runtime).with_timeout_ms(timeout_ms)
}

#[tokio::test]
async fn ok_response_is_parsed() {
    let (addr, _) = spawn_api().await;
    let fetcher = fetcher_for(addr, 2_000);
    let v = fetcher.fetch_json("blocks?limit=2").await.unwrap();
    assert_eq!(v["total_results"], 2);
    assert_eq!(v["blocks"][0]["height"], "2");
}

#[tokio::test]
async fn status_404_is_not_found() {
    let (addr, _) = spawn_api().await;
    let fetcher = fetcher_for(addr, 2_000);
    let err = fetcher.fetch_json("addresses?address=P2K").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(err.is_not_found());
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.url().ends_with("/api/addresses?address=P2K"));

    let erased = anyhow::Error::from(err);
    assert!(is_not_found_error(&erased));
}

#[tokio::test]
async fn status_500_is_generic_failure() {
    let (addr, _) = spawn_api().await;
    let fetcher = fetcher_for(addr, 2_000);
    let err = fetcher.fetch_json("tokens").await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(!err.is_not_found());
    assert_eq!(classify_error(&err.into()), ErrorKind::RequestFailed);
}

#[tokio::test]
async fn slow_response_times_out() {
    let (addr, _) = spawn_api().await;
    let fetcher = fetcher_for(addr, 200);
    let err = fetcher.fetch_json("events").await.unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
    assert!(matches!(err, ApiError::Timeout { timeout_ms: 200, .. }));
    assert_eq!(err.kind(), ErrorKind::RequestFailed);
}

#[tokio::test]
async fn non_json_body_is_decode_failure() {
    let (addr, _) = spawn_api().await;
    let fetcher = fetcher_for(addr, 2_000);
    let err = fetcher.fetch_json("series").await.unwrap_err();
    assert!(matches!(err, ApiError::Decode { .. }));
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn connection_refused_is_network_failure() {
    // Bind then drop to get a port nobody listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let fetcher = fetcher_for(addr, 2_000);
    let err = fetcher.fetch_json("blocks").await.unwrap_err();
    assert!(matches!(err, ApiError::Network { .. }), "got {err:?}");
}

#[tokio::test]
async fn absolute_urls_bypass_base() {
    let (addr, _) = spawn_api().await;
    let runtime = Arc::new(RuntimeConfigCell::preloaded(RuntimeConfig::with_base_url(
        "http://127.0.0.1:9/unused",
    )));
    let fetcher = HttpFetcher::new(runtime).with_timeout_ms(2_000);
    let v = fetcher
        .fetch_json(&format!("http://{addr}/api/blocks"))
        .await
        .unwrap();
    assert_eq!(v["blocks"][1]["height"], "1");
}

#[tokio::test]
async fn cache_dedups_real_requests() {
    let (addr, hits) = spawn_api().await;
    let cache = RequestCache::new(Arc::new(fetcher_for(addr, 2_000)));
    let req = RequestDescriptor::new("blocks").param("limit", 2u32);
    let same = req.clone();

    let (a, b) = tokio::join!(cache.fetch(&req), cache.fetch(&same));
    assert_eq!(hits.0.load(Ordering::SeqCst), 1);
    assert_eq!(a.data, b.data);
    assert!(a.data.is_some());
}

#[tokio::test]
async fn runtime_config_loaded_over_http_sets_base_url() {
    let (addr, hits) = spawn_api().await;
    let source = HttpConfigSource::new(
        format!("http://{addr}/config.json"),
        Duration::from_secs(2),
    );
    let runtime = Arc::new(RuntimeConfigCell::new(
        Some(Arc::new(source)),
        "http://127.0.0.1:9/fallback",
    ));
    let cfg = runtime.get().await;
    assert_eq!(cfg.api_base_url, "/api");
    assert!(cfg.flag("nftsEnabled"));
    assert_eq!(runtime.status(), LoadStatus::Loaded);

    // A relative base is not usable for requests; point it at the server.
    let runtime = Arc::new(RuntimeConfigCell::preloaded(RuntimeConfig::with_base_url(
        format!("http://{addr}{}", cfg.api_base_url),
    )));
    let fetcher = HttpFetcher::new(runtime).with_timeout_ms(2_000);
    fetcher.fetch_json("blocks").await.unwrap();
    assert_eq!(hits.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_runtime_config_falls_back() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let source = HttpConfigSource::new(
        format!("http://{addr}/config.json"),
        Duration::from_millis(500),
    );
    let runtime = RuntimeConfigCell::new(Some(Arc::new(source)), "https://fallback.example/v1");
    assert_eq!(runtime.get().await.api_base_url, "https://fallback.example/v1");
    assert!(matches!(runtime.status(), LoadStatus::Failed(_)));
}
