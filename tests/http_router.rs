mod support;

use std::{num::NonZeroU64, sync::Arc, time::Duration};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header::CONTENT_TYPE},
    response::Response,
};
use futures::future::join_all;
use rangecache::{
    application::ranges::RangeService,
    cache::{CacheConfig, CacheServer, RangeProbe},
    infra::{
        http::{HttpState, REQUEST_ID_HEADER, build_router},
        upstream::HttpRangeFetcher,
    },
};
use serde_json::Value;
use tower::ServiceExt;

use support::{RESOURCE_LEN, Upstream, resource_body};

struct Harness {
    upstream: Upstream,
    router: Router,
}

async fn harness(config: CacheConfig, delay: Duration) -> Harness {
    let upstream = Upstream::new(delay);
    let base = upstream.spawn().await;
    let resource = base.join("video.mp4").expect("resource url");

    let fetcher = Arc::new(HttpRangeFetcher::new(Duration::from_secs(5)).expect("client"));
    let info = fetcher.probe(&resource).await.expect("probe");
    let cache = Arc::new(CacheServer::new(config, resource, fetcher));
    let state = HttpState {
        ranges: Arc::new(RangeService::new(cache, info, 1_000)),
        content_type: "video/mp4".parse().expect("content type"),
    };

    Harness {
        upstream,
        router: build_router(state),
    }
}

async fn get(router: &Router, uri: &str) -> Response {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond")
}

async fn body_of(response: Response) -> bytes::Bytes {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should collect")
}

#[tokio::test(flavor = "multi_thread")]
async fn serves_requested_range_with_content_type() {
    let harness = harness(CacheConfig::default(), Duration::ZERO).await;

    let response = get(&harness.router, "/?start=0&end=99").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).map(|v| v.as_bytes()),
        Some(&b"video/mp4"[..])
    );
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    assert_eq!(body_of(response).await, resource_body().slice(0..=99));
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_and_contained_ranges_hit_the_cache() {
    let harness = harness(CacheConfig::default(), Duration::ZERO).await;

    for _ in 0..3 {
        let response = get(&harness.router, "/range?start=1000&end=1999").await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = get(&harness.router, "/range?start=1200&end=1299").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_of(response).await, resource_body().slice(1200..=1299));

    assert_eq!(harness.upstream.range_gets(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn end_defaults_to_span_and_clamps_to_resource() {
    let harness = harness(CacheConfig::default(), Duration::ZERO).await;

    let response = get(&harness.router, "/?start=500").await;
    assert_eq!(body_of(response).await.len(), 1_001);

    let response = get(&harness.router, "/?start=9500").await;
    assert_eq!(
        body_of(response).await,
        resource_body().slice(9_500..RESOURCE_LEN)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn rejects_bad_queries() {
    let harness = harness(CacheConfig::default(), Duration::ZERO).await;

    assert_eq!(
        get(&harness.router, "/").await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        get(&harness.router, "/?start=abc").await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        get(&harness.router, "/?start=50&end=10").await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        get(&harness.router, "/?start=10000").await.status(),
        StatusCode::RANGE_NOT_SATISFIABLE
    );
    assert_eq!(harness.upstream.range_gets(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_range_reports_capacity() {
    let config = CacheConfig::with_byte_limit(NonZeroU64::new(100).expect("nonzero"));
    let harness = harness(config, Duration::ZERO).await;

    let response = get(&harness.router, "/?start=0&end=499").await;
    assert_eq!(response.status(), StatusCode::INSUFFICIENT_STORAGE);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_identical_requests_share_one_fetch() {
    let harness = harness(CacheConfig::default(), Duration::from_millis(100)).await;

    let responses = join_all((0..8).map(|_| get(&harness.router, "/?start=0&end=4095"))).await;
    for response in responses {
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await.len(), 4_096);
    }

    assert_eq!(harness.upstream.range_gets(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn stats_and_health_endpoints() {
    let harness = harness(CacheConfig::default(), Duration::ZERO).await;
    let _ = body_of(get(&harness.router, "/?start=0&end=9").await).await;

    let response = get(&harness.router, "/_stats").await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats: Value = serde_json::from_slice(&body_of(response).await).expect("json");
    assert_eq!(stats["entries"], 1);
    assert_eq!(stats["bytes_used"], 10);
    assert_eq!(stats["byte_limit"], 64_000_000);
    assert_eq!(stats["in_flight"], 0);
    assert_eq!(stats["resource"]["total_length"], RESOURCE_LEN as u64);
    assert_eq!(stats["resource"]["supports_ranges"], true);

    let response = get(&harness.router, "/_health").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
