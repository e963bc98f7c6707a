//! Local range-capable upstream used by the integration tests.

#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    extract::State,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{ACCEPT_RANGES, CONTENT_LENGTH, RANGE},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use tokio::net::TcpListener;
use url::Url;

pub const RESOURCE_LEN: usize = 10_000;

#[derive(Clone)]
pub struct Upstream {
    pub body: Bytes,
    pub range_gets: Arc<AtomicUsize>,
    pub delay: Duration,
}

impl Upstream {
    pub fn new(delay: Duration) -> Self {
        Self {
            body: resource_body(),
            range_gets: Arc::new(AtomicUsize::new(0)),
            delay,
        }
    }

    pub fn range_gets(&self) -> usize {
        self.range_gets.load(Ordering::SeqCst)
    }

    /// Serve the upstream on an ephemeral port, returning its base URL.
    pub async fn spawn(&self) -> Url {
        let router = Router::new()
            .route("/video.mp4", get(ranged).head(head_ranged))
            .route("/plain.mp4", get(full).head(head_plain))
            .route("/broken.mp4", get(broken).head(broken))
            .with_state(self.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral upstream port");
        let addr: SocketAddr = listener.local_addr().expect("upstream addr");
        tokio::spawn(async move {
            axum::serve(listener, router)
                .await
                .expect("upstream server should run");
        });

        Url::parse(&format!("http://{addr}/")).expect("valid base url")
    }
}

/// Deterministic payload: byte `i` is `i % 251`.
pub fn resource_body() -> Bytes {
    (0..RESOURCE_LEN).map(|i| (i % 251) as u8).collect()
}

fn parse_range(headers: &HeaderMap) -> Option<(usize, usize)> {
    let raw = headers.get(RANGE)?.to_str().ok()?;
    let bounds = raw.strip_prefix("bytes=")?;
    let (start, end) = bounds.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

async fn ranged(State(upstream): State<Upstream>, headers: HeaderMap) -> Response {
    upstream.range_gets.fetch_add(1, Ordering::SeqCst);
    if !upstream.delay.is_zero() {
        tokio::time::sleep(upstream.delay).await;
    }

    let Some((start, end)) = parse_range(&headers) else {
        return (StatusCode::OK, upstream.body.clone()).into_response();
    };
    if start > end || start >= upstream.body.len() {
        return StatusCode::RANGE_NOT_SATISFIABLE.into_response();
    }
    let end = end.min(upstream.body.len() - 1);
    (
        StatusCode::PARTIAL_CONTENT,
        upstream.body.slice(start..=end),
    )
        .into_response()
}

async fn head_ranged(State(upstream): State<Upstream>) -> Response {
    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(upstream.body.len()));
    response
}

async fn full(State(upstream): State<Upstream>) -> Response {
    upstream.range_gets.fetch_add(1, Ordering::SeqCst);
    (StatusCode::OK, upstream.body.clone()).into_response()
}

async fn head_plain(State(upstream): State<Upstream>) -> Response {
    let mut response = StatusCode::OK.into_response();
    response
        .headers_mut()
        .insert(CONTENT_LENGTH, HeaderValue::from(upstream.body.len()));
    response
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}
