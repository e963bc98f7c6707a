use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::debug;

use crate::{
    application::{
        error::AppError,
        ranges::{RangeQuery, RangeService},
    },
    cache::{CacheStats, ResourceInfo},
};

use super::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub ranges: Arc<RangeService>,
    pub content_type: HeaderValue,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(serve_range))
        .route("/range", get(serve_range))
        .route("/_stats", get(stats))
        .route("/_health", get(health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn serve_range(
    State(state): State<HttpState>,
    Query(query): Query<RangeQuery>,
) -> Result<Response, AppError> {
    let (key, payload) = state.ranges.read(&query).await?;
    let len = payload.len();
    debug!(key = %key, bytes = len, "serving range");

    let mut response = payload.into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, state.content_type.clone());
    headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    Ok(response)
}

#[derive(Debug, serde::Serialize)]
struct StatsView {
    #[serde(flatten)]
    cache: CacheStats,
    resource: ResourceInfo,
}

async fn stats(State(state): State<HttpState>) -> Json<StatsView> {
    Json(StatsView {
        cache: state.ranges.stats(),
        resource: state.ranges.resource(),
    })
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
