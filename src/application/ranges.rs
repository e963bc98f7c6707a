//! Range requests: query resolution against the probed resource, then serving
//! through the cache.

use std::sync::Arc;

use bytes::Bytes;
use serde::Deserialize;

use crate::cache::{CacheServer, CacheStats, RangeKey, ResourceInfo};

use super::error::AppError;

/// Raw `start`/`end` query parameters.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl RangeQuery {
    pub fn new(start: impl Into<String>, end: Option<&str>) -> Self {
        Self {
            start: Some(start.into()),
            end: end.map(str::to_string),
        }
    }
}

pub struct RangeService {
    cache: Arc<CacheServer>,
    resource: ResourceInfo,
    default_span: u64,
}

impl RangeService {
    pub fn new(cache: Arc<CacheServer>, resource: ResourceInfo, default_span: u64) -> Self {
        Self {
            cache,
            resource,
            default_span,
        }
    }

    pub fn resource(&self) -> ResourceInfo {
        self.resource
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Turn query parameters into the key that will be served.
    ///
    /// A missing `end` becomes `start + default_span`; any `end` past the
    /// resource is clamped to its last byte.
    pub fn resolve(&self, query: &RangeQuery) -> Result<RangeKey, AppError> {
        let start = match query.start.as_deref() {
            Some(raw) => parse_offset("start", raw)?,
            None => return Err(AppError::validation("missing required parameter `start`")),
        };
        let requested_end = match query.end.as_deref() {
            Some(raw) => parse_offset("end", raw)?,
            None => start.saturating_add(self.default_span),
        };

        let last = match self.resource.last_offset() {
            Some(last) if start <= last => last,
            _ => {
                return Err(AppError::RangeNotSatisfiable {
                    start,
                    total_length: self.resource.total_length,
                });
            }
        };

        Ok(RangeKey::new(start, requested_end.min(last))?)
    }

    /// Resolve `query` and serve its bytes through the cache.
    pub async fn read(&self, query: &RangeQuery) -> Result<(RangeKey, Bytes), AppError> {
        let key = self.resolve(query)?;
        let payload = self.cache.serve(key).await?;
        Ok((key, payload))
    }
}

fn parse_offset(name: &str, raw: &str) -> Result<u64, AppError> {
    raw.trim().parse::<u64>().map_err(|err| {
        AppError::validation(format!("parameter `{name}` must be a byte offset: {err}"))
    })
}
