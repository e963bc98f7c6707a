//! Seams to the upstream resource.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use url::Url;

use super::error::FetchError;
use super::keys::RangeKey;

/// Fetches exact byte intervals of an upstream resource.
#[async_trait]
pub trait RangeFetcher: Send + Sync {
    /// Return exactly the bytes of `key` (inclusive) from `resource`.
    async fn fetch(&self, resource: &Url, key: RangeKey) -> Result<Bytes, FetchError>;
}

/// Reports whether a resource can be served by range.
#[async_trait]
pub trait RangeProbe: Send + Sync {
    async fn probe(&self, resource: &Url) -> Result<ResourceInfo, FetchError>;
}

/// Capability of an upstream resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceInfo {
    pub total_length: u64,
    pub supports_ranges: bool,
}

impl ResourceInfo {
    /// Offset of the final byte, or `None` for an empty resource.
    pub fn last_offset(&self) -> Option<u64> {
        self.total_length.checked_sub(1)
    }
}
