//! HTTP upstream for the range cache.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    Client, Response, StatusCode,
    header::{ACCEPT_RANGES, CONTENT_LENGTH, HeaderMap, RANGE},
};
use tracing::debug;
use url::Url;

use crate::cache::{FetchError, RangeFetcher, RangeKey, RangeProbe, ResourceInfo};

use super::error::InfraError;

/// Fetches byte ranges with `Range` requests over a shared reqwest client.
#[derive(Clone, Debug)]
pub struct HttpRangeFetcher {
    client: Client,
}

impl HttpRangeFetcher {
    pub fn new(request_timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(request_timeout)
            .build()
            .map_err(|err| {
                InfraError::configuration(format!("failed to build upstream client: {err}"))
            })?;
        Ok(Self { client })
    }

    pub fn user_agent() -> &'static str {
        concat!("rangecache/", env!("CARGO_PKG_VERSION"))
    }
}

#[async_trait]
impl RangeFetcher for HttpRangeFetcher {
    async fn fetch(&self, resource: &Url, key: RangeKey) -> Result<Bytes, FetchError> {
        let response = self
            .client
            .get(resource.clone())
            .header(RANGE, key.header_value())
            .send()
            .await
            .map_err(|err| FetchError::transport(err.to_string()))?;

        let status = response.status();
        debug!(key = %key, status = status.as_u16(), "upstream range response");

        match status {
            StatusCode::PARTIAL_CONTENT => {
                let body = read_body(response).await?;
                expect_len(key, body)
            }
            // Upstream ignored the Range header and sent the whole resource.
            StatusCode::OK => {
                let body = read_body(response).await?;
                slice_full_body(key, body)
            }
            other => Err(FetchError::status(other.as_u16())),
        }
    }
}

#[async_trait]
impl RangeProbe for HttpRangeFetcher {
    async fn probe(&self, resource: &Url) -> Result<ResourceInfo, FetchError> {
        let response = self
            .client
            .head(resource.clone())
            .send()
            .await
            .map_err(|err| FetchError::transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::status(status.as_u16()));
        }

        let headers = response.headers();
        let info = ResourceInfo {
            total_length: declared_length(headers)?,
            supports_ranges: accepts_byte_ranges(headers),
        };
        debug!(
            total_length = info.total_length,
            supports_ranges = info.supports_ranges,
            "probed upstream resource"
        );
        Ok(info)
    }
}

async fn read_body(response: Response) -> Result<Bytes, FetchError> {
    response
        .bytes()
        .await
        .map_err(|err| FetchError::transport(err.to_string()))
}

fn expect_len(key: RangeKey, body: Bytes) -> Result<Bytes, FetchError> {
    let actual = body.len() as u64;
    if actual != key.len() {
        return Err(FetchError::Length {
            expected: key.len(),
            actual,
        });
    }
    Ok(body)
}

fn slice_full_body(key: RangeKey, body: Bytes) -> Result<Bytes, FetchError> {
    let actual = body.len() as u64;
    if actual <= key.end() {
        return Err(FetchError::Length {
            expected: key.len(),
            actual: actual.saturating_sub(key.start()),
        });
    }
    let from = usize::try_from(key.start())
        .map_err(|_| FetchError::invalid_resource("range start exceeds addressable memory"))?;
    let to = usize::try_from(key.end())
        .map_err(|_| FetchError::invalid_resource("range end exceeds addressable memory"))?;
    Ok(body.slice(from..=to))
}

fn accepts_byte_ranges(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT_RANGES)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|unit| unit.trim().eq_ignore_ascii_case("bytes"))
}

fn declared_length(headers: &HeaderMap) -> Result<u64, FetchError> {
    let value = headers
        .get(CONTENT_LENGTH)
        .ok_or_else(|| FetchError::invalid_resource("missing Content-Length"))?;
    value
        .to_str()
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .ok_or_else(|| FetchError::invalid_resource("malformed Content-Length"))
}
