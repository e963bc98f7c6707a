use thiserror::Error;

/// Failure reported by a [`RangeFetcher`](super::RangeFetcher).
///
/// Cloneable so a single outcome can be handed to every coalesced caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("upstream transport error: {message}")]
    Transport { message: String },
    #[error("upstream responded with status {status}")]
    Status { status: u16 },
    #[error("upstream does not support byte ranges")]
    RangeUnsupported,
    #[error("upstream returned {actual} bytes, expected {expected}")]
    Length { expected: u64, actual: u64 },
    #[error("invalid upstream resource: {message}")]
    InvalidResource { message: String },
}

impl FetchError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self::Status { status }
    }

    pub fn invalid_resource(message: impl Into<String>) -> Self {
        Self::InvalidResource {
            message: message.into(),
        }
    }
}

/// Per-request failures of the range cache.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("invalid byte range [{start}, {end}]")]
    InvalidRange { start: u64, end: u64 },
    #[error("payload of {required} bytes exceeds the cache budget of {limit} bytes")]
    Capacity { required: u64, limit: u64 },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("the fetch this request was waiting on was abandoned")]
    Abandoned,
    #[error("timed out waiting for an in-flight fetch")]
    WaitTimeout,
}

impl CacheError {
    pub fn invalid_range(start: u64, end: u64) -> Self {
        Self::InvalidRange { start, end }
    }

    pub fn capacity(required: u64, limit: u64) -> Self {
        Self::Capacity { required, limit }
    }
}
