//! Cache configuration.
//!
//! Controls the byte budget and the request style. Built from the validated
//! `[cache]` settings, see [`crate::config::CacheSettings`].

use std::num::NonZeroU64;
use std::time::Duration;

// 64 MB, matching the default deployment.
const DEFAULT_BYTE_LIMIT: u64 = 64_000_000;

/// Runtime configuration of a [`CacheServer`](super::CacheServer).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum payload bytes held by the store.
    pub byte_limit: NonZeroU64,
    /// Coalesce concurrent requests for the same range into one fetch.
    pub dedup: bool,
    /// How long a coalesced request waits for the leader (ms); 0 waits forever.
    pub wait_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            byte_limit: NonZeroU64::new(DEFAULT_BYTE_LIMIT).unwrap_or(NonZeroU64::MIN),
            dedup: true,
            wait_timeout_ms: 0,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            byte_limit: settings.byte_limit,
            dedup: settings.dedup,
            wait_timeout_ms: settings.wait_timeout_ms,
        }
    }
}

impl CacheConfig {
    /// Build a config with the given budget and defaults elsewhere.
    pub fn with_byte_limit(byte_limit: NonZeroU64) -> Self {
        Self {
            byte_limit,
            ..Default::default()
        }
    }

    /// Waiter timeout, `None` when waiting is unbounded.
    pub fn wait_timeout(&self) -> Option<Duration> {
        (self.wait_timeout_ms > 0).then(|| Duration::from_millis(self.wait_timeout_ms))
    }
}
