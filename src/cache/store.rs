//! Byte-budgeted range storage.
//!
//! Entries live in an unbounded [`LruCache`]; the store enforces its own byte
//! budget by popping least-recently-used entries after every insertion.

use bytes::Bytes;
use lru::LruCache;
use metrics::{counter, gauge};
use tracing::debug;

use super::error::CacheError;
use super::keys::RangeKey;

const METRIC_HIT: &str = "rangecache_hit_total";
const METRIC_MISS: &str = "rangecache_miss_total";
const METRIC_EVICT: &str = "rangecache_evict_total";
const METRIC_BYTES_USED: &str = "rangecache_bytes_used";

/// How a lookup was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// The requested key is stored as-is.
    Exact,
    /// The requested key lies inside a larger stored range.
    Contained(RangeKey),
}

impl MatchKind {
    fn label(&self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Contained(_) => "contained",
        }
    }
}

/// Range-aware LRU store bounded by a byte budget.
///
/// Not synchronized; [`CacheServer`](super::CacheServer) guards it with the
/// same mutex as the in-flight table.
pub struct RangeStore {
    entries: LruCache<RangeKey, Bytes>,
    bytes_used: u64,
    byte_limit: u64,
}

impl RangeStore {
    /// Create an empty store that holds at most `byte_limit` payload bytes.
    pub fn new(byte_limit: u64) -> Self {
        Self {
            entries: LruCache::unbounded(),
            bytes_used: 0,
            byte_limit,
        }
    }

    /// Insert or overwrite `key`, evicting least-recently-used entries until the
    /// budget holds.
    ///
    /// A payload larger than the whole budget is rejected up front and leaves
    /// the store untouched, including any existing entry for `key`.
    pub fn add(&mut self, key: RangeKey, payload: Bytes) -> Result<(), CacheError> {
        let required = payload.len() as u64;
        if required > self.byte_limit {
            return Err(CacheError::capacity(required, self.byte_limit));
        }

        // `put` moves the key to the most-recently-used slot, so the loop below
        // never selects it while any other entry remains.
        let previous = self
            .entries
            .put(key, payload)
            .map_or(0, |old| old.len() as u64);
        self.bytes_used = self.bytes_used - previous + required;

        while self.bytes_used > self.byte_limit {
            if self.evict().is_none() {
                break;
            }
        }

        gauge!(METRIC_BYTES_USED).set(self.bytes_used as f64);
        debug!(
            key = %key,
            bytes = required,
            replaced = previous > 0,
            bytes_used = self.bytes_used,
            "stored range"
        );
        Ok(())
    }

    /// Look up `key`, returning the payload slice for it.
    pub fn get(&mut self, key: &RangeKey) -> Option<Bytes> {
        self.lookup(key).map(|(payload, _)| payload)
    }

    /// Like [`RangeStore::get`], also reporting whether the hit was exact or
    /// served from a containing range.
    ///
    /// Exact matches win. Otherwise the smallest stored range that contains
    /// `key` is used; among equally sized candidates the most recently used
    /// one wins. The matched entry becomes most recently used.
    pub fn lookup(&mut self, key: &RangeKey) -> Option<(Bytes, MatchKind)> {
        if let Some(payload) = self.entries.get(key) {
            let payload = payload.clone();
            counter!(METRIC_HIT, "match" => MatchKind::Exact.label()).increment(1);
            return Some((payload, MatchKind::Exact));
        }

        let container = self
            .entries
            .iter()
            .filter(|(stored, payload)| covers(stored, payload, key))
            .min_by_key(|(stored, _)| stored.len())
            .map(|(stored, _)| *stored);

        let Some(container) = container else {
            counter!(METRIC_MISS).increment(1);
            return None;
        };

        let kind = MatchKind::Contained(container);
        let payload = self
            .entries
            .get(&container)
            .zip(container.relative_span(key))
            .map(|(payload, span)| payload.slice(span))?;
        counter!(METRIC_HIT, "match" => kind.label()).increment(1);
        Some((payload, kind))
    }

    /// Drop the least-recently-used entry, returning the bytes it freed.
    pub fn evict(&mut self) -> Option<u64> {
        let (key, payload) = self.entries.pop_lru()?;
        let freed = payload.len() as u64;
        self.bytes_used -= freed;

        counter!(METRIC_EVICT).increment(1);
        gauge!(METRIC_BYTES_USED).set(self.bytes_used as f64);
        debug!(key = %key, bytes = freed, "evicted range");
        Some(freed)
    }

    pub fn bytes_used(&self) -> u64 {
        self.bytes_used
    }

    pub fn byte_limit(&self) -> u64 {
        self.byte_limit
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// A stored payload shorter than its key cannot serve every sub-range.
fn covers(stored: &RangeKey, payload: &Bytes, wanted: &RangeKey) -> bool {
    stored
        .relative_span(wanted)
        .is_some_and(|span| span.end <= payload.len())
}
