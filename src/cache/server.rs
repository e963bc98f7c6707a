//! Request orchestration over the store and the in-flight table.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use bytes::Bytes;
use metrics::{counter, histogram};
use serde::Serialize;
use tracing::{Instrument, debug, info, instrument, warn};
use url::Url;

use super::config::CacheConfig;
use super::error::CacheError;
use super::fetch::RangeFetcher;
use super::flight::{FlightLeader, InFlightTable, Join};
use super::keys::RangeKey;
use super::lock::mutex_lock;
use super::store::{MatchKind, RangeStore};

const SOURCE: &str = "cache::server";
const METRIC_FETCH_TOTAL: &str = "rangecache_fetch_total";
const METRIC_FETCH_MS: &str = "rangecache_fetch_ms";
const METRIC_COALESCED: &str = "rangecache_coalesced_total";

/// Everything guarded by the server's single lock.
struct CacheState {
    store: RangeStore,
    flights: InFlightTable,
}

/// Point-in-time view of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes_used: u64,
    pub byte_limit: u64,
    pub in_flight: usize,
}

/// State shared between request handlers and detached fetch tasks.
struct Shared {
    resource: Url,
    fetcher: Arc<dyn RangeFetcher>,
    state: Mutex<CacheState>,
}

/// Serves ranges of one upstream resource through the range store.
///
/// Store lookups, insertions and in-flight bookkeeping happen under one mutex
/// held only for short synchronous sections; upstream fetches run outside it.
pub struct CacheServer {
    config: CacheConfig,
    shared: Arc<Shared>,
}

impl CacheServer {
    pub fn new(config: CacheConfig, resource: Url, fetcher: Arc<dyn RangeFetcher>) -> Self {
        let state = CacheState {
            store: RangeStore::new(config.byte_limit.get()),
            flights: InFlightTable::new(),
        };
        Self {
            config,
            shared: Arc::new(Shared {
                resource,
                fetcher,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn resource(&self) -> &Url {
        &self.shared.resource
    }

    /// Serve `key` using the request style selected by [`CacheConfig::dedup`].
    pub async fn serve(&self, key: RangeKey) -> Result<Bytes, CacheError> {
        if self.config.dedup {
            self.fetch_or_serve(key).await
        } else {
            self.get_range(key).await
        }
    }

    /// Serve `key` from the store, or fetch it with at most one upstream
    /// request per key in flight at a time.
    ///
    /// The fetch runs on its own task, so every caller, the one that started
    /// it included, only waits for the outcome. Dropping any caller abandons
    /// that caller alone. All callers receive the same outcome, errors
    /// included.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn fetch_or_serve(&self, key: RangeKey) -> Result<Bytes, CacheError> {
        let join = {
            let mut state = self.shared.lock("fetch_or_serve");
            if let Some((payload, kind)) = state.store.lookup(&key) {
                log_hit(kind);
                return Ok(payload);
            }
            state.flights.join(key)
        };

        match join {
            Join::Leader(leader) => {
                let flight = leader.flight();
                let shared = Arc::clone(&self.shared);
                tokio::spawn(shared.lead(leader).in_current_span());
                flight.wait().await
            }
            Join::Follower(flight) => {
                counter!(METRIC_COALESCED).increment(1);
                debug!(outcome = "coalesced", "waiting for in-flight fetch");
                flight.wait_timeout(self.config.wait_timeout()).await
            }
        }
    }

    /// Serve `key` from the store or fetch it, without coalescing. Concurrent
    /// identical requests may each reach the upstream.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn get_range(&self, key: RangeKey) -> Result<Bytes, CacheError> {
        let cached = self.shared.lock("get_range").store.lookup(&key);
        if let Some((payload, kind)) = cached {
            log_hit(kind);
            return Ok(payload);
        }

        let payload = self.shared.fetch_upstream(key).await?;
        self.shared
            .lock("get_range.add")
            .store
            .add(key, payload.clone())?;
        Ok(payload)
    }

    /// Direct store lookup, bypassing the upstream.
    pub fn get(&self, key: &RangeKey) -> Option<Bytes> {
        self.shared.lock("get").store.get(key)
    }

    /// Direct store insertion, bypassing the upstream.
    pub fn add(&self, key: RangeKey, payload: Bytes) -> Result<(), CacheError> {
        self.shared.lock("add").store.add(key, payload)
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.shared.lock("stats");
        CacheStats {
            entries: state.store.len(),
            bytes_used: state.store.bytes_used(),
            byte_limit: state.store.byte_limit(),
            in_flight: state.flights.len(),
        }
    }
}

impl Shared {
    /// Fetch the leader's key, record it and publish the outcome.
    async fn lead(self: Arc<Self>, leader: FlightLeader) {
        let key = leader.key();
        let fetched = self.fetch_upstream(key).await;

        let outcome = {
            let mut state = self.lock("fetch_or_serve.complete");
            let outcome = fetched.and_then(|payload| {
                state
                    .store
                    .add(key, payload.clone())
                    .map(|()| payload)
            });
            state.flights.finish(&leader);
            outcome
        };

        if let Err(err) = &outcome {
            warn!(error = %err, "range fetch failed");
        }
        leader.publish(outcome);
    }

    async fn fetch_upstream(&self, key: RangeKey) -> Result<Bytes, CacheError> {
        let started_at = Instant::now();
        let result = self.fetcher.fetch(&self.resource, key).await;
        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;

        let outcome = if result.is_ok() { "ok" } else { "error" };
        counter!(METRIC_FETCH_TOTAL, "outcome" => outcome).increment(1);
        histogram!(METRIC_FETCH_MS).record(elapsed_ms);

        let payload = result?;
        info!(
            bytes = payload.len(),
            elapsed_ms,
            outcome = "miss",
            "fetched range from upstream"
        );
        Ok(payload)
    }

    fn lock(&self, op: &'static str) -> MutexGuard<'_, CacheState> {
        mutex_lock(&self.state, SOURCE, op)
    }
}

fn log_hit(kind: MatchKind) {
    match kind {
        MatchKind::Exact => debug!(outcome = "hit", "serving exact range"),
        MatchKind::Contained(container) => {
            debug!(outcome = "hit", container = %container, "serving contained range")
        }
    }
}
