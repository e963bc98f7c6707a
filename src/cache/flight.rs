//! In-flight fetch bookkeeping.
//!
//! One marker per range key currently being fetched. The first caller to
//! [`InFlightTable::join`] a key receives its [`FlightLeader`], which is handed
//! to the task performing the fetch; every caller, the first included, waits
//! on a [`Flight`] handle for the published outcome. The outcome travels over
//! a `watch` channel, so any number of waiters observe the single send.
//!
//! The table itself is not synchronized; it lives next to the
//! [`RangeStore`](super::RangeStore) under the server's mutex.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::watch;
use tracing::debug;

use super::error::CacheError;
use super::keys::RangeKey;

/// Result shared by the leader with every waiter of a flight.
pub type FlightOutcome = Result<Bytes, CacheError>;

type Signal = watch::Receiver<Option<FlightOutcome>>;

struct Marker {
    id: u64,
    signal: Signal,
}

impl Marker {
    /// A marker whose outcome has been published, or whose leader is gone,
    /// no longer represents a running fetch.
    fn is_settled(&self) -> bool {
        self.signal.borrow().is_some() || self.signal.has_changed().is_err()
    }
}

/// Result of joining the table for a key.
pub enum Join {
    /// No fetch was running; the caller must perform it.
    Leader(FlightLeader),
    /// Another caller is fetching; wait on the handle.
    Follower(Flight),
}

#[derive(Default)]
pub struct InFlightTable {
    markers: HashMap<RangeKey, Marker>,
    next_id: u64,
}

impl InFlightTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `key`, creating a marker when none is running.
    ///
    /// A settled marker left behind by a dropped leader is replaced, so a key
    /// never stays stuck on an abandoned fetch.
    pub fn join(&mut self, key: RangeKey) -> Join {
        let id = self.next_id;
        match self.markers.entry(key) {
            Entry::Occupied(occupied) if !occupied.get().is_settled() => {
                Join::Follower(Flight {
                    key,
                    signal: occupied.get().signal.clone(),
                })
            }
            entry => {
                self.next_id += 1;
                let (sender, signal) = watch::channel(None);
                let marker = Marker {
                    id,
                    signal: signal.clone(),
                };
                match entry {
                    Entry::Occupied(mut occupied) => {
                        debug!(key = %key, "replacing settled in-flight marker");
                        occupied.insert(marker);
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert(marker);
                    }
                }
                Join::Leader(FlightLeader {
                    key,
                    id,
                    signal,
                    sender: Some(sender),
                })
            }
        }
    }

    /// Remove the marker created for `leader`, returning the key to the absent
    /// state. A newer marker for the same key is left alone.
    pub fn finish(&mut self, leader: &FlightLeader) -> bool {
        match self.markers.entry(leader.key) {
            Entry::Occupied(occupied) if occupied.get().id == leader.id => {
                occupied.remove();
                true
            }
            _ => false,
        }
    }

    /// Number of keys with a registered marker.
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// Obligation to fetch a key and publish the outcome.
///
/// Dropping a leader without calling [`FlightLeader::publish`], for instance
/// when the fetching task panics, wakes every waiter with
/// [`CacheError::Abandoned`].
pub struct FlightLeader {
    key: RangeKey,
    id: u64,
    signal: Signal,
    sender: Option<watch::Sender<Option<FlightOutcome>>>,
}

impl FlightLeader {
    pub fn key(&self) -> RangeKey {
        self.key
    }

    /// Waiter handle on this leader's own flight.
    pub fn flight(&self) -> Flight {
        Flight {
            key: self.key,
            signal: self.signal.clone(),
        }
    }

    /// Broadcast `outcome` to all current and future waiters of this flight.
    pub fn publish(mut self, outcome: FlightOutcome) {
        if let Some(sender) = self.sender.take() {
            sender.send_replace(Some(outcome));
        }
    }
}

impl Drop for FlightLeader {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            debug!(key = %self.key, "in-flight fetch abandoned");
            sender.send_replace(Some(Err(CacheError::Abandoned)));
        }
    }
}

/// Waiter side of a running fetch.
#[derive(Clone)]
pub struct Flight {
    key: RangeKey,
    signal: Signal,
}

impl Flight {
    pub fn key(&self) -> RangeKey {
        self.key
    }

    /// Wait for the leader's outcome.
    ///
    /// Dropping the returned future only abandons this waiter; the leader and
    /// other waiters are unaffected.
    pub async fn wait(mut self) -> FlightOutcome {
        match self.signal.wait_for(Option::is_some).await {
            Ok(outcome) => match &*outcome {
                Some(result) => result.clone(),
                None => Err(CacheError::Abandoned),
            },
            Err(_) => Err(CacheError::Abandoned),
        }
    }

    /// [`Flight::wait`] bounded by `limit`; `None` waits indefinitely.
    pub async fn wait_timeout(self, limit: Option<Duration>) -> FlightOutcome {
        match limit {
            Some(limit) => tokio::time::timeout(limit, self.wait())
                .await
                .unwrap_or(Err(CacheError::WaitTimeout)),
            None => self.wait().await,
        }
    }
}
