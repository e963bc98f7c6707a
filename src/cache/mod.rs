//! Range cache core.
//!
//! - [`RangeStore`]: byte-budgeted LRU storage whose lookups also match any
//!   stored range that fully contains the requested one.
//! - [`InFlightTable`]: at most one upstream fetch per exact range key, with
//!   every concurrent caller for that key observing the single outcome.
//! - [`CacheServer`]: both of the above behind one mutex, plus the upstream
//!   [`RangeFetcher`].
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! byte_limit = 64000000
//! dedup = true
//! wait_timeout_ms = 0
//! ```

mod config;
mod error;
mod fetch;
mod flight;
mod keys;
mod lock;
mod server;
mod store;

pub use config::CacheConfig;
pub use error::{CacheError, FetchError};
pub use fetch::{RangeFetcher, RangeProbe, ResourceInfo};
pub use flight::{Flight, FlightLeader, FlightOutcome, InFlightTable, Join};
pub use keys::RangeKey;
pub use server::{CacheServer, CacheStats};
pub use store::{MatchKind, RangeStore};
