use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "rangecache_hit_total",
            Unit::Count,
            "Range lookups answered from the store, labelled by exact or contained match."
        );
        describe_counter!(
            "rangecache_miss_total",
            Unit::Count,
            "Range lookups with no containing entry in the store."
        );
        describe_counter!(
            "rangecache_evict_total",
            Unit::Count,
            "Entries evicted to stay within the byte budget."
        );
        describe_gauge!(
            "rangecache_bytes_used",
            Unit::Bytes,
            "Payload bytes currently held by the store."
        );
        describe_counter!(
            "rangecache_fetch_total",
            Unit::Count,
            "Upstream range fetches, labelled by outcome."
        );
        describe_histogram!(
            "rangecache_fetch_ms",
            Unit::Milliseconds,
            "Upstream range fetch latency in milliseconds."
        );
        describe_counter!(
            "rangecache_coalesced_total",
            Unit::Count,
            "Requests that waited on an identical in-flight fetch instead of issuing their own."
        );
    });
}
