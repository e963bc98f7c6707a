use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the rangecache binary.
#[derive(Debug, Parser)]
#[command(name = "rangecache", version, about = "Byte-range caching server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "RANGECACHE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve byte ranges of the upstream resource over HTTP.
    Serve(Box<ServeArgs>),
    /// Check whether the upstream resource supports byte ranges.
    Probe(ProbeArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub upstream: UpstreamOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct UpstreamOverrides {
    /// Override the upstream resource URL.
    #[arg(long = "upstream-url", value_name = "URL")]
    pub upstream_url: Option<String>,

    /// Override the upstream request timeout.
    #[arg(long = "upstream-request-timeout-seconds", value_name = "SECONDS")]
    pub upstream_request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub upstream: UpstreamOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the cache byte budget.
    #[arg(long = "cache-byte-limit", value_name = "BYTES")]
    pub cache_byte_limit: Option<u64>,

    /// Toggle duplicate suppression for concurrent identical ranges.
    #[arg(
        long = "cache-dedup",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_dedup: Option<bool>,

    /// Override how long coalesced requests wait for the in-flight fetch (0 = forever).
    #[arg(long = "cache-wait-timeout-ms", value_name = "MILLISECONDS")]
    pub cache_wait_timeout_ms: Option<u64>,
}
