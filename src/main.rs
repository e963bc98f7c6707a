use std::{process, sync::Arc};

use axum::http::HeaderValue;
use rangecache::{
    application::{error::AppError, ranges::RangeService},
    cache::{CacheConfig, CacheServer, FetchError, RangeProbe, ResourceInfo},
    config,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        upstream::HttpRangeFetcher,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;
use url::Url;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Probe(_) => run_probe(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let resource = upstream_url(&settings)?;
    let fetcher = Arc::new(HttpRangeFetcher::new(settings.upstream.request_timeout)?);

    let info = probe_upstream(fetcher.as_ref(), &resource).await?;
    if !info.supports_ranges {
        return Err(InfraError::Upstream(FetchError::RangeUnsupported).into());
    }

    let cache_config = CacheConfig::from(&settings.cache);
    info!(
        target = "rangecache::serve",
        resource = %resource,
        total_length = info.total_length,
        byte_limit = cache_config.byte_limit.get(),
        dedup = cache_config.dedup,
        "upstream supports byte ranges"
    );

    let cache = Arc::new(CacheServer::new(cache_config, resource, fetcher));
    let ranges = RangeService::new(cache, info, settings.upstream.default_span.get());
    let content_type = HeaderValue::from_str(&settings.upstream.content_type).map_err(|err| {
        AppError::from(InfraError::configuration(format!(
            "invalid upstream content type: {err}"
        )))
    })?;

    let state = HttpState {
        ranges: Arc::new(ranges),
        content_type,
    };

    serve_http(&settings, state).await
}

async fn run_probe(settings: config::Settings) -> Result<(), AppError> {
    let resource = upstream_url(&settings)?;
    let fetcher = HttpRangeFetcher::new(settings.upstream.request_timeout)?;
    let info = probe_upstream(&fetcher, &resource).await?;

    let rendered = serde_json::to_string_pretty(&info)
        .map_err(|err| AppError::unexpected(format!("failed to render probe result: {err}")))?;
    println!("{rendered}");
    Ok(())
}

fn upstream_url(settings: &config::Settings) -> Result<Url, AppError> {
    settings.upstream.url.clone().ok_or_else(|| {
        AppError::from(InfraError::configuration(
            "upstream.url is required (use --upstream-url or RANGECACHE_UPSTREAM__URL)",
        ))
    })
}

async fn probe_upstream(probe: &dyn RangeProbe, resource: &Url) -> Result<ResourceInfo, AppError> {
    probe
        .probe(resource)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "rangecache::serve",
        addr = %settings.server.addr,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
