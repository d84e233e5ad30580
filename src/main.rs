//! monorepo-api: health endpoint with request logging.
//!
//! This is the application entry point. It loads configuration from TOML,
//! initializes tracing, spawns the Elasticsearch shipping task when configured,
//! sets up the Axum router and starts the HTTP server. On shutdown it waits
//! briefly for queued log records to be shipped.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use monorepo_api::config::{AppConfig, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER, LOG_DRAIN_TIMEOUT_SECS};
use monorepo_api::health::AppHealthService;
use monorepo_api::http::start_server;
use monorepo_api::logging::{
    init_tracing, ConsoleSink, ElasticsearchSink, LogLevel, LogSinks, LoggerFactory,
};
use monorepo_api::{create_router, AppState};

/// monorepo-api: health endpoint with request logging
#[derive(Parser, Debug)]
#[command(name = "monorepo-api", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Console log filter (e.g., "monorepo_api=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,

    /// Minimum level for request logs (trace, info, warn, error, fatal)
    #[arg(short, long)]
    request_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let mut config = AppConfig::load(&args.config)?;
    if let Some(level) = args.request_level {
        config.logging.level = level;
    }

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    init_tracing(&log_filter, config.logging.is_json());

    tracing::info!(
        application = %config.application.name(),
        level = %config.logging.level,
        timezone = %config.logging.timezone,
        "Loaded configuration"
    );

    // Build log sinks
    let mut sinks = LogSinks::new().with(Arc::new(ConsoleSink));
    let mut shipper = None;
    if let Some(es) = &config.logging.elasticsearch {
        let (sink, handle) = ElasticsearchSink::spawn(es)?;
        sinks = sinks.with(Arc::new(sink.clone()));
        shipper = Some((sink, handle));
    } else {
        tracing::info!("Elasticsearch not configured, logging to console only");
    }

    let clock = config.logging.clock()?;
    let loggers = LoggerFactory::new(sinks, clock).with_application(config.application.name());
    let health = Arc::new(AppHealthService::new(config.application.name()));

    // Create application state and router
    let state = AppState::new(config.clone(), health, loggers);
    let app = create_router(state);

    start_server(app, &config).await?;

    // The router and every logger are gone; the shipper flushes and exits
    if let Some((sink, handle)) = shipper {
        tracing::info!(pending = sink.queued(), "Draining log queue");
        drop(sink);
        match tokio::time::timeout(Duration::from_secs(LOG_DRAIN_TIMEOUT_SECS), handle).await {
            Ok(Ok(())) => tracing::info!("Log queue drained"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Log shipping task failed"),
            Err(_) => tracing::warn!(
                timeout_secs = LOG_DRAIN_TIMEOUT_SECS,
                "Timed out draining log queue, remaining records dropped"
            ),
        }
    }

    Ok(())
}
