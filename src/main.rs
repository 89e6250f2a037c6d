//! imgvault server
//!
//! Main entry point: initialize, ingest the origin tree, then serve.

use imgvault::{
    config::{ServerConfig, CONFIG_FILE},
    index::ImageIndex,
    ingest,
    rate_limit::RateLimiter,
    state::AppState,
    web_api,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sweep interval for idle rate-limiter entries
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing: stdout plus the process log file. The guard must
    // outlive main or the file writer thread stops.
    let file_appender = tracing_appender::rolling::never(".", "imgvault.log");
    let (log_file, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "imgvault=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(log_file)
                .with_ansi(false),
        )
        .init();

    tracing::info!("Starting imgvault v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration, writing the default file on first run
    let config = ServerConfig::load_or_init(Path::new(CONFIG_FILE))?;
    tracing::info!(
        database_name = %config.database_name.display(),
        listen_port = config.listen_port,
        origin = %config.image_path_origin.display(),
        processed = %config.image_path_processed.display(),
        quality = config.compress_image_quality,
        strict_https = config.strict_https,
        rate_limit = config.rate_limit,
        time_window = config.time_window,
        "Configuration loaded"
    );

    // Pre-flight: working directories, index schema, then the listening
    // socket. All three abort startup on failure; binding before ingestion
    // keeps a doomed run from consuming the origin tree first.
    tokio::fs::create_dir_all(&config.image_path_origin).await?;
    tokio::fs::create_dir_all(&config.image_path_processed).await?;
    tracing::info!("Working directories ready");

    let index = ImageIndex::new(&config.database_name, config.database_cache);
    index.ensure_schema().await?;
    tracing::info!("Alias index ready");

    let addr = format!("{}:{}", config.server_host, config.listen_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Listener bound");

    // Ingest phase: runs to completion before any request is accepted
    let report = ingest::run(
        &config.image_path_origin,
        &config.image_path_processed,
        &index,
        config.compress_image_quality,
        config.image_format,
    )
    .await?;
    tracing::info!(
        ingested = report.ingested,
        skipped = report.skipped,
        duplicates = report.duplicates,
        failed = report.failed,
        "Ingestion phase finished"
    );

    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit,
        Duration::from_secs(config.time_window),
    ));

    // Reclaim window entries for clients that went quiet
    let sweeper = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sweeper.sweep_idle(Instant::now());
        }
    });

    let state = AppState {
        config: Arc::new(config),
        index,
        rate_limiter,
    };

    let app = web_api::create_router(state).layer(TraceLayer::new_for_http());

    tracing::info!("Serve phase started");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
