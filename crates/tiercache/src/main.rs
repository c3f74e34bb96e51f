//! Tiercache - Tiered caching proxy with usage-driven prefetch

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{Config, LogFormat, LoggingConfig, StorageBackendKind};
use tiercache_api::{AppState, create_router};
use tiercache_core::{CacheEngine, SharedFavorability, spawn_maintenance_task};
use tiercache_proxy::{HttpFetcher, HttpFetcherConfig};
use tiercache_storage::{BlobStore, MemoryBlobStore, SqliteBlobStore};

/// Tiercache - Tiered caching proxy
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "TIERCACHE_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "TIERCACHE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    init_logging(&config.logging);

    info!("Starting Tiercache v{}", env!("CARGO_PKG_VERSION"));

    let engine_config = config.engine_config()?;

    // Initialize blob store
    let blobs: Arc<dyn BlobStore> = match config.storage.backend {
        StorageBackendKind::Sqlite => Arc::new(
            SqliteBlobStore::connect(&config.storage.path)
                .await
                .with_context(|| format!("Failed to open blob store at {}", config.storage.path))?,
        ),
        StorageBackendKind::Memory => {
            warn!("Using in-memory blob store, cached entries will not survive restarts");
            Arc::new(MemoryBlobStore::new())
        }
    };

    // Initialize upstream fetcher
    let mut fetcher_config = HttpFetcherConfig {
        timeout: std::time::Duration::from_secs(config.upstream.timeout_secs),
        skip_tls_verify: config.upstream.skip_tls_verify,
        ..HttpFetcherConfig::default()
    };
    if let Some(user_agent) = &config.upstream.user_agent {
        fetcher_config.user_agent = user_agent.clone();
    }
    let fetcher = Arc::new(HttpFetcher::new(fetcher_config)?);

    // Initialize cache engine
    let favorability = SharedFavorability::new(config.favorability.initial);
    let engine = CacheEngine::new(
        engine_config,
        blobs,
        fetcher,
        Arc::new(favorability.clone()),
    )
    .await
    .context("Failed to initialize cache engine")?;

    let maintenance = spawn_maintenance_task(engine.clone(), config.maintenance_interval());

    // Install Prometheus recorder
    let metrics_handle = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(Arc::new(handle)),
        Err(e) => {
            warn!("Failed to install metrics recorder: {}", e);
            None
        }
    };

    let state = AppState::new(engine.clone(), favorability);
    let app = create_router(state, metrics_handle).layer(TraceLayer::new_for_http());

    // Determine bind address
    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port).parse()?;

    info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    maintenance.abort();
    engine.flush_background().await;
    match engine.save_patterns().await {
        Ok(count) => info!("Saved usage patterns for {} keys", count),
        Err(e) => warn!("Failed to save usage patterns on shutdown: {}", e),
    }

    info!("Server stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install CTRL+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
