//! tunegraph-rec - Recommendation service entry point
//!
//! Startup order: config, both stores (with retry), graph constraints, refresh
//! coordinator, periodic resync, HTTP server.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tunegraph_common::config::{ConfigOverrides, ServiceConfig};
use tunegraph_common::db::{connect_readonly, connect_with_retry, open_database};
use tunegraph_rec::graph::{GraphStore, SqliteGraphStore};
use tunegraph_rec::recommend::RecommendationEngine;
use tunegraph_rec::source::SqliteSourceRepository;
use tunegraph_rec::sync::{GraphSyncEngine, PeriodicResync, RefreshCoordinator};
use tunegraph_rec::{build_router, AppState};

/// Command-line arguments for tunegraph-rec
#[derive(Parser, Debug)]
#[command(name = "tunegraph-rec")]
#[command(about = "Graph-derived recommendation service")]
#[command(version)]
struct Args {
    /// TOML config file (default: ~/.config/tunegraph/config.toml)
    #[arg(short, long, env = "TUNEGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "TUNEGRAPH_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "TUNEGRAPH_PORT")]
    port: Option<u16>,

    /// Source-of-truth catalog database (opened read-only)
    #[arg(long, env = "TUNEGRAPH_SOURCE_DB")]
    source_db: Option<PathBuf>,

    /// Graph database (created if missing)
    #[arg(long, env = "TUNEGRAPH_GRAPH_DB")]
    graph_db: Option<PathBuf>,

    /// Shared key required on /api/internal routes
    #[arg(long, env = "TUNEGRAPH_SERVICE_API_KEY", hide_env_values = true)]
    service_api_key: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            bind_host: self.host.clone(),
            port: self.port,
            source_db: self.source_db.clone(),
            graph_db: self.graph_db.clone(),
            service_api_key: self.service_api_key.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // --help and --version exit here, before any log output
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tunegraph_rec=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any store delays
    info!(
        "Starting tunegraph-rec v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let mut config = ServiceConfig::load(args.config.as_deref()).context("Failed to load config")?;
    config.apply_overrides(args.overrides());
    config.validate().context("Invalid configuration")?;

    info!("Source database: {}", config.source_db.display());
    info!("Graph database: {}", config.graph_db.display());
    if config.service_api_key.is_none() {
        warn!("No service API key configured; internal routes are unauthenticated");
    }

    let source_pool = connect_with_retry("source store", &config.connect, || {
        connect_readonly(&config.source_db)
    })
    .await
    .context("Failed to connect to source store")?;

    let graph_pool = connect_with_retry("graph store", &config.connect, || {
        open_database(&config.graph_db)
    })
    .await
    .context("Failed to open graph store")?;

    let source = Arc::new(SqliteSourceRepository::new(source_pool));
    let graph = Arc::new(SqliteGraphStore::new(graph_pool));

    // Queries depend on the schema existing even before the first sync lands
    graph
        .ensure_constraints()
        .await
        .context("Failed to create graph constraints")?;

    let engine = GraphSyncEngine::new(source.clone(), graph.clone(), config.sync.phase_timeout());
    let coordinator = RefreshCoordinator::new(Arc::new(engine));

    if config.sync.sync_on_startup {
        coordinator.trigger();
    }

    let periodic = config
        .sync
        .resync_interval()
        .map(|period| PeriodicResync::new(coordinator.clone(), period).spawn());

    let recommendations = RecommendationEngine::new(graph.clone(), config.recommendations.clone());
    let state = AppState::new(
        source,
        graph,
        coordinator,
        recommendations,
        config.service_api_key.clone(),
    );
    let app = build_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("tunegraph-rec listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(handle) = periodic {
        handle.abort();
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
