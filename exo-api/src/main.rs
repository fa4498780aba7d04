//! exo-api - Exoplanet candidate service
//!
//! Loads model artifacts once, wires the upstream catalogue client into the
//! dataset cache, and serves the HTTP API until Ctrl+C or SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use exo_common::config::{ConfigOverrides, ConfigResolver};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use exo_api::cache::DatasetCache;
use exo_api::model::InferenceEngine;
use exo_api::pipeline::CandidateEnrichmentPipeline;
use exo_api::upstream::HttpCandidateSource;
use exo_api::{build_router, AppState};

/// Command-line arguments for exo-api
#[derive(Parser, Debug)]
#[command(name = "exo-api")]
#[command(about = "Exoplanet candidate coordinate and classification service")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding the model artifacts
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Upstream catalogue URL
    #[arg(short, long)]
    upstream_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ConfigResolver::new(ConfigOverrides {
        config_path: args.config,
        port: args.port,
        model_dir: args.model_dir,
        upstream_url: args.upstream_url,
    })
    .resolve()
    .context("Failed to resolve configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("exo_api={0},exo_common={0},tower_http=info", config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting exo-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Model directory: {}", config.model_dir.display());
    info!("Upstream: {}", config.upstream_url);

    let engine = InferenceEngine::load(&config.model_dir);

    let source = HttpCandidateSource::new(config.upstream_url.clone(), config.upstream_timeout)
        .context("Failed to build upstream client")?;
    let cache = DatasetCache::new(Arc::new(source), config.upstream_timeout);
    let pipeline = CandidateEnrichmentPipeline::new(Arc::new(cache), Arc::new(engine));

    let app = build_router(AppState::new(Arc::new(pipeline)));

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind_address, config.port))?;

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return Err(e.into());
        }
    };
    info!("exo-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
