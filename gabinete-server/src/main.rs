//! gabinete-server: submission gallery, SPARK checkpoints and rubric scoring
//!
//! Settings resolve as CLI > environment > config file > default.

use anyhow::{Context, Result};
use clap::Parser;
use gabinete_common::config::{
    resolve_admin_key, KeySource, RootFolderInitializer, RootFolderResolver, TomlConfig, DEFAULT_BIND,
};
use gabinete_server::{build_router, AppState};
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "gabinete-server")]
#[command(about = "Gabinete submission and SPARK checkpoint service", long_about = None)]
#[command(version)]
struct Args {
    /// Data root holding gabinete.db and uploads/
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Shared key for the teacher panel routes
    #[arg(long)]
    admin_key: Option<String>,

    /// Listen address
    #[arg(short, long, env = "GABINETE_BIND")]
    bind: Option<String>,

    /// Config file (defaults to ~/.config/gabinete/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting gabinete-server v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let toml = TomlConfig::load_or_default(args.config.as_deref());

    let root_folder = RootFolderResolver::new(args.root_folder.clone(), toml.clone()).resolve();
    let initializer = RootFolderInitializer::new(root_folder.clone());
    initializer
        .ensure_directory_exists()
        .with_context(|| format!("Failed to create data root {}", root_folder.display()))?;
    info!("Data root: {}", root_folder.display());

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());
    let pool = gabinete_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;
    info!("✓ Database ready");

    let (admin_key, source) = resolve_admin_key(args.admin_key.as_deref(), &toml);
    match source {
        KeySource::Default => warn!("Admin key not configured; using the built-in demo key"),
        other => info!("Admin key loaded from {:?}", other),
    }

    let bind = args
        .bind
        .or(toml.bind)
        .unwrap_or_else(|| DEFAULT_BIND.to_string());

    let state = AppState::new(pool.clone(), root_folder, admin_key);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;
    info!("gabinete-server listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
