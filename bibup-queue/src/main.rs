//! bibup-queue - Metadata update queue service
//!
//! Queues bibliographic items for metadata lookup, exposes the field-level
//! review state over HTTP + SSE and commits accepted changes to the SQLite
//! item store.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bibup_common::events::EventBus;
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bibup_queue::config::{resolve_database_path, resolve_port, QueueConfig};
use bibup_queue::db::{init_database_pool, SqliteRecordStore};
use bibup_queue::schema::{ItemSchema, TableSchema};
use bibup_queue::services::{
    spawn_reachability_probe, Collaborators, HttpMetadataSource, OnlineFlag, TracingDiagnostics,
};
use bibup_queue::{AppState, MetadataUpdater};

const MODULE_NAME: &str = "bibup-queue";

/// Command-line arguments for bibup-queue
#[derive(Parser, Debug)]
#[command(name = "bibup-queue")]
#[command(about = "Metadata update queue and review service")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite item database
    #[arg(short, long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = bibup_common::config::load_config(args.config.as_deref(), MODULE_NAME)
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting bibup-queue (metadata update queue)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let port = resolve_port(args.port, &toml_config);
    let db_path = resolve_database_path(args.database, &toml_config);
    info!("Database: {}", db_path.display());

    let db_pool = init_database_pool(&db_path)
        .await
        .context("Failed to open item database")?;
    let mut record_store = SqliteRecordStore::new(db_pool);
    if let Some(max_wait) = toml_config.database.max_lock_wait_ms {
        record_store = record_store.with_max_lock_wait(max_wait);
    }
    info!("Database connection established");

    let (ready_tx, ready_rx) = watch::channel(false);

    let schema: Arc<dyn ItemSchema> = match &toml_config.queue.schema_path {
        Some(path) => Arc::new(
            TableSchema::from_file(path)
                .with_context(|| format!("Failed to load item schema {}", path.display()))?,
        ),
        None => Arc::new(TableSchema::builtin()),
    };

    let source = Arc::new(
        HttpMetadataSource::new(&toml_config.metadata)
            .context("Failed to build metadata client")?,
    );
    info!("Metadata lookup: {}", source.lookup_url());

    let online_flag = OnlineFlag::default();
    match toml_config.metadata.probe_interval_secs {
        0 => info!("Connectivity probe disabled; set state via POST /connectivity"),
        secs => {
            spawn_reachability_probe(
                online_flag.clone(),
                Arc::clone(&source),
                Duration::from_secs(secs),
            );
        }
    }

    let collaborators = Collaborators {
        records: Arc::new(record_store),
        source,
        connectivity: Arc::new(online_flag.clone()),
        schema,
        diagnostics: Arc::new(TracingDiagnostics),
    };

    let event_bus = EventBus::new(toml_config.queue.event_capacity);
    let updater = Arc::new(MetadataUpdater::new(
        event_bus,
        collaborators,
        ready_rx,
        QueueConfig::from(&toml_config.queue),
    ));

    // Schema and storage are loaded; lookups may start
    ready_tx.send_replace(true);

    let app = bibup_queue::build_router(AppState::new(updater).with_online_flag(online_flag));

    let host: std::net::IpAddr = toml_config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid server host: {}", toml_config.server.host))?;
    let addr = SocketAddr::new(host, port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install signal handler: {}", e);
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
