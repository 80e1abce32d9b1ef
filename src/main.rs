//! Fillwatch Binary Entry Point
//!
//! Runs scheduled collection windows, a single window, or lists stored records.
//! Core functionality is provided by the `fillwatch` library crate.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use fillwatch::{
    AppConfig, CollectorRegistry, FileStore, RecordStore, WebSocketTransport, WindowedCollector,
    collector::run_cycle,
    config::parse_duration,
    storage::{key_prefix, latest_record, load_record},
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Fillwatch - windowed occupancy collector
#[derive(Parser, Debug)]
#[command(name = "fillwatch", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        default_value = "configs/config.yaml",
        env = "FILLWATCH_CONFIG"
    )]
    config: String,

    /// WebSocket endpoint (overrides config file)
    #[arg(long, global = true, env = "FILLWATCH_ENDPOINT")]
    endpoint: Option<String>,

    /// Tracked site identifier (overrides config file)
    #[arg(long, global = true, env = "FILLWATCH_TARGET_UID")]
    target_uid: Option<String>,

    /// Window length, e.g. `5m` (overrides config file)
    #[arg(long, global = true, value_parser = parse_duration)]
    window: Option<Duration>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run windows on the configured schedule until interrupted (default)
    Run,
    /// Run a single window now and store its record
    Once,
    /// List stored record keys
    List {
        /// Key prefix (defaults to the configured prefix)
        #[arg(long)]
        prefix: Option<String>,
        /// Print the most recent record instead of all keys
        #[arg(long)]
        latest: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fillwatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // wss:// needs a process-wide rustls provider; a second install is harmless
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();

    tracing::info!("Loading configuration from: {}", cli.config);
    let mut config = AppConfig::load(&cli.config)?;

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(endpoint) = cli.endpoint {
        config.listener.endpoint = endpoint;
    }
    if let Some(target_uid) = cli.target_uid {
        config.listener.target_uid = target_uid;
    }
    if let Some(window) = cli.window {
        config.listener.window = window;
    }
    config.validate()?;

    let store = Arc::new(FileStore::new(&config.storage.root));

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_scheduled(config, store).await?,
        Command::Once => run_once(config, store.as_ref()).await?,
        Command::List { prefix, latest } => {
            let prefix = prefix.unwrap_or_else(|| key_prefix(&config.storage.prefix));
            list_records(store.as_ref(), &prefix, latest).await?;
        }
    }

    Ok(())
}

/// Register the collector and run until a shutdown signal arrives.
async fn run_scheduled(
    config: AppConfig,
    store: Arc<FileStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let schedule = config.schedule.to_schedule()?;
    tracing::info!(
        endpoint = %config.listener.endpoint,
        site = %config.listener.target_uid,
        window = ?config.listener.window,
        schedule = %schedule,
        store = %store.root().display(),
        "Starting scheduled collection"
    );

    let registry = CollectorRegistry::new(store, config.storage.prefix.clone()).await?;
    let collector = WindowedCollector::new(config.listener, WebSocketTransport::new());
    registry.spawn(collector, schedule).await?;
    registry.start().await?;

    tracing::info!("Press Ctrl+C to shutdown");
    shutdown_signal().await;

    tracing::info!("Shutting down collectors...");
    if let Err(e) = registry.shutdown().await {
        tracing::error!("Failed to shutdown collectors: {}", e);
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Run one window, stopping early on Ctrl+C.
async fn run_once(config: AppConfig, store: &FileStore) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    let collector = WindowedCollector::new(config.listener, WebSocketTransport::new());
    let outcome = run_cycle(&collector, store, &config.storage.prefix, &cancel).await;
    watcher.abort();

    match outcome? {
        Some(key) => {
            println!("{key}");
            if let Some(record) = load_record(store, &key).await? {
                println!("{}", serde_json::to_string_pretty(&record.statistics)?);
            }
        }
        None => println!("no readings collected"),
    }
    Ok(())
}

async fn list_records(
    store: &dyn RecordStore,
    prefix: &str,
    latest: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if latest {
        match latest_record(store, prefix).await? {
            Some((key, record)) => {
                println!("{key}");
                println!("{}", serde_json::to_string_pretty(&record)?);
            }
            None => println!("no records under '{prefix}'"),
        }
        return Ok(());
    }

    let keys = store.list(prefix).await?;
    tracing::debug!(prefix = %prefix, count = keys.len(), "Listed records");
    for key in keys {
        println!("{key}");
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
