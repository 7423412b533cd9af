//! SwapVault server binary
//!
//! Entry point for the peer-to-peer trading service. Provides commands for
//! generating and validating configuration and for starting the engine with
//! its HTTP API and background expiry sweeper.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{generate_default_config, load_config, save_config, validate_config, SwapVaultConfig};
use inventory::InMemoryInventoryStore;
use listing::InMemoryListingStore;
use observability::{init_logging, init_metrics, LogFormat};
use tokio::sync::watch;
use tracing::{error, info, warn};
use trading::api::{create_router, TradingApiState};
use trading::{
    ExpirySweeper, InMemoryHistoryStore, InMemoryTradeStore, InMemoryUserDirectory, NoopNotifier,
    TradingEngine,
};

#[derive(Debug, Parser)]
#[command(name = "swapvault", about = "SwapVault peer-to-peer trading service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the trading service
    Start {
        /// Path to the configuration file
        #[arg(short, long, default_value = "swapvault.yaml")]
        config: PathBuf,
        /// Log output format (pretty, json, compact)
        #[arg(long, default_value = "pretty")]
        log_format: LogFormat,
    },
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(short, long, default_value = "swapvault.yaml")]
        config: PathBuf,
    },
    /// Write a default configuration file
    Init {
        /// Where to write the configuration
        #[arg(short, long, default_value = "swapvault.yaml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config, log_format } => start(config, log_format).await,
        Commands::Validate { config } => validate(config),
        Commands::Init { output } => init(output),
    }
}

fn resolve_config(path: &Path) -> Result<SwapVaultConfig> {
    if path.exists() {
        load_config(path)
    } else {
        warn!(?path, "Config file not found; using defaults");
        Ok(generate_default_config())
    }
}

fn validate(path: PathBuf) -> Result<()> {
    let config = load_config(&path)?;
    let report = validate_config(&config);

    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    for err in &report.errors {
        println!("error: {err}");
    }

    if report.is_valid() {
        println!("Configuration is valid");
        Ok(())
    } else {
        anyhow::bail!("configuration is invalid ({} errors)", report.errors.len())
    }
}

fn init(output: PathBuf) -> Result<()> {
    if output.exists() {
        anyhow::bail!("refusing to overwrite existing file: {:?}", output);
    }
    let config = generate_default_config();
    save_config(&config, &output)?;
    println!("Wrote default configuration to {:?}", output);
    Ok(())
}

async fn start(config_path: PathBuf, log_format: LogFormat) -> Result<()> {
    init_logging("swapvault", log_format)?;

    let config = resolve_config(&config_path)?;

    let report = validate_config(&config);
    for warning in &report.warnings {
        warn!("Configuration warning: {warning}");
    }
    if !report.is_valid() {
        for err in &report.errors {
            error!("Configuration error: {err}");
        }
        anyhow::bail!("configuration is invalid");
    }

    if config.service.metrics_port != 0 {
        if let Err(err) = init_metrics(config.service.metrics_port) {
            warn!(%err, "Metrics exporter failed to start; continuing without metrics");
        }
    }

    info!(
        service = %config.service.name,
        lock_window_secs = config.trading.lock_window_secs,
        sweep_interval_secs = config.trading.sweep_interval_secs,
        "SwapVault starting"
    );

    let engine = Arc::new(TradingEngine::new(
        Arc::new(InMemoryTradeStore::new()),
        Arc::new(InMemoryHistoryStore::new()),
        Arc::new(InMemoryInventoryStore::new()),
        Arc::new(InMemoryListingStore::new()),
        Arc::new(NoopNotifier::new()),
        Arc::new(InMemoryUserDirectory::new()),
        config.trading.clone(),
    ));

    // Background expiry sweeper with a shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = ExpirySweeper::new(
        Arc::clone(&engine),
        Duration::from_secs(config.trading.sweep_interval_secs),
    );
    let sweeper_handle = tokio::spawn(async move { sweeper.run(shutdown_rx).await });

    // HTTP API
    let router = create_router(TradingApiState { engine });
    let addr = format!("{}:{}", config.service.host, config.service.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, "HTTP API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(%err, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        })
        .await
        .context("server error")?;

    // Stop the sweeper and wait for it to wind down
    let _ = shutdown_tx.send(true);
    if let Err(err) = sweeper_handle.await {
        warn!(%err, "Sweeper task ended abnormally");
    }

    info!("SwapVault stopped");
    Ok(())
}
