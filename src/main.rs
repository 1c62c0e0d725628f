//! # RIoT Brick
//!
//! Gateway daemon that uploads queued tracker readings to the cloud.
//!
//! The outbox is filled by the relay through the library's ingestion path;
//! this binary only runs the connectivity-gated upload loop.

use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use riot_brick::config::{Config, LoggingConfig, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use riot_brick::outbox::{Outbox, SqliteOutbox};
use riot_brick::uplink::{
    CommandReset, CredentialRouter, HttpsUplink, TcpProber, Uploader, UploaderSettings,
};

/// File name prefix for daily rotated logs
const LOG_FILE_PREFIX: &str = "riot-brick.log";

/// Main entry point for the RIoT brick daemon
///
/// # Control Flow
///
/// 1. Load configuration from `BRICK_CONFIG` (or `config/brick.toml`)
/// 2. Set up logging; `RUST_LOG` overrides the configured level
/// 3. Load tracker credentials from the environment; any missing
///    setting stops the daemon here
/// 4. Open the outbox and run upload cycles until Ctrl+C
///
/// # Errors
///
/// Returns error if the configuration, the credentials or the outbox
/// cannot be loaded. Nothing that happens inside the upload loop stops
/// the daemon.
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.logging);
    info!("RIoT brick v{} starting...", env!("CARGO_PKG_VERSION"));

    let router = CredentialRouter::from_config(&config.uploader)
        .context("Failed to load tracker credentials")?;
    for credential in router.credentials() {
        info!("Routing {} ({}) to {}", credential.device_id, credential.name, credential.endpoint);
    }

    let outbox = SqliteOutbox::from_config(&config.database)
        .with_context(|| format!("Failed to open outbox at {}", config.database.path))?;
    info!(
        "Outbox opened at {} ({} readings pending)",
        outbox.path().display(),
        outbox.unprocessed_count()?
    );

    let reset = CommandReset::from_config(&config.uploader).context("Invalid network reset command")?;

    let mut uploader = Uploader::new(
        Arc::new(outbox),
        Arc::new(router),
        Arc::new(HttpsUplink::from_config(&config.uploader)),
        Arc::new(TcpProber),
        Arc::new(reset),
        UploaderSettings::from_config(&config.uploader),
    );

    info!("Press Ctrl+C to exit");
    uploader.run_until(shutdown_signal()).await;

    Ok(())
}

/// Resolves on Ctrl+C
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down..."),
        Err(e) => {
            error!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// Initialize tracing; the returned guard flushes the log file on drop
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.log_dir.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Some(guard)
}
