//! sharecryptd: ShareCrypt key service
//!
//! Usage:
//!   sharecryptd [--config /etc/sharecrypt/config.toml] [--listen 127.0.0.1:8787]
//!
//! Holds the master key and wraps/unwraps per-file keys for callers. Never
//! sees file contents.

mod api;
mod daemon;
mod metrics;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sharecrypt_core::config::{DaemonConfig, ShareCryptConfig};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "sharecryptd", version, about = "ShareCrypt key service")]
struct Cli {
    /// Path to sharecrypt.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "SHARECRYPT_CONFIG",
        default_value = "/etc/sharecrypt/config.toml"
    )]
    config: PathBuf,

    /// Listen address (overrides daemon.listen)
    #[arg(long, env = "SHARECRYPT_LISTEN")]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error; overrides daemon.log_level)
    #[arg(long, env = "SHARECRYPT_LOG")]
    log: Option<String>,

    /// Log format (json, text; overrides daemon.log_format)
    #[arg(long, env = "SHARECRYPT_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // [daemon] supplies the log settings, so the file is read before logging starts
    let loaded = load_config(&cli.config).await?;
    let found = loaded.is_some();
    let mut config = loaded.unwrap_or_default();

    let (level, format) = resolve_log_settings(&cli, &config.daemon)?;
    init_logging(&level, &format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "sharecryptd starting"
    );
    if !found {
        warn!(
            config = %cli.config.display(),
            "config file not found, using defaults"
        );
    }

    if let Some(listen) = cli.listen {
        config.daemon.listen = listen;
    }

    daemon::run(config).await
}

/// `None` when the file does not exist.
async fn load_config(path: &Path) -> Result<Option<ShareCryptConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = toml::from_str(&content)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(Some(config))
}

/// Flags and env win; `[daemon]` in the config file fills in the rest.
fn resolve_log_settings(cli: &Cli, daemon: &DaemonConfig) -> Result<(String, LogFormat)> {
    let level = match &cli.log {
        Some(level) => level.clone(),
        None => daemon.log_level.clone(),
    };
    let format = match &cli.log_format {
        Some(format) => format.clone(),
        None => LogFormat::from_str(&daemon.log_format, true)
            .map_err(|e| anyhow::anyhow!("daemon.log_format: {e}"))?,
    };
    Ok((level, format))
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}
