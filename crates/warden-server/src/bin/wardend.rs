//! `wardend` - the Warden approval broker.
//!
//! Listens on loopback for hook requests, posts approval prompts to Discord
//! and returns the human's decision. Runs until Ctrl+C.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use warden_config::{Config, LoadOptions};
use warden_telemetry::{LogConfig, LogFormat, setup_logging};

/// Warden broker - human approval for agent tool calls over Discord.
#[derive(Parser)]
#[command(name = "wardend")]
#[command(author, version, about = "Warden broker - human approval for agent tool calls")]
struct Args {
    /// Extra configuration file layered over the user config.
    #[arg(short, long, env = "WARDEN_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,

    /// Log format: pretty, compact or json.
    #[arg(long)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut options = LoadOptions::discover();
    if let Some(path) = &args.config {
        options = options.with_config_file(path);
    }
    let loaded = Config::load(&options).context("failed to load configuration")?;
    let config = loaded.config;

    let level = if args.verbose {
        "debug".to_owned()
    } else {
        config.logging.level.clone()
    };
    let (format, bad_format) = match args.log_format {
        Some(format) => (format, None),
        None => match config.logging.format.parse::<LogFormat>() {
            Ok(format) => (format, None),
            Err(e) => (LogFormat::default(), Some(e)),
        },
    };
    if let Err(e) = setup_logging(&LogConfig::new(level).with_format(format)) {
        eprintln!("Failed to initialize logging: {e}");
    }
    if let Some(e) = bad_format {
        tracing::warn!(error = %e, "falling back to pretty logs");
    }
    for file in &loaded.loaded_files {
        tracing::debug!(path = %file, "loaded config file");
    }

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    warden_server::run(config, shutdown)
        .await
        .context("broker stopped with an error")
}
