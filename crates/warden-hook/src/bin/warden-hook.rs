//! `warden-hook` - agent hook entry point.
//!
//! Wire it as the agent's `PreToolUse` and `Stop` hooks:
//!
//! ```text
//! warden-hook pre-tool-use
//! warden-hook stop
//! ```
//!
//! Logs go to a file; stdout carries only the decision.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use warden_config::{Config, LoadOptions};
use warden_hook::TerminalContext;
use warden_telemetry::{LogConfig, setup_logging};

/// Warden hook - gate agent tool calls through the Warden broker.
#[derive(Parser)]
#[command(name = "warden-hook")]
#[command(author, version, about = "Gate agent tool calls through the Warden broker")]
struct Cli {
    /// Extra configuration file layered over the user config.
    #[arg(short, long, env = "WARDEN_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decide on a tool call read from stdin.
    PreToolUse,
    /// Report that the session stopped.
    Stop,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let log_config = LogConfig::hook_file(config.logging.level.clone(), config.hook.log_file());
    // The hook has no other place to report this; stay silent.
    let _ = setup_logging(&log_config);

    if let Err(e) = run(cli.command, &config).await {
        tracing::warn!(error = %e, "hook failed; deferring to the agent");
    }
}

async fn run(command: Command, config: &Config) -> Result<()> {
    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("failed to read hook input")?;
    let terminal = TerminalContext::detect().await;

    match command {
        Command::PreToolUse => {
            if let Some(line) = warden_hook::pre_tool_use(config, &input, &terminal)
                .await
                .render()
            {
                tracing::info!(output = %line, "OUTPUT");
                println!("{line}");
            }
        },
        Command::Stop => warden_hook::stop(config, &input, &terminal).await,
    }
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Config {
    let mut options = LoadOptions::discover();
    if let Some(path) = path {
        options = options.with_config_file(path);
    }
    Config::load(&options).map(|l| l.config).unwrap_or_default()
}
