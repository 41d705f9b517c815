//! Which terminal, if any, the agent runs in.
//!
//! Replies typed in Discord can only reach the agent through tmux, so
//! questions are forwarded only from inside a tmux session.

use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

const PANE_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// The agent's terminal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminalContext {
    /// Running inside tmux.
    pub inside_tmux: bool,
    /// Pane id, e.g. `%3`.
    pub pane: Option<String>,
}

impl TerminalContext {
    /// Outside any multiplexer.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Build from the values of `TMUX` and `TMUX_PANE`.
    #[must_use]
    pub fn from_vars(tmux: Option<&str>, pane: Option<&str>) -> Self {
        let inside_tmux = tmux.is_some_and(|v| !v.trim().is_empty());
        let pane = pane
            .map(str::trim)
            .filter(|p| inside_tmux && !p.is_empty())
            .map(str::to_owned);
        Self { inside_tmux, pane }
    }

    /// Inspect the environment, asking tmux for the pane when the
    /// variable is missing.
    pub async fn detect() -> Self {
        let tmux = std::env::var("TMUX").ok();
        let pane = std::env::var("TMUX_PANE").ok();
        let mut ctx = Self::from_vars(tmux.as_deref(), pane.as_deref());
        if ctx.inside_tmux && ctx.pane.is_none() {
            ctx.pane = query_pane("tmux").await;
        }
        ctx
    }
}

/// `tmux display-message -p '#{pane_id}'`, or `None` on any failure.
pub async fn query_pane(program: &str) -> Option<String> {
    let output = Command::new(program)
        .args(["display-message", "-p", "#{pane_id}"])
        .kill_on_drop(true)
        .output();
    let output = match tokio::time::timeout(PANE_QUERY_TIMEOUT, output).await {
        Ok(Ok(out)) if out.status.success() => out,
        Ok(Ok(out)) => {
            debug!(status = %out.status, "tmux pane query failed");
            return None;
        },
        Ok(Err(e)) => {
            debug!(error = %e, "tmux not available");
            return None;
        },
        Err(_) => {
            debug!("tmux pane query timed out");
            return None;
        },
    };
    let pane = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    (!pane.is_empty()).then_some(pane)
}
