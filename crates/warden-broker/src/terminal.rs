//! Typing replies back into a live terminal.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{BrokerError, BrokerResult};

/// How long a single tmux call may take.
const TMUX_TIMEOUT: Duration = Duration::from_secs(5);

/// A target that can receive typed text.
#[async_trait]
pub trait TerminalInjector: Send + Sync {
    /// Whether the pane still exists.
    async fn is_alive(&self, pane: &str) -> bool;

    /// Type `text` into the pane and press Enter.
    async fn inject(&self, pane: &str, text: &str) -> BrokerResult<()>;
}

/// [`TerminalInjector`] backed by the `tmux` binary.
#[derive(Debug, Clone)]
pub struct TmuxInjector {
    program: String,
}

impl Default for TmuxInjector {
    fn default() -> Self {
        Self {
            program: "tmux".to_owned(),
        }
    }
}

impl TmuxInjector {
    /// Use the `tmux` found on `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific tmux binary.
    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> BrokerResult<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let output = match timeout(TMUX_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(BrokerError::Terminal(format!("failed to run tmux: {e}"))),
            Err(_) => return Err(BrokerError::Terminal("tmux timed out".to_owned())),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            return Err(BrokerError::Terminal(stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }
}

#[async_trait]
impl TerminalInjector for TmuxInjector {
    async fn is_alive(&self, pane: &str) -> bool {
        match self
            .run(&["display-message", "-p", "-t", pane, "#{pane_id}"])
            .await
        {
            Ok(id) => !id.is_empty(),
            Err(e) => {
                debug!(pane, error = %e, "pane is not alive");
                false
            },
        }
    }

    async fn inject(&self, pane: &str, text: &str) -> BrokerResult<()> {
        // `-l` sends the text literally so words like "Enter" are not keys.
        self.run(&["send-keys", "-t", pane, "-l", text]).await?;
        self.run(&["send-keys", "-t", pane, "Enter"])
            .await
            .inspect_err(|e| warn!(pane, error = %e, "failed to press Enter"))?;
        debug!(pane, chars = text.chars().count(), "injected text");
        Ok(())
    }
}
