//! Warden Hook - the agent-side half of Warden.
//!
//! Invoked by the agent before each tool call (`pre-tool-use`) and when a
//! session stops (`stop`). Reads the hook envelope from stdin and prints
//! nothing, `{"decision":"allow"}` or `{"decision":"deny","reason":..}`.
//! It never fails past its boundary: every error means "print nothing" so
//! the agent falls back to its own prompting.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod client;
pub mod error;
pub mod gate;
pub mod terminal;

use serde::de::DeserializeOwned;
use tracing::warn;
use warden_config::Config;
use warden_core::{ApproveRequest, StopNotice};

pub use client::{BrokerClient, STOP_TIMEOUT};
pub use error::{HookError, HookResult};
pub use gate::{Gate, HookOutput, notify_stop};
pub use terminal::TerminalContext;

/// Parse a hook envelope. Blank input yields `None`.
///
/// # Errors
///
/// Returns [`HookError::Input`] for malformed JSON.
pub fn parse_envelope<T: DeserializeOwned>(input: &str) -> HookResult<Option<T>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(input)?))
}

/// Handle a `pre-tool-use` invocation end to end.
pub async fn pre_tool_use(config: &Config, input: &str, terminal: &TerminalContext) -> HookOutput {
    let request = match parse_envelope::<ApproveRequest>(input) {
        Ok(Some(request)) => request,
        Ok(None) => return HookOutput::Defer,
        Err(e) => {
            warn!(error = %e, "PARSE_ERROR");
            return HookOutput::Defer;
        },
    };
    match Gate::from_config(config) {
        Ok(gate) => gate.pre_tool_use(request, terminal).await,
        Err(e) => {
            warn!(error = %e, "gate unavailable");
            HookOutput::Defer
        },
    }
}

/// Handle a `stop` invocation end to end.
pub async fn stop(config: &Config, input: &str, terminal: &TerminalContext) {
    let notice = match parse_envelope::<StopNotice>(input) {
        Ok(notice) => notice.unwrap_or_default(),
        Err(e) => {
            warn!(error = %e, "PARSE_ERROR");
            return;
        },
    };
    match BrokerClient::new(
        config.hook.server_url(&config.server),
        config.approval.client_timeout(),
    ) {
        Ok(client) => notify_stop(&client, notice, terminal).await,
        Err(e) => warn!(error = %e, "client unavailable"),
    }
}
