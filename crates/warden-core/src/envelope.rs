//! Wire envelopes exchanged between the hook and the broker service.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ids::{RequestId, SessionId};
use crate::invocation::ToolInvocation;

/// Body of `POST /approve`, and the envelope the hook reads from stdin.
///
/// Every field is optional on the wire. The broker rejects a missing or
/// empty `request_id`; everything else degrades to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApproveRequest {
    /// Caller-supplied correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Agent tool name.
    #[serde(default)]
    pub tool_name: String,
    /// Agent tool input.
    #[serde(default)]
    pub tool_input: serde_json::Value,
    /// Agent session id.
    #[serde(default)]
    pub session_id: String,
    /// Path to the session transcript.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<PathBuf>,
    /// Working directory of the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Terminal pane to type replies into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmux_pane: Option<String>,
}

impl ApproveRequest {
    /// The correlation id, if present and non-empty.
    #[must_use]
    pub fn request_id(&self) -> Option<RequestId> {
        self.request_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(RequestId::from)
    }

    /// The session id.
    #[must_use]
    pub fn session(&self) -> SessionId {
        SessionId::from(self.session_id.as_str())
    }

    /// The typed invocation.
    #[must_use]
    pub fn invocation(&self) -> ToolInvocation {
        ToolInvocation::from_wire(&self.tool_name, &self.tool_input)
    }

    /// The terminal pane, ignoring empty strings.
    #[must_use]
    pub fn pane(&self) -> Option<&str> {
        non_empty(self.tmux_pane.as_deref())
    }
}

/// Body of `POST /notify-stop`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopNotice {
    /// Agent session id.
    #[serde(default)]
    pub session_id: String,
    /// Path to the session transcript.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<PathBuf>,
    /// Working directory of the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Why the session stopped.
    #[serde(default)]
    pub stop_reason: String,
    /// Terminal pane that is still interactive, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmux_pane: Option<String>,
}

impl StopNotice {
    /// The session id.
    #[must_use]
    pub fn session(&self) -> SessionId {
        SessionId::from(self.session_id.as_str())
    }

    /// The terminal pane, ignoring empty strings.
    #[must_use]
    pub fn pane(&self) -> Option<&str> {
        non_empty(self.tmux_pane.as_deref())
    }
}

/// Response body of `POST /notify-stop`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Always `"ok"`.
    pub status: String,
}

impl StatusResponse {
    /// The single success value.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            status: "ok".to_owned(),
        }
    }
}

/// Response body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// `"ok"` while the HTTP surface is serving.
    pub status: String,
    /// Whether the notification channel is connected.
    pub channel_ready: bool,
    /// Requests currently waiting for a human.
    pub pending: usize,
    /// Sessions the broker is tracking.
    pub sessions: usize,
    /// Service version.
    pub version: String,
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::ToolKind;

    #[test]
    fn approve_request_accepts_minimal_body() {
        let req: ApproveRequest = serde_json::from_str("{}").unwrap();
        assert!(req.request_id().is_none());
        assert_eq!(req.invocation().kind(), ToolKind::Other);
    }

    #[test]
    fn blank_request_id_is_missing() {
        let req: ApproveRequest = serde_json::from_str(r#"{"request_id":"  "}"#).unwrap();
        assert!(req.request_id().is_none());
    }

    #[test]
    fn approve_request_full_body() {
        let req: ApproveRequest = serde_json::from_value(serde_json::json!({
            "request_id": "r1",
            "tool_name": "Bash",
            "tool_input": {"command": "rm x"},
            "session_id": "s1",
            "transcript_path": "/tmp/t.jsonl",
            "cwd": "/work",
            "tmux_pane": "%3"
        }))
        .unwrap();
        assert_eq!(req.request_id().unwrap().as_str(), "r1");
        assert_eq!(req.invocation().kind(), ToolKind::Shell);
        assert_eq!(req.pane(), Some("%3"));
        assert_eq!(req.session().as_str(), "s1");
    }

    #[test]
    fn empty_pane_is_none() {
        let notice: StopNotice = serde_json::from_str(r#"{"tmux_pane":""}"#).unwrap();
        assert!(notice.pane().is_none());
    }

    #[test]
    fn status_ok_shape() {
        assert_eq!(
            serde_json::to_string(&StatusResponse::ok()).unwrap(),
            r#"{"status":"ok"}"#
        );
    }
}
