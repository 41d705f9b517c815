//! Decisions, outcomes and classifier verdicts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason attached to a decision produced by the broker's own timeout.
pub const TIMED_OUT_REASON: &str = "Timed out waiting for approval";

/// Reason attached to requests drained while the broker stops.
pub const SHUTDOWN_REASON: &str = "Broker shutting down";

/// Terminal outcome of an invocation as seen by the agent.
///
/// Serializes to the hook wire shape: `{"decision":"allow"}` or
/// `{"decision":"deny","reason":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum Decision {
    /// Let the tool call proceed.
    Allow,
    /// Block the tool call.
    Deny {
        /// Free-text explanation, shown to the agent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl Decision {
    /// Deny with a reason.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: Some(reason.into()),
        }
    }

    /// Deny without a reason.
    #[must_use]
    pub fn deny_silently() -> Self {
        Self::Deny { reason: None }
    }

    /// The decision the broker reports when nobody answered in time.
    #[must_use]
    pub fn timed_out() -> Self {
        Self::deny(TIMED_OUT_REASON)
    }

    /// Whether the tool call may proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// The deny reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::Deny { reason } => reason.as_deref(),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Deny { reason: None } => f.write_str("deny"),
            Self::Deny {
                reason: Some(reason),
            } => write!(f, "deny ({reason})"),
        }
    }
}

/// How a pending request was resolved.
///
/// Richer than [`Decision`]: the chat layer uses it to update the posted
/// prompt, and the broker derives the agent-facing decision from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "text")]
pub enum Outcome {
    /// A human pressed Allow.
    Allowed,
    /// A human pressed Deny.
    Denied,
    /// A human pressed Allow All; the session is now escalated.
    AllowedAll,
    /// The session was already escalated, no human was asked.
    AutoAllowed,
    /// A human typed guidance instead of deciding.
    Replied(String),
    /// A human answered the agent's clarifying questions.
    Answered(String),
    /// Nobody answered before the deadline.
    TimedOut,
    /// The broker stopped before anyone answered.
    Shutdown,
}

impl Outcome {
    /// The decision reported to the agent.
    #[must_use]
    pub fn decision(&self) -> Decision {
        match self {
            Self::Allowed | Self::AllowedAll | Self::AutoAllowed => Decision::Allow,
            Self::Denied => Decision::deny_silently(),
            Self::Replied(text) | Self::Answered(text) => Decision::deny(text.clone()),
            Self::TimedOut => Decision::timed_out(),
            Self::Shutdown => Decision::deny(SHUTDOWN_REASON),
        }
    }

    /// Short human label for the updated prompt.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Allowed => "Allowed",
            Self::Denied => "Denied",
            Self::AllowedAll => "Allowed all for this session",
            Self::AutoAllowed => "Auto-allowed",
            Self::Replied(_) => "Replied",
            Self::Answered(_) => "Answered",
            Self::TimedOut => "Timed out",
            Self::Shutdown => "Cancelled",
        }
    }
}

/// What the local classifier decided for an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Safe or recoverable, let it run without asking.
    AutoAllow,
    /// Ask a human through the broker.
    NeedsApproval,
    /// Defer to the agent's own prompting.
    PassThrough,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AutoAllow => "auto_allow",
            Self::NeedsApproval => "needs_approval",
            Self::PassThrough => "pass_through",
        };
        f.write_str(label)
    }
}
