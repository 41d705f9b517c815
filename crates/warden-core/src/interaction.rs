//! Messages from the chat layer to the broker.
//!
//! Every interactive affordance (button, select menu, modal) is turned
//! into an [`InteractionEvent`] and posted to the single owner of the
//! pending-request registry. The owner answers with an
//! [`InteractionReply`] so the chat layer can acknowledge the human.

use serde::{Deserialize, Serialize};

use crate::decision::Outcome;
use crate::ids::{RequestId, SessionId};

/// What a human did to a pending approval prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "value")]
pub enum ApprovalAction {
    /// Allow this request.
    Allow,
    /// Deny this request.
    Deny,
    /// Allow this request and every later one in the session.
    AllowAll,
    /// Deny with typed guidance.
    Reply(String),
    /// Answer a single question directly (option button or free text).
    Answer(String),
    /// Record the selection for one question of a multi-question set.
    Select {
        /// Index of the question in the set.
        question: usize,
        /// Selected option labels.
        values: Vec<String>,
    },
    /// Submit the recorded selections.
    Submit,
}

/// Quick replies typed back into a live terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reply", content = "text")]
pub enum TerminalReply {
    /// Type `yes`.
    Yes,
    /// Type `no`.
    No,
    /// Type arbitrary text.
    Text(String),
}

impl TerminalReply {
    /// The literal text to inject.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Text(t) => t,
        }
    }
}

/// An event posted by the chat layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum InteractionEvent {
    /// A human acted on an approval prompt.
    Approval {
        /// The request the prompt belongs to.
        request_id: RequestId,
        /// What they did.
        action: ApprovalAction,
    },
    /// A human used a completion notice's terminal affordances.
    Terminal {
        /// The session whose terminal should receive the text.
        session_id: SessionId,
        /// What to type.
        reply: TerminalReply,
    },
}

/// The broker's answer to an [`InteractionEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum InteractionReply {
    /// This event resolved the request.
    Resolved {
        /// The winning outcome.
        outcome: Outcome,
    },
    /// The request was already resolved or never existed.
    Expired,
    /// A selection was stored; the request stays pending.
    Recorded,
    /// Submit was pressed before every question had an answer.
    Incomplete {
        /// Indexes of unanswered questions.
        missing: Vec<usize>,
    },
    /// Text was typed into the terminal.
    Injected,
    /// The session has no live terminal.
    TerminalUnavailable,
}

impl InteractionReply {
    /// Human-facing acknowledgement text, when one is warranted.
    #[must_use]
    pub fn notice(&self) -> Option<String> {
        match self {
            Self::Resolved { .. } | Self::Recorded => None,
            Self::Expired => Some("This request has already expired.".to_owned()),
            Self::Incomplete { missing } => {
                let list = missing
                    .iter()
                    .map(|i| i.saturating_add(1).to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                Some(format!("Please answer question(s) {list} before submitting."))
            },
            Self::Injected => Some("Sent to terminal.".to_owned()),
            Self::TerminalUnavailable => Some("The terminal is no longer available.".to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_reply_text() {
        assert_eq!(TerminalReply::Yes.text(), "yes");
        assert_eq!(TerminalReply::No.text(), "no");
        assert_eq!(TerminalReply::Text("go on".into()).text(), "go on");
    }

    #[test]
    fn incomplete_notice_is_one_based() {
        let reply = InteractionReply::Incomplete {
            missing: vec![0, 2],
        };
        assert_eq!(
            reply.notice().unwrap(),
            "Please answer question(s) 1, 3 before submitting."
        );
    }

    #[test]
    fn resolved_has_no_notice() {
        let reply = InteractionReply::Resolved {
            outcome: Outcome::Allowed,
        };
        assert!(reply.notice().is_none());
        assert!(InteractionReply::Expired.notice().unwrap().contains("expired"));
    }
}
