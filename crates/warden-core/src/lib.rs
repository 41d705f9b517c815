//! Warden Core - Shared types for the approval gate.
//!
//! This crate provides the vocabulary every other Warden crate speaks:
//!
//! - [`ToolInvocation`]: the action under review, one strongly typed
//!   variant per tool kind
//! - [`Decision`] and [`Outcome`]: how a request was resolved
//! - [`Verdict`]: what the local classifier concluded
//! - Wire envelopes for the `/approve` and `/notify-stop` endpoints
//! - [`InteractionEvent`]: messages posted by the chat layer when a human
//!   presses a button, picks an option or types a reply
//!
//! # Example
//!
//! ```
//! use warden_core::{Decision, ToolInvocation};
//!
//! let invocation = ToolInvocation::from_wire(
//!     "Bash",
//!     &serde_json::json!({ "command": "rm -rf build" }),
//! );
//! assert_eq!(invocation.tool_name(), "Bash");
//!
//! let decision = Decision::deny("Read it first");
//! assert!(!decision.is_allowed());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod decision;
pub mod envelope;
pub mod ids;
pub mod interaction;
pub mod invocation;
pub mod text;

pub use decision::{Decision, Outcome, SHUTDOWN_REASON, TIMED_OUT_REASON, Verdict};
pub use envelope::{ApproveRequest, HealthReport, StatusResponse, StopNotice};
pub use ids::{RequestId, SessionId};
pub use interaction::{ApprovalAction, InteractionEvent, InteractionReply, TerminalReply};
pub use invocation::{Question, QuestionOption, ToolInvocation, ToolKind};
