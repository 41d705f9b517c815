//! Warden Broker - human approval over an asynchronous notification channel.
//!
//! This crate provides:
//! - [`ApprovalBroker`]: posts approval prompts and blocks until a human,
//!   the timeout, or shutdown resolves them.
//! - [`RequestRegistry`]: the single owner of pending requests; the first
//!   resolver wins.
//! - [`SessionStore`] and [`SessionRouter`]: per-session thread binding,
//!   escalation and cleanup.
//! - [`CompletionNotifier`]: session completion notices with terminal
//!   replies.
//! - The [`NotificationChannel`] and [`TerminalInjector`] seams.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod answers;
pub mod broker;
pub mod channel;
pub mod error;
pub mod notifier;
pub mod registry;
pub mod render;
pub mod router;
pub mod session;
pub mod terminal;
pub mod transcript;

pub use broker::{ApprovalBroker, BrokerSettings, Submission};
pub use channel::{Affordances, MessageRef, Notice, NotificationChannel, Prompt, QuestionChoice, ThreadRef};
pub use error::{BrokerError, BrokerResult, ChannelError, ChannelResult};
pub use notifier::{CompletionNotifier, SessionEnd};
pub use registry::{RequestRegistry, Resolution, Settlement};
pub use router::SessionRouter;
pub use session::{SessionContext, SessionState, SessionStore};
pub use terminal::{TerminalInjector, TmuxInjector};
