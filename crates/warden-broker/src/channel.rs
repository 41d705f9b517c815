//! The notification channel seam.
//!
//! The broker never talks to a chat platform directly. It hands rendered
//! [`Prompt`]s and [`Notice`]s to a [`NotificationChannel`] and receives the
//! human's response back as an
//! [`InteractionEvent`](warden_core::InteractionEvent).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use warden_core::{Outcome, RequestId, SessionId};

use crate::error::ChannelResult;

/// A thread in the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRef {
    /// Platform id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Whether the platform reports it archived.
    pub archived: bool,
}

/// A posted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    /// Thread the message lives in.
    pub thread_id: String,
    /// Platform message id.
    pub message_id: String,
}

/// One question of a multi-question set, as offered to the human.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionChoice {
    /// Short label, from the question header or its text.
    pub label: String,
    /// Option labels.
    pub options: Vec<String>,
    /// Whether several options may be chosen.
    pub multi_select: bool,
}

/// The response affordances attached to a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Affordances {
    /// Allow, Deny, Allow All and Reply.
    Approval,
    /// One button per option plus free text.
    SingleQuestion {
        /// Option labels.
        options: Vec<String>,
    },
    /// One selector per question plus Submit.
    MultiQuestion {
        /// The questions.
        questions: Vec<QuestionChoice>,
    },
}

/// A rendered approval prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    /// Request the prompt belongs to.
    pub request_id: RequestId,
    /// Heading, usually the tool name.
    pub title: String,
    /// Rendered invocation.
    pub body: String,
    /// Short request id and timeout.
    pub footer: String,
    /// What the human can do.
    pub affordances: Affordances,
}

/// A rendered informational notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Heading.
    pub title: String,
    /// Body text.
    pub body: String,
    /// When set, the notice offers Yes / No / Reply affordances that type
    /// into this session's terminal.
    pub terminal: Option<SessionId>,
}

/// An asynchronous messaging system used to reach a human.
///
/// Implementations must be cheap to share; the broker holds them behind an
/// `Arc` and calls them from many tasks at once.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Whether the channel can currently deliver prompts and collect replies.
    fn is_ready(&self) -> bool;

    /// Look a thread up by id. `None` when it no longer exists.
    async fn fetch_thread(&self, thread_id: &str) -> ChannelResult<Option<ThreadRef>>;

    /// Find a thread by exact name among active and archived threads.
    async fn find_thread(&self, name: &str) -> ChannelResult<Option<ThreadRef>>;

    /// Create a thread.
    async fn create_thread(&self, name: &str) -> ChannelResult<ThreadRef>;

    /// Reopen an archived thread.
    async fn unarchive_thread(&self, thread_id: &str) -> ChannelResult<()>;

    /// Archive a thread.
    async fn archive_thread(&self, thread_id: &str) -> ChannelResult<()>;

    /// Post an approval prompt with its affordances.
    async fn post_prompt(&self, thread_id: &str, prompt: &Prompt) -> ChannelResult<MessageRef>;

    /// Post an informational notice.
    async fn post_notice(&self, thread_id: &str, notice: &Notice) -> ChannelResult<MessageRef>;

    /// Replace a prompt's affordances with its outcome.
    async fn finalize_prompt(
        &self,
        message: &MessageRef,
        prompt: &Prompt,
        outcome: &Outcome,
    ) -> ChannelResult<()>;
}
