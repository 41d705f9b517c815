//! Turning Discord interactions into broker events.
//!
//! Buttons, select menus and modal submissions are parsed by their custom
//! id, checked against the allowed users, and posted to the broker as an
//! [`InteractionEvent`]. The broker's [`InteractionReply`] decides the
//! acknowledgement: silent for a resolution, ephemeral text otherwise.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use warden_broker::ApprovalBroker;
use warden_core::{ApprovalAction, InteractionEvent, InteractionReply, TerminalReply};

use crate::components::{ApprovalButton, CustomId, TerminalButton, text_modal};
use crate::error::DiscordResult;
use crate::rest::DiscordRest;
use crate::types::{Interaction, InteractionResponse, interaction_type};

const NOT_AUTHORIZED: &str = "You are not authorized to answer approval requests.";
const UNKNOWN_ACTION: &str = "Unknown action.";
const EMPTY_TEXT: &str = "The reply cannot be empty.";

/// Receiver of interaction events.
#[async_trait]
pub trait InteractionSink: Send + Sync {
    /// Apply an event and report what happened.
    async fn deliver(&self, event: InteractionEvent) -> InteractionReply;
}

#[async_trait]
impl InteractionSink for ApprovalBroker {
    async fn deliver(&self, event: InteractionEvent) -> InteractionReply {
        self.handle_interaction(event).await
    }
}

/// What to do with one interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Post the event to the broker, then acknowledge based on its reply.
    Deliver(InteractionEvent),
    /// Answer directly (modal, refusal, error).
    Respond(InteractionResponse),
}

/// Routes interactions to the broker and acknowledges them.
#[derive(Clone)]
pub struct InteractionHandler {
    rest: DiscordRest,
    sink: Arc<dyn InteractionSink>,
    allowed_users: Vec<String>,
}

impl std::fmt::Debug for InteractionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionHandler")
            .field("allowed_users", &self.allowed_users)
            .finish_non_exhaustive()
    }
}

impl InteractionHandler {
    /// Create a handler. An empty `allowed_users` list admits everyone.
    #[must_use]
    pub fn new(rest: DiscordRest, sink: Arc<dyn InteractionSink>, allowed_users: Vec<String>) -> Self {
        Self {
            rest,
            sink,
            allowed_users,
        }
    }

    fn is_authorized(&self, interaction: &Interaction) -> bool {
        self.allowed_users.is_empty()
            || interaction
                .user_id()
                .is_some_and(|id| self.allowed_users.iter().any(|u| u == id))
    }

    /// Decide how to handle an interaction without side effects.
    #[must_use]
    pub fn route(&self, interaction: &Interaction) -> Route {
        match interaction.interaction_type {
            interaction_type::PING => return Route::Respond(InteractionResponse::pong()),
            interaction_type::MESSAGE_COMPONENT | interaction_type::MODAL_SUBMIT => {},
            other => {
                debug!(interaction_type = other, "Unhandled interaction type");
                return Route::Respond(InteractionResponse::ephemeral(UNKNOWN_ACTION));
            },
        }

        if !self.is_authorized(interaction) {
            warn!(user = ?interaction.user_id(), "Interaction from unauthorized user");
            return Route::Respond(InteractionResponse::ephemeral(NOT_AUTHORIZED));
        }

        let raw = interaction.custom_id();
        let Some(id) = CustomId::parse(raw) else {
            debug!(custom_id = raw, "Unknown custom id");
            return Route::Respond(InteractionResponse::ephemeral(UNKNOWN_ACTION));
        };

        let approval = |request_id, action| {
            Route::Deliver(InteractionEvent::Approval { request_id, action })
        };
        let typed = |make: &dyn Fn(String) -> Route| match interaction
            .modal_text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            Some(text) => make(text.to_owned()),
            None => Route::Respond(InteractionResponse::ephemeral(EMPTY_TEXT)),
        };

        match id {
            CustomId::Approval { request_id, button } => match button {
                ApprovalButton::Allow => approval(request_id, ApprovalAction::Allow),
                ApprovalButton::Deny => approval(request_id, ApprovalAction::Deny),
                ApprovalButton::AllowAll => approval(request_id, ApprovalAction::AllowAll),
                ApprovalButton::Reply => Route::Respond(text_modal(
                    &CustomId::ReplyModal { request_id },
                    "Reply to the agent",
                    "Message",
                )),
            },
            CustomId::Option { request_id, index } => {
                let label = interaction
                    .button_label(raw)
                    .map_or_else(|| index.saturating_add(1).to_string(), str::to_owned);
                approval(request_id, ApprovalAction::Answer(label))
            },
            CustomId::OtherAnswer { request_id } => Route::Respond(text_modal(
                &CustomId::AnswerModal { request_id },
                "Answer the question",
                "Answer",
            )),
            CustomId::Select {
                request_id,
                question,
            } => {
                let values = interaction
                    .data
                    .as_ref()
                    .map(|d| d.values.clone())
                    .unwrap_or_default();
                approval(request_id, ApprovalAction::Select { question, values })
            },
            CustomId::Submit { request_id } => approval(request_id, ApprovalAction::Submit),
            CustomId::Terminal { session_id, button } => {
                let reply = match button {
                    TerminalButton::Yes => TerminalReply::Yes,
                    TerminalButton::No => TerminalReply::No,
                    TerminalButton::Reply => {
                        return Route::Respond(text_modal(
                            &CustomId::TerminalModal { session_id },
                            "Reply in the terminal",
                            "Text",
                        ));
                    },
                };
                Route::Deliver(InteractionEvent::Terminal { session_id, reply })
            },
            CustomId::ReplyModal { request_id } => {
                typed(&|text| approval(request_id.clone(), ApprovalAction::Reply(text)))
            },
            CustomId::AnswerModal { request_id } => {
                typed(&|text| approval(request_id.clone(), ApprovalAction::Answer(text)))
            },
            CustomId::TerminalModal { session_id } => typed(&|text| {
                Route::Deliver(InteractionEvent::Terminal {
                    session_id: session_id.clone(),
                    reply: TerminalReply::Text(text),
                })
            }),
        }
    }

    /// Handle one interaction end to end.
    ///
    /// # Errors
    ///
    /// Fails if the acknowledgement cannot be sent.
    pub async fn handle(&self, interaction: Interaction) -> DiscordResult<()> {
        let response = match self.route(&interaction) {
            Route::Respond(response) => response,
            Route::Deliver(event) => {
                let reply = self.sink.deliver(event).await;
                acknowledgement(&reply)
            },
        };
        self.rest
            .interaction_respond(&interaction.id, &interaction.token, &response)
            .await
    }
}

/// The acknowledgement for a broker reply.
#[must_use]
pub fn acknowledgement(reply: &InteractionReply) -> InteractionResponse {
    match reply.notice() {
        Some(text) => InteractionResponse::ephemeral(text),
        None => InteractionResponse::deferred_update(),
    }
}
