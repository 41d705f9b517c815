//! Minimal Discord API types.
//!
//! Only the fields we read or write are modelled. Unknown fields are
//! silently dropped by serde's default deserialization.

use serde::{Deserialize, Serialize};

// ── Constants ────────────────────────────────────────────────

/// Discord interaction type constants.
pub(crate) mod interaction_type {
    /// Ping (used for endpoint verification).
    pub(crate) const PING: u8 = 1;
    /// Message component (button, select menu).
    pub(crate) const MESSAGE_COMPONENT: u8 = 3;
    /// Modal submit.
    pub(crate) const MODAL_SUBMIT: u8 = 5;
}

/// Discord interaction callback type constants.
pub(crate) mod callback_type {
    /// ACK a ping.
    pub(crate) const PONG: u8 = 1;
    /// Respond with a message.
    pub(crate) const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;
    /// ACK a component without changing the message.
    pub(crate) const DEFERRED_UPDATE_MESSAGE: u8 = 6;
    /// Respond with a modal popup.
    pub(crate) const MODAL: u8 = 9;
}

/// Component type constants.
pub(crate) mod component_type {
    pub(crate) const ACTION_ROW: u8 = 1;
    pub(crate) const BUTTON: u8 = 2;
    pub(crate) const STRING_SELECT: u8 = 3;
    pub(crate) const TEXT_INPUT: u8 = 4;
}

/// Button style constants.
pub(crate) mod button_style {
    pub(crate) const PRIMARY: u8 = 1;
    pub(crate) const SECONDARY: u8 = 2;
    pub(crate) const SUCCESS: u8 = 3;
    pub(crate) const DANGER: u8 = 4;
}

/// Text input style constants.
pub(crate) mod text_input_style {
    pub(crate) const PARAGRAPH: u8 = 2;
}

/// Channel type of a public thread.
pub(crate) const PUBLIC_THREAD: u8 = 11;

/// Message flag for ephemeral responses.
pub(crate) const EPHEMERAL: u32 = 1 << 6;

/// Embed colors.
pub(crate) mod color {
    pub(crate) const GOLD: u32 = 0x00F1_C40F;
    pub(crate) const GREEN: u32 = 0x002E_CC71;
    pub(crate) const RED: u32 = 0x00E7_4C3C;
    pub(crate) const BLUE: u32 = 0x0034_98DB;
    pub(crate) const GREY: u32 = 0x0095_A5A6;
    pub(crate) const BLURPLE: u32 = 0x0058_65F2;
}

// ── Inbound Types (from Discord) ─────────────────────────────

/// A Discord interaction payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    /// Interaction id.
    pub id: String,
    /// Interaction type.
    #[serde(rename = "type")]
    pub interaction_type: u8,
    /// Continuation token.
    pub token: String,
    /// Type-specific data.
    #[serde(default)]
    pub data: Option<InteractionData>,
    /// Guild member who acted (guild channels).
    #[serde(default)]
    pub member: Option<GuildMember>,
    /// User who acted (DMs).
    #[serde(default)]
    pub user: Option<User>,
    /// Channel the interaction happened in.
    #[serde(default)]
    pub channel_id: Option<String>,
    /// Message the component was attached to.
    #[serde(default)]
    pub message: Option<Message>,
}

impl Interaction {
    /// Extract the user ID from either `member.user` or top-level `user`.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.member
            .as_ref()
            .and_then(|m| m.user.as_ref())
            .or(self.user.as_ref())
            .map(|u| u.id.as_str())
    }

    /// The component or modal custom id.
    #[must_use]
    pub fn custom_id(&self) -> &str {
        self.data
            .as_ref()
            .and_then(|d| d.custom_id.as_deref())
            .unwrap_or("")
    }

    /// Label of the message button carrying `custom_id`.
    #[must_use]
    pub fn button_label(&self, custom_id: &str) -> Option<&str> {
        fn find<'a>(components: &'a [Component], custom_id: &str) -> Option<&'a str> {
            components.iter().find_map(|c| {
                if c.custom_id.as_deref() == Some(custom_id) {
                    c.label.as_deref()
                } else {
                    c.components.as_deref().and_then(|inner| find(inner, custom_id))
                }
            })
        }
        self.message
            .as_ref()
            .and_then(|m| find(&m.components, custom_id))
    }

    /// Value of the first text input of a modal submission.
    #[must_use]
    pub fn modal_text(&self) -> Option<&str> {
        self.data
            .as_ref()?
            .components
            .iter()
            .flat_map(|row| row.components.iter())
            .map(|input| input.value.as_str())
            .next()
    }
}

/// Data payload within an interaction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InteractionData {
    /// Component or modal custom id.
    #[serde(default)]
    pub custom_id: Option<String>,
    /// Component type.
    #[serde(default)]
    pub component_type: Option<u8>,
    /// Selected values of a select menu.
    #[serde(default)]
    pub values: Vec<String>,
    /// Modal rows.
    #[serde(default)]
    pub components: Vec<ModalRow>,
}

/// A modal component row.
#[derive(Debug, Clone, Deserialize)]
pub struct ModalRow {
    /// Inputs in the row.
    #[serde(default)]
    pub components: Vec<ModalTextInput>,
}

/// A text input value from a modal.
#[derive(Debug, Clone, Deserialize)]
pub struct ModalTextInput {
    /// Input custom id.
    pub custom_id: String,
    /// Submitted text.
    #[serde(default)]
    pub value: String,
}

/// A Discord guild member.
#[derive(Debug, Clone, Deserialize)]
pub struct GuildMember {
    /// The member's user.
    #[serde(default)]
    pub user: Option<User>,
}

/// A Discord user.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    /// User id.
    pub id: String,
    /// Username.
    #[serde(default)]
    pub username: Option<String>,
}

/// A Discord message.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    /// Message id.
    pub id: String,
    /// Channel id.
    #[serde(default)]
    pub channel_id: Option<String>,
    /// Attached components.
    #[serde(default)]
    pub components: Vec<Component>,
}

/// A channel or thread object.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChannelObject {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub thread_metadata: Option<ThreadMetadata>,
}

impl ChannelObject {
    pub(crate) fn archived(&self) -> bool {
        self.thread_metadata.as_ref().is_some_and(|m| m.archived)
    }
}

/// Thread-specific channel fields.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ThreadMetadata {
    #[serde(default)]
    pub archived: bool,
}

/// Response of the thread listing endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct ThreadList {
    #[serde(default)]
    pub threads: Vec<ChannelObject>,
    #[serde(default)]
    pub has_more: bool,
}

/// A created message.
#[derive(Debug, Deserialize)]
pub(crate) struct MessageObject {
    pub id: String,
    pub channel_id: String,
}

// ── Outbound Types (to Discord) ──────────────────────────────

/// Interaction callback response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionResponse {
    /// Callback type.
    #[serde(rename = "type")]
    pub response_type: u8,
    /// Callback data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<InteractionCallbackData>,
}

impl InteractionResponse {
    /// Acknowledge without changing anything.
    #[must_use]
    pub fn deferred_update() -> Self {
        Self {
            response_type: callback_type::DEFERRED_UPDATE_MESSAGE,
            data: None,
        }
    }

    /// Reply with a message only the acting user sees.
    #[must_use]
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            response_type: callback_type::CHANNEL_MESSAGE_WITH_SOURCE,
            data: Some(InteractionCallbackData {
                content: Some(content.into()),
                flags: Some(EPHEMERAL),
                ..Default::default()
            }),
        }
    }

    /// Answer a ping.
    #[must_use]
    pub fn pong() -> Self {
        Self {
            response_type: callback_type::PONG,
            data: None,
        }
    }
}

/// Data for an interaction callback.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InteractionCallbackData {
    /// Message text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Components (message or modal rows).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<Component>>,
    /// 64 = ephemeral message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u32>,
    /// Modal title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Modal custom id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
}

/// An embed object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

/// An embed footer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct EmbedFooter {
    pub text: String,
}

/// An embed field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct EmbedField {
    pub name: String,
    pub value: String,
}

/// A message component (action row, button, select menu, text input).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Component type.
    #[serde(rename = "type")]
    pub component_type: u8,
    /// Children of an action row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<Component>>,
    /// Button or text input style.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<u8>,
    /// Button or text input label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Custom id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    /// Select options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<SelectOption>>,
    /// Select or text input placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Fewest selectable options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_values: Option<u8>,
    /// Most selectable options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_values: Option<u8>,
    /// Whether a text input is required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// Longest text input accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u16>,
}

/// One option of a string select menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    /// Shown text.
    pub label: String,
    /// Submitted value.
    pub value: String,
}
