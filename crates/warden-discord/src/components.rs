//! Message components, custom ids and embeds.
//!
//! Every interactive element carries a custom id that names the request or
//! session it acts on, so a click can be routed without any local state.

use std::fmt;

use warden_broker::{Affordances, Notice, Prompt};
use warden_core::text::clip;
use warden_core::{Outcome, RequestId, SessionId};

use crate::types::{
    Component, Embed, EmbedField, EmbedFooter, InteractionCallbackData, InteractionResponse,
    SelectOption, button_style, callback_type, color, component_type, text_input_style,
};

/// Buttons per action row.
const ROW_WIDTH: usize = 5;
/// Option buttons offered for a single question (four rows, one slot for "Other").
const MAX_OPTION_BUTTONS: usize = 19;
/// Selectors per message (the fifth row holds Submit).
const MAX_SELECTORS: usize = 4;
/// Options per select menu.
const MAX_SELECT_OPTIONS: usize = 25;
/// Button label limit.
const BUTTON_LABEL_MAX: usize = 80;
/// Select option label and value limit.
const SELECT_TEXT_MAX: usize = 100;
/// Select placeholder limit.
const PLACEHOLDER_MAX: usize = 150;
/// Embed title limit.
const EMBED_TITLE_MAX: usize = 256;
/// Embed description limit.
const EMBED_DESCRIPTION_MAX: usize = 4096;
/// Embed field value limit.
const FIELD_VALUE_MAX: usize = 1024;
/// Longest typed reply.
const REPLY_MAX_LEN: u16 = 1000;

/// Approval button kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalButton {
    /// Allow once.
    Allow,
    /// Deny.
    Deny,
    /// Allow for the rest of the session.
    AllowAll,
    /// Open the reply modal.
    Reply,
}

/// Terminal quick-reply button kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalButton {
    /// Type `yes`.
    Yes,
    /// Type `no`.
    No,
    /// Open the terminal reply modal.
    Reply,
}

/// Routing key carried by a component or modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomId {
    /// `apr:{request}:{allow|deny|all|reply}`
    Approval {
        /// Target request.
        request_id: RequestId,
        /// Button pressed.
        button: ApprovalButton,
    },
    /// `ans:{request}:{index}`: an option button of a single question.
    Option {
        /// Target request.
        request_id: RequestId,
        /// Option index.
        index: usize,
    },
    /// `ans:{request}:other`: opens the free-text answer modal.
    OtherAnswer {
        /// Target request.
        request_id: RequestId,
    },
    /// `sel:{request}:{question}`
    Select {
        /// Target request.
        request_id: RequestId,
        /// Question index.
        question: usize,
    },
    /// `sub:{request}`
    Submit {
        /// Target request.
        request_id: RequestId,
    },
    /// `term:{session}:{yes|no|reply}`
    Terminal {
        /// Target session.
        session_id: SessionId,
        /// Button pressed.
        button: TerminalButton,
    },
    /// `rpl:{request}`: reply modal submission.
    ReplyModal {
        /// Target request.
        request_id: RequestId,
    },
    /// `ansm:{request}`: free-text answer modal submission.
    AnswerModal {
        /// Target request.
        request_id: RequestId,
    },
    /// `termm:{session}`: terminal reply modal submission.
    TerminalModal {
        /// Target session.
        session_id: SessionId,
    },
}

impl CustomId {
    /// Parse a custom id. `None` for anything unknown.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let (prefix, rest) = raw.split_once(':')?;
        if rest.is_empty() {
            return None;
        }
        let rid = |s: &str| RequestId::from(s);
        let id = match prefix {
            "apr" => {
                let (id, action) = rest.rsplit_once(':')?;
                let button = match action {
                    "allow" => ApprovalButton::Allow,
                    "deny" => ApprovalButton::Deny,
                    "all" => ApprovalButton::AllowAll,
                    "reply" => ApprovalButton::Reply,
                    _ => return None,
                };
                Self::Approval {
                    request_id: rid(id),
                    button,
                }
            },
            "ans" => {
                let (id, which) = rest.rsplit_once(':')?;
                if which == "other" {
                    Self::OtherAnswer { request_id: rid(id) }
                } else {
                    Self::Option {
                        request_id: rid(id),
                        index: which.parse().ok()?,
                    }
                }
            },
            "sel" => {
                let (id, q) = rest.rsplit_once(':')?;
                Self::Select {
                    request_id: rid(id),
                    question: q.parse().ok()?,
                }
            },
            "sub" => Self::Submit { request_id: rid(rest) },
            "term" => {
                let (id, action) = rest.rsplit_once(':')?;
                let button = match action {
                    "yes" => TerminalButton::Yes,
                    "no" => TerminalButton::No,
                    "reply" => TerminalButton::Reply,
                    _ => return None,
                };
                Self::Terminal {
                    session_id: SessionId::from(id),
                    button,
                }
            },
            "rpl" => Self::ReplyModal { request_id: rid(rest) },
            "ansm" => Self::AnswerModal { request_id: rid(rest) },
            "termm" => Self::TerminalModal {
                session_id: SessionId::from(rest),
            },
            _ => return None,
        };
        Some(id)
    }
}

impl fmt::Display for CustomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approval { request_id, button } => {
                let action = match button {
                    ApprovalButton::Allow => "allow",
                    ApprovalButton::Deny => "deny",
                    ApprovalButton::AllowAll => "all",
                    ApprovalButton::Reply => "reply",
                };
                write!(f, "apr:{request_id}:{action}")
            },
            Self::Option { request_id, index } => write!(f, "ans:{request_id}:{index}"),
            Self::OtherAnswer { request_id } => write!(f, "ans:{request_id}:other"),
            Self::Select {
                request_id,
                question,
            } => write!(f, "sel:{request_id}:{question}"),
            Self::Submit { request_id } => write!(f, "sub:{request_id}"),
            Self::Terminal { session_id, button } => {
                let action = match button {
                    TerminalButton::Yes => "yes",
                    TerminalButton::No => "no",
                    TerminalButton::Reply => "reply",
                };
                write!(f, "term:{session_id}:{action}")
            },
            Self::ReplyModal { request_id } => write!(f, "rpl:{request_id}"),
            Self::AnswerModal { request_id } => write!(f, "ansm:{request_id}"),
            Self::TerminalModal { session_id } => write!(f, "termm:{session_id}"),
        }
    }
}

// ── Builders ─────────────────────────────────────────────────

fn button(style: u8, label: &str, id: &CustomId) -> Component {
    Component {
        component_type: component_type::BUTTON,
        style: Some(style),
        label: Some(clip(label, BUTTON_LABEL_MAX).to_owned()),
        custom_id: Some(id.to_string()),
        ..Component::default()
    }
}

fn row(components: Vec<Component>) -> Component {
    Component {
        component_type: component_type::ACTION_ROW,
        components: Some(components),
        ..Component::default()
    }
}

fn rows(buttons: Vec<Component>) -> Vec<Component> {
    let mut out = Vec::new();
    let mut iter = buttons.into_iter().peekable();
    while iter.peek().is_some() {
        out.push(row(iter.by_ref().take(ROW_WIDTH).collect()));
    }
    out
}

/// Components for an approval prompt.
#[must_use]
pub fn prompt_components(prompt: &Prompt) -> Vec<Component> {
    let request_id = &prompt.request_id;
    match &prompt.affordances {
        Affordances::Approval => {
            let approval = |button| CustomId::Approval {
                request_id: request_id.clone(),
                button,
            };
            vec![row(vec![
                button(button_style::SUCCESS, "Allow", &approval(ApprovalButton::Allow)),
                button(button_style::DANGER, "Deny", &approval(ApprovalButton::Deny)),
                button(
                    button_style::SECONDARY,
                    "Allow All",
                    &approval(ApprovalButton::AllowAll),
                ),
                button(button_style::PRIMARY, "Reply", &approval(ApprovalButton::Reply)),
            ])]
        },
        Affordances::SingleQuestion { options } => {
            let mut buttons: Vec<Component> = options
                .iter()
                .take(MAX_OPTION_BUTTONS)
                .enumerate()
                .map(|(index, label)| {
                    button(
                        button_style::PRIMARY,
                        label,
                        &CustomId::Option {
                            request_id: request_id.clone(),
                            index,
                        },
                    )
                })
                .collect();
            buttons.push(button(
                button_style::SECONDARY,
                "Other",
                &CustomId::OtherAnswer {
                    request_id: request_id.clone(),
                },
            ));
            rows(buttons)
        },
        Affordances::MultiQuestion { questions } => {
            let mut out: Vec<Component> = questions
                .iter()
                .take(MAX_SELECTORS)
                .enumerate()
                .map(|(question, q)| {
                    let options: Vec<SelectOption> = q
                        .options
                        .iter()
                        .take(MAX_SELECT_OPTIONS)
                        .map(|label| SelectOption {
                            label: clip(label, SELECT_TEXT_MAX).to_owned(),
                            value: clip(label, SELECT_TEXT_MAX).to_owned(),
                        })
                        .collect();
                    let max = if q.multi_select {
                        u8::try_from(options.len()).unwrap_or(1).max(1)
                    } else {
                        1
                    };
                    row(vec![Component {
                        component_type: component_type::STRING_SELECT,
                        custom_id: Some(
                            CustomId::Select {
                                request_id: request_id.clone(),
                                question,
                            }
                            .to_string(),
                        ),
                        placeholder: Some(clip(&q.label, PLACEHOLDER_MAX).to_owned()),
                        options: Some(options),
                        min_values: Some(1),
                        max_values: Some(max),
                        ..Component::default()
                    }])
                })
                .collect();
            out.push(row(vec![button(
                button_style::SUCCESS,
                "Submit",
                &CustomId::Submit {
                    request_id: request_id.clone(),
                },
            )]));
            out
        },
    }
}

/// Components for a completion notice.
#[must_use]
pub fn notice_components(notice: &Notice) -> Vec<Component> {
    let Some(session_id) = &notice.terminal else {
        return Vec::new();
    };
    let term = |button| CustomId::Terminal {
        session_id: session_id.clone(),
        button,
    };
    vec![row(vec![
        button(button_style::SUCCESS, "Yes", &term(TerminalButton::Yes)),
        button(button_style::DANGER, "No", &term(TerminalButton::No)),
        button(button_style::PRIMARY, "Reply", &term(TerminalButton::Reply)),
    ])]
}

/// A modal with one paragraph input.
#[must_use]
pub fn text_modal(id: &CustomId, title: &str, label: &str) -> InteractionResponse {
    InteractionResponse {
        response_type: callback_type::MODAL,
        data: Some(InteractionCallbackData {
            title: Some(clip(title, 45).to_owned()),
            custom_id: Some(id.to_string()),
            components: Some(vec![row(vec![Component {
                component_type: component_type::TEXT_INPUT,
                custom_id: Some("text".to_owned()),
                style: Some(text_input_style::PARAGRAPH),
                label: Some(clip(label, 45).to_owned()),
                required: Some(true),
                max_length: Some(REPLY_MAX_LEN),
                ..Component::default()
            }])]),
            ..Default::default()
        }),
    }
}

pub(crate) fn prompt_embed(prompt: &Prompt) -> Embed {
    Embed {
        title: Some(clip(&format!("🔧 {}", prompt.title), EMBED_TITLE_MAX).to_owned()),
        description: Some(clip(&prompt.body, EMBED_DESCRIPTION_MAX).to_owned()),
        color: Some(color::GOLD),
        footer: Some(EmbedFooter {
            text: prompt.footer.clone(),
        }),
        fields: Vec::new(),
    }
}

pub(crate) fn notice_embed(notice: &Notice) -> Embed {
    Embed {
        title: Some(clip(&notice.title, EMBED_TITLE_MAX).to_owned()),
        description: Some(clip(&notice.body, EMBED_DESCRIPTION_MAX).to_owned()),
        color: Some(color::BLURPLE),
        ..Embed::default()
    }
}

fn outcome_color(outcome: &Outcome) -> u32 {
    match outcome {
        Outcome::Allowed | Outcome::AllowedAll | Outcome::AutoAllowed => color::GREEN,
        Outcome::Denied => color::RED,
        Outcome::Replied(_) | Outcome::Answered(_) => color::BLUE,
        Outcome::TimedOut | Outcome::Shutdown => color::GREY,
    }
}

/// The prompt embed rewritten to show its outcome.
pub(crate) fn outcome_embed(prompt: &Prompt, outcome: &Outcome) -> Embed {
    let value = match outcome {
        Outcome::Replied(text) => format!("{}: {}", outcome.label(), text),
        _ => outcome.label().to_owned(),
    };
    Embed {
        color: Some(outcome_color(outcome)),
        fields: vec![EmbedField {
            name: "Outcome".to_owned(),
            value: clip(&value, FIELD_VALUE_MAX).to_owned(),
        }],
        ..prompt_embed(prompt)
    }
}
