//! Tool invocations under review.
//!
//! The agent reports a tool call as a name plus a loosely typed JSON
//! input. [`ToolInvocation::from_wire`] lifts that pair into a tagged
//! union so every consumer matches on a closed set of kinds. Inputs that
//! do not fit their expected shape land in [`ToolInvocation::Other`]
//! rather than failing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tool name the agent uses for shell commands.
pub const SHELL_TOOL: &str = "Bash";
/// Tool name for whole-file writes.
pub const WRITE_TOOL: &str = "Write";
/// Tool name for in-place edits.
pub const EDIT_TOOL: &str = "Edit";
/// Tool name for file reads.
pub const READ_TOOL: &str = "Read";
/// Tool name for clarifying questions addressed to the user.
pub const QUESTION_TOOL: &str = "AskUserQuestion";

/// Coarse kind of a [`ToolInvocation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Shell command.
    Shell,
    /// Whole-file write.
    FileWrite,
    /// In-place edit.
    FileEdit,
    /// File read.
    FileRead,
    /// Clarifying question set.
    Question,
    /// Anything else.
    Other,
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Shell => "shell",
            Self::FileWrite => "file_write",
            Self::FileEdit => "file_edit",
            Self::FileRead => "file_read",
            Self::Question => "question",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// One selectable answer to a [`Question`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    /// Short label shown on the button or menu entry.
    pub label: String,
    /// Optional longer explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A clarifying question the agent wants answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// The question text.
    pub question: String,
    /// Short heading (a few words).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    /// Offered answers.
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    /// Whether several options may be picked at once.
    #[serde(default, rename = "multiSelect")]
    pub multi_select: bool,
}

#[derive(Deserialize)]
struct ShellInput {
    command: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct WriteInput {
    file_path: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct EditInput {
    file_path: String,
    #[serde(default)]
    old_string: String,
    #[serde(default)]
    new_string: String,
}

#[derive(Deserialize)]
struct ReadInput {
    file_path: String,
}

#[derive(Deserialize)]
struct QuestionInput {
    questions: Vec<Question>,
}

/// The action under review. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ToolInvocation {
    /// Run a shell command line.
    Shell {
        /// The full command line.
        command: String,
        /// Agent-supplied description, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },

    /// Write a whole file.
    FileWrite {
        /// Target path.
        path: String,
        /// New contents.
        content: String,
    },

    /// Replace a span of text inside a file.
    FileEdit {
        /// Target path.
        path: String,
        /// Text being replaced.
        old: String,
        /// Replacement text.
        new: String,
    },

    /// Read a file.
    FileRead {
        /// Target path.
        path: String,
    },

    /// Ask the human one or more clarifying questions.
    Question {
        /// The questions, in display order.
        questions: Vec<Question>,
    },

    /// A tool with no dedicated payload type.
    Other {
        /// The tool name as reported by the agent.
        name: String,
        /// Raw tool input.
        input: serde_json::Value,
    },
}

impl ToolInvocation {
    /// Build an invocation from the agent's `tool_name` and `tool_input`.
    ///
    /// Never fails: a known tool whose input is malformed is kept as
    /// [`ToolInvocation::Other`] so it still reaches a human.
    #[must_use]
    pub fn from_wire(tool_name: &str, tool_input: &serde_json::Value) -> Self {
        let parsed = match tool_name {
            SHELL_TOOL => serde_json::from_value::<ShellInput>(tool_input.clone())
                .ok()
                .map(|i| Self::Shell {
                    command: i.command,
                    description: i.description,
                }),
            WRITE_TOOL => serde_json::from_value::<WriteInput>(tool_input.clone())
                .ok()
                .map(|i| Self::FileWrite {
                    path: i.file_path,
                    content: i.content,
                }),
            EDIT_TOOL => serde_json::from_value::<EditInput>(tool_input.clone())
                .ok()
                .map(|i| Self::FileEdit {
                    path: i.file_path,
                    old: i.old_string,
                    new: i.new_string,
                }),
            READ_TOOL => serde_json::from_value::<ReadInput>(tool_input.clone())
                .ok()
                .map(|i| Self::FileRead { path: i.file_path }),
            QUESTION_TOOL => serde_json::from_value::<QuestionInput>(tool_input.clone())
                .ok()
                .filter(|i| !i.questions.is_empty())
                .map(|i| Self::Question {
                    questions: i.questions,
                }),
            _ => None,
        };

        parsed.unwrap_or_else(|| Self::Other {
            name: tool_name.to_owned(),
            input: tool_input.clone(),
        })
    }

    /// The kind tag.
    #[must_use]
    pub fn kind(&self) -> ToolKind {
        match self {
            Self::Shell { .. } => ToolKind::Shell,
            Self::FileWrite { .. } => ToolKind::FileWrite,
            Self::FileEdit { .. } => ToolKind::FileEdit,
            Self::FileRead { .. } => ToolKind::FileRead,
            Self::Question { .. } => ToolKind::Question,
            Self::Other { .. } => ToolKind::Other,
        }
    }

    /// The agent-facing tool name.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        match self {
            Self::Shell { .. } => SHELL_TOOL,
            Self::FileWrite { .. } => WRITE_TOOL,
            Self::FileEdit { .. } => EDIT_TOOL,
            Self::FileRead { .. } => READ_TOOL,
            Self::Question { .. } => QUESTION_TOOL,
            Self::Other { name, .. } => name,
        }
    }

    /// Questions carried by a question invocation, empty otherwise.
    #[must_use]
    pub fn questions(&self) -> &[Question] {
        match self {
            Self::Question { questions } => questions,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shell_input_is_typed() {
        let inv = ToolInvocation::from_wire("Bash", &json!({"command": "ls -la"}));
        assert_eq!(
            inv,
            ToolInvocation::Shell {
                command: "ls -la".into(),
                description: None
            }
        );
        assert_eq!(inv.kind(), ToolKind::Shell);
    }

    #[test]
    fn edit_input_maps_field_names() {
        let inv = ToolInvocation::from_wire(
            "Edit",
            &json!({"file_path": "/a.rs", "old_string": "x", "new_string": "y"}),
        );
        assert_eq!(
            inv,
            ToolInvocation::FileEdit {
                path: "/a.rs".into(),
                old: "x".into(),
                new: "y".into()
            }
        );
    }

    #[test]
    fn question_input_parses_multi_select() {
        let inv = ToolInvocation::from_wire(
            "AskUserQuestion",
            &json!({"questions": [{
                "question": "Which db?",
                "header": "DB",
                "options": [{"label": "Postgres"}, {"label": "SQLite", "description": "embedded"}],
                "multiSelect": true
            }]}),
        );
        let qs = inv.questions();
        assert_eq!(qs.len(), 1);
        assert!(qs[0].multi_select);
        assert_eq!(qs[0].options[1].description.as_deref(), Some("embedded"));
    }

    #[test]
    fn malformed_known_tool_falls_back_to_other() {
        let inv = ToolInvocation::from_wire("Bash", &json!({"cmd": "ls"}));
        assert_eq!(inv.kind(), ToolKind::Other);
        assert_eq!(inv.tool_name(), "Bash");
    }

    #[test]
    fn empty_question_set_is_other() {
        let inv = ToolInvocation::from_wire("AskUserQuestion", &json!({"questions": []}));
        assert_eq!(inv.kind(), ToolKind::Other);
    }

    #[test]
    fn unknown_tool_keeps_name_and_input() {
        let input = json!({"url": "https://example.com"});
        let inv = ToolInvocation::from_wire("WebFetch", &input);
        match inv {
            ToolInvocation::Other { name, input: raw } => {
                assert_eq!(name, "WebFetch");
                assert_eq!(raw, input);
            },
            other => panic!("unexpected {other:?}"),
        }
    }
}
