//! Rendering invocations into prompts and notices.
//!
//! One exhaustive match per [`ToolInvocation`] kind. Output is plain
//! Markdown; the channel decides how to present it.

use std::fmt::Write as _;
use std::time::Duration;

use warden_core::text::truncate;
use warden_core::{Question, RequestId, SessionId, ToolInvocation};

use crate::channel::{Affordances, Notice, Prompt, QuestionChoice};

/// Characters of a shell command shown.
pub const SHELL_PREVIEW: usize = 1500;
/// Characters of written file content shown.
pub const WRITE_PREVIEW: usize = 800;
/// Characters of each side of an edit shown.
pub const EDIT_PREVIEW: usize = 400;
/// Characters of raw JSON input shown for other tools.
pub const GENERIC_PREVIEW: usize = 1500;
/// Characters of the completion summary shown.
pub const SUMMARY_PREVIEW: usize = 1500;

/// Render an approval prompt.
#[must_use]
pub fn render_prompt(
    request_id: &RequestId,
    invocation: &ToolInvocation,
    timeout: Duration,
) -> Prompt {
    Prompt {
        request_id: request_id.clone(),
        title: invocation.tool_name().to_owned(),
        body: render_body(invocation),
        footer: format!(
            "ID: {}… | Timeout: {}s",
            request_id.short(),
            timeout.as_secs()
        ),
        affordances: affordances(invocation),
    }
}

fn render_body(invocation: &ToolInvocation) -> String {
    match invocation {
        ToolInvocation::Shell {
            command,
            description,
        } => {
            let block = code_block("bash", &truncate(command, SHELL_PREVIEW));
            match description.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
                Some(d) => format!("*{d}*\n{block}"),
                None => block,
            }
        },
        ToolInvocation::FileWrite { path, content } => format!(
            "**File:** `{path}`\n{}",
            code_block("", &truncate(content, WRITE_PREVIEW))
        ),
        ToolInvocation::FileEdit { path, old, new } => format!(
            "**File:** `{path}`\n**Old:**\n{}\n**New:**\n{}",
            code_block("", &truncate(old, EDIT_PREVIEW)),
            code_block("", &truncate(new, EDIT_PREVIEW))
        ),
        ToolInvocation::FileRead { path } => format!("**File:** `{path}`"),
        ToolInvocation::Question { questions } => render_questions(questions),
        ToolInvocation::Other { input, .. } => {
            let pretty = serde_json::to_string_pretty(input).unwrap_or_else(|_| input.to_string());
            code_block("json", &truncate(&pretty, GENERIC_PREVIEW))
        },
    }
}

fn render_questions(questions: &[Question]) -> String {
    let mut out = String::new();
    let numbered = questions.len() > 1;
    for (i, q) in questions.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if numbered {
            let _ = write!(out, "**{}.** ", i.saturating_add(1));
        }
        if let Some(header) = q.header.as_deref().filter(|h| !h.is_empty()) {
            let _ = write!(out, "**{header}** ");
        }
        out.push_str(&q.question);
        out.push('\n');
        for opt in &q.options {
            match opt.description.as_deref().filter(|d| !d.is_empty()) {
                Some(d) => {
                    let _ = writeln!(out, "• {} - {d}", opt.label);
                },
                None => {
                    let _ = writeln!(out, "• {}", opt.label);
                },
            }
        }
        if q.multi_select {
            out.push_str("*(multiple answers allowed)*\n");
        }
    }
    out
}

fn affordances(invocation: &ToolInvocation) -> Affordances {
    match invocation.questions() {
        [] => Affordances::Approval,
        [single] => Affordances::SingleQuestion {
            options: single.options.iter().map(|o| o.label.clone()).collect(),
        },
        many => Affordances::MultiQuestion {
            questions: many
                .iter()
                .map(|q| QuestionChoice {
                    label: q
                        .header
                        .clone()
                        .filter(|h| !h.is_empty())
                        .unwrap_or_else(|| q.question.clone()),
                    options: q.options.iter().map(|o| o.label.clone()).collect(),
                    multi_select: q.multi_select,
                })
                .collect(),
        },
    }
}

/// Render a session completion notice.
#[must_use]
pub fn render_completion(
    summary: &str,
    stop_reason: Option<&str>,
    terminal: Option<SessionId>,
) -> Notice {
    let title = match stop_reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(reason) => format!("Session stopped ({reason})"),
        None => "Session stopped".to_owned(),
    };
    let mut body = if summary.trim().is_empty() {
        "The agent is waiting for input.".to_owned()
    } else {
        truncate(summary.trim(), SUMMARY_PREVIEW)
    };
    if terminal.is_some() {
        body.push_str("\n\nReply below to type into the terminal.");
    }
    Notice {
        title,
        body,
        terminal,
    }
}

/// Wrap `text` in a fenced block, breaking any fence inside it.
fn code_block(lang: &str, text: &str) -> String {
    let safe = text.replace("```", "`\u{200b}`\u{200b}`");
    format!("```{lang}\n{safe}\n```")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_core::text::TRUNCATION_MARKER;

    fn prompt(tool: &str, input: serde_json::Value) -> Prompt {
        render_prompt(
            &RequestId::from("0123456789abcdef"),
            &ToolInvocation::from_wire(tool, &input),
            Duration::from_secs(300),
        )
    }

    #[test]
    fn shell_prompt() {
        let p = prompt("Bash", json!({"command": "rm -rf build", "description": "Clean"}));
        assert_eq!(p.title, "Bash");
        assert_eq!(p.body, "*Clean*\n```bash\nrm -rf build\n```");
        assert_eq!(p.footer, "ID: 01234567… | Timeout: 300s");
        assert_eq!(p.affordances, Affordances::Approval);
    }

    #[test]
    fn long_shell_command_is_truncated() {
        let long = "x".repeat(SHELL_PREVIEW + 10);
        let p = prompt("Bash", json!({ "command": long }));
        assert!(p.body.contains(TRUNCATION_MARKER));
    }

    #[test]
    fn write_prompt_previews_content() {
        let p = prompt("Write", json!({"file_path": "/a.txt", "content": "hello"}));
        assert_eq!(p.body, "**File:** `/a.txt`\n```\nhello\n```");
    }

    #[test]
    fn edit_prompt_shows_both_sides() {
        let p = prompt(
            "Edit",
            json!({"file_path": "/a.rs", "old_string": "foo", "new_string": "bar"}),
        );
        assert!(p.body.contains("**Old:**\n```\nfoo\n```"));
        assert!(p.body.contains("**New:**\n```\nbar\n```"));
    }

    #[test]
    fn read_prompt_shows_path() {
        let p = prompt("Read", json!({"file_path": "/etc/hosts"}));
        assert_eq!(p.body, "**File:** `/etc/hosts`");
    }

    #[test]
    fn other_tool_renders_json() {
        let p = prompt("mcp__db__query", json!({"sql": "drop table x"}));
        assert_eq!(p.title, "mcp__db__query");
        assert!(p.body.starts_with("```json\n"));
        assert!(p.body.contains("drop table x"));
    }

    #[test]
    fn fences_inside_content_are_broken() {
        let p = prompt("Bash", json!({"command": "echo ```"}));
        assert_eq!(p.body.matches("```").count(), 2);
    }

    #[test]
    fn single_question_offers_options() {
        let p = prompt(
            "AskUserQuestion",
            json!({"questions": [{
                "question": "Which database?",
                "header": "DB",
                "options": [{"label": "Postgres", "description": "relational"}, {"label": "Redis"}]
            }]}),
        );
        assert_eq!(
            p.affordances,
            Affordances::SingleQuestion {
                options: vec!["Postgres".into(), "Redis".into()]
            }
        );
        assert!(p.body.contains("**DB** Which database?"));
        assert!(p.body.contains("• Postgres - relational"));
    }

    #[test]
    fn multi_question_offers_selectors() {
        let p = prompt(
            "AskUserQuestion",
            json!({"questions": [
                {"question": "Language?", "options": [{"label": "Rust"}, {"label": "Go"}]},
                {"question": "Features?", "header": "Feat", "multiSelect": true,
                 "options": [{"label": "a"}, {"label": "b"}]}
            ]}),
        );
        let Affordances::MultiQuestion { questions } = p.affordances else {
            panic!("expected multi-question affordances");
        };
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].label, "Language?");
        assert_eq!(questions[1].label, "Feat");
        assert!(questions[1].multi_select);
        assert!(p.body.contains("**1.** Language?"));
        assert!(p.body.contains("*(multiple answers allowed)*"));
    }

    #[test]
    fn completion_notice() {
        let n = render_completion("All done.", Some("end_turn"), None);
        assert_eq!(n.title, "Session stopped (end_turn)");
        assert_eq!(n.body, "All done.");
        assert!(n.terminal.is_none());

        let n = render_completion("", None, Some(SessionId::from("s1")));
        assert_eq!(n.title, "Session stopped");
        assert!(n.body.starts_with("The agent is waiting for input."));
        assert!(n.body.ends_with("Reply below to type into the terminal."));
    }
}
