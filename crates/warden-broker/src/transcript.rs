//! Context extraction from an agent's JSONL transcript.
//!
//! Everything here is best effort: an unreadable file, a malformed line or
//! an unexpected shape degrades to `None` instead of an error.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use warden_core::SessionId;
use warden_core::text::clip;

/// Largest transcript read, in bytes.
const MAX_TRANSCRIPT_BYTES: u64 = 32 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Value,
}

impl Message {
    /// Text content: either a plain string or the joined `text` blocks.
    fn text(&self) -> Option<String> {
        let text = match &self.content {
            Value::String(s) => s.clone(),
            Value::Array(blocks) => blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => return None,
        };
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_owned())
    }
}

fn entries(path: &Path) -> Vec<Entry> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "transcript unreadable");
            return Vec::new();
        },
    };
    if file.metadata().is_ok_and(|m| m.len() > MAX_TRANSCRIPT_BYTES) {
        debug!(path = %path.display(), "transcript too large, skipped");
        return Vec::new();
    }
    BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(&line).ok())
        .collect()
}

/// The session's title: its summary entry, else its first user message.
#[must_use]
pub fn session_title(path: &Path) -> Option<String> {
    let entries = entries(path);
    let summary = entries
        .iter()
        .filter(|e| e.kind == "summary")
        .find_map(|e| e.summary.as_deref().map(str::trim).filter(|s| !s.is_empty()))
        .map(str::to_owned);
    summary.or_else(|| {
        entries
            .iter()
            .filter(|e| e.kind == "user")
            .find_map(|e| e.message.as_ref().and_then(Message::text))
    })
}

/// The last text the assistant wrote.
#[must_use]
pub fn last_assistant_text(path: &Path) -> Option<String> {
    entries(path)
        .iter()
        .rev()
        .filter(|e| e.kind == "assistant")
        .find_map(|e| e.message.as_ref().and_then(Message::text))
}

/// Thread title for a session: `"{cwd basename}: {title}"`.
///
/// Falls back to the first `fallback_len` characters of the session id when
/// no title is known, and drops the prefix when no cwd is known.
#[must_use]
pub fn display_title(
    session: &SessionId,
    cwd: Option<&Path>,
    title: Option<&str>,
    fallback_len: usize,
) -> String {
    let first_line = title
        .and_then(|t| t.lines().map(str::trim).find(|l| !l.is_empty()))
        .map(str::to_owned);
    let title = first_line.unwrap_or_else(|| clip(session.as_str(), fallback_len).to_owned());
    match cwd
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy())
        .filter(|n| !n.is_empty())
    {
        Some(dir) => format!("{dir}: {title}"),
        None => title,
    }
}
