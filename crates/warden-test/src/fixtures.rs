//! Fixtures for envelopes and throwaway git repositories.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::{Value, json};
use tempfile::TempDir;
use warden_core::{ApproveRequest, StopNotice};

/// An `/approve` body for an arbitrary tool.
#[must_use]
pub fn approve_request(request_id: &str, session_id: &str, tool: &str, input: Value) -> ApproveRequest {
    ApproveRequest {
        request_id: Some(request_id.to_owned()),
        tool_name: tool.to_owned(),
        tool_input: input,
        session_id: session_id.to_owned(),
        ..ApproveRequest::default()
    }
}

/// An `/approve` body for a shell command.
#[must_use]
pub fn bash_request(request_id: &str, session_id: &str, command: &str) -> ApproveRequest {
    approve_request(request_id, session_id, "Bash", json!({ "command": command }))
}

/// An `/approve` body asking one question with the given options.
#[must_use]
pub fn question_request(request_id: &str, session_id: &str, options: &[&str]) -> ApproveRequest {
    let options: Vec<Value> = options.iter().map(|o| json!({ "label": o })).collect();
    approve_request(
        request_id,
        session_id,
        "AskUserQuestion",
        json!({ "questions": [{ "question": "Which one?", "options": options }] }),
    )
}

/// An `/approve` body asking several questions.
#[must_use]
pub fn multi_question_request(
    request_id: &str,
    session_id: &str,
    questions: &[(&str, &[&str], bool)],
) -> ApproveRequest {
    let questions: Vec<Value> = questions
        .iter()
        .map(|(q, options, multi)| {
            json!({
                "question": q,
                "options": options.iter().map(|o| json!({ "label": o })).collect::<Vec<_>>(),
                "multiSelect": multi,
            })
        })
        .collect();
    approve_request(
        request_id,
        session_id,
        "AskUserQuestion",
        json!({ "questions": questions }),
    )
}

/// A `/notify-stop` body.
#[must_use]
pub fn stop_notice(session_id: &str) -> StopNotice {
    StopNotice {
        session_id: session_id.to_owned(),
        ..StopNotice::default()
    }
}

/// A git repository in a temporary directory.
///
/// Dropped with the directory.
#[derive(Debug)]
pub struct GitRepo {
    dir: TempDir,
}

impl GitRepo {
    /// Initialise an empty repository. `None` when git is not installed.
    #[must_use]
    pub fn init() -> Option<Self> {
        let dir = TempDir::new().ok()?;
        let repo = Self { dir };
        repo.try_git(&["init", "-q"])?;
        repo.try_git(&["config", "user.email", "warden@example.com"])?;
        repo.try_git(&["config", "user.name", "Warden Test"])?;
        repo.try_git(&["config", "commit.gpgsign", "false"])?;
        Some(repo)
    }

    /// Repository root.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of `rel` inside the repository.
    #[must_use]
    pub fn join(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Write a file, creating parent directories.
    ///
    /// # Panics
    ///
    /// If the file cannot be written.
    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("mkdir {rel}: {e}"));
        }
        std::fs::write(&path, contents).unwrap_or_else(|e| panic!("write {rel}: {e}"));
    }

    /// Stage everything and commit.
    ///
    /// # Panics
    ///
    /// If git fails.
    pub fn commit_all(&self, message: &str) {
        self.git(&["add", "-A"]);
        self.git(&["commit", "-q", "-m", message]);
    }

    /// Run git in the repository and return stdout.
    ///
    /// # Panics
    ///
    /// If git fails.
    pub fn git(&self, args: &[&str]) -> String {
        self.try_git(args)
            .unwrap_or_else(|| panic!("git {} failed", args.join(" ")))
    }

    fn try_git(&self, args: &[&str]) -> Option<String> {
        let out = Command::new("git")
            .args(args)
            .current_dir(self.dir.path())
            .output()
            .ok()?;
        out.status
            .success()
            .then(|| String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::ToolInvocation;

    #[test]
    fn bash_request_shape() {
        let req = bash_request("r1", "s1", "ls");
        assert_eq!(req.request_id.as_deref(), Some("r1"));
        assert_eq!(req.tool_input["command"], "ls");
        assert_eq!(req.invocation().tool_name(), "Bash");
    }

    #[test]
    fn question_request_parses_as_questions() {
        let req = question_request("r1", "s1", &["A", "B"]);
        let inv = ToolInvocation::from_wire(&req.tool_name, &req.tool_input);
        assert_eq!(inv.questions().len(), 1);
        assert_eq!(inv.questions()[0].options.len(), 2);
    }

    #[test]
    fn git_repo_commits() {
        let Some(repo) = GitRepo::init() else {
            return;
        };
        repo.write("src/a.txt", "a");
        repo.commit_all("init");
        assert!(repo.git(&["ls-files"]).contains("src/a.txt"));
    }
}
