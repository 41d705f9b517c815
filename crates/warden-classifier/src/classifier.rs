//! The risk classifier.
//!
//! [`RiskClassifier::classify`] is a pure function of the invocation, the
//! working directory and the repository state found there. It never
//! fails: anything it cannot decide with confidence becomes
//! [`Verdict::NeedsApproval`].

use std::collections::BTreeSet;
use std::path::Path;

use tracing::debug;
use warden_core::{ToolInvocation, ToolKind, Verdict};

use crate::recovery::{GitCli, Unrecoverable, VersionControl, check_targets, deletion_targets};
use crate::rules::RuleSet;
use crate::shell::{Segment, inline_script, split_segments, substitutions};

/// Tools that run without asking when no rule says otherwise.
pub const DEFAULT_SAFE_TOOLS: &[&str] = &[
    "Read",
    "Write",
    "Edit",
    "MultiEdit",
    "NotebookEdit",
    "Glob",
    "Grep",
    "LS",
    "WebFetch",
    "WebSearch",
    "TodoWrite",
    "Task",
    "BashOutput",
    "KillShell",
    "ExitPlanMode",
];

/// Tools that ask the human a question.
pub const DEFAULT_QUESTION_TOOLS: &[&str] = &["AskUserQuestion"];

/// Programs that change the working directory for later segments.
const DIRECTORY_CHANGERS: &[&str] = &["cd", "pushd", "popd"];

/// Substitutions and `sh -c` scripts deeper than this need approval.
const MAX_NESTING: usize = 4;

/// Why the classifier reached its verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// A history-destroying pattern matched the whole command line.
    HistoryRewrite {
        /// Rule name.
        rule: String,
    },
    /// A deletion segment was shown to be recoverable.
    Recoverable {
        /// Rule name.
        rule: String,
        /// Segment text.
        segment: String,
    },
    /// A deletion segment could not be shown to be recoverable.
    Unrecoverable {
        /// Rule name.
        rule: String,
        /// Segment text.
        segment: String,
        /// Why.
        reason: Unrecoverable,
    },
    /// A deletion follows a directory change the classifier cannot follow.
    DirectoryChanged {
        /// Segment text.
        segment: String,
    },
    /// Command substitutions or `sh -c` scripts nest too deeply to inspect.
    NestingTooDeep {
        /// Innermost text that was not inspected.
        script: String,
    },
    /// The tool is not in the safe set.
    UnlistedTool(String),
    /// The tool asks the human a question.
    Question {
        /// Whether an out-of-band channel can carry it.
        reachable: bool,
    },
}

/// Verdict plus the findings that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    /// The verdict.
    pub verdict: Verdict,
    /// Supporting findings, in evaluation order.
    pub findings: Vec<Finding>,
}

impl Assessment {
    fn new(verdict: Verdict, findings: Vec<Finding>) -> Self {
        Self { verdict, findings }
    }
}

/// Decides which invocations may skip the approval round trip.
pub struct RiskClassifier<V = GitCli> {
    rules: RuleSet,
    safe_tools: BTreeSet<String>,
    question_tools: BTreeSet<String>,
    vcs: V,
}

impl<V: VersionControl> RiskClassifier<V> {
    /// Create a classifier with the default tool sets.
    #[must_use]
    pub fn new(rules: RuleSet, vcs: V) -> Self {
        Self {
            rules,
            safe_tools: DEFAULT_SAFE_TOOLS.iter().map(|s| (*s).to_owned()).collect(),
            question_tools: DEFAULT_QUESTION_TOOLS
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            vcs,
        }
    }

    /// Replace the always-safe tool set.
    #[must_use]
    pub fn with_safe_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.safe_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the question tool set.
    #[must_use]
    pub fn with_question_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.question_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// The rule set in use.
    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Classify an invocation.
    ///
    /// `channel_reachable` reports whether a human can be reached out of
    /// band; it only matters for question tools.
    #[must_use]
    pub fn classify(
        &self,
        invocation: &ToolInvocation,
        cwd: &Path,
        channel_reachable: bool,
    ) -> Verdict {
        self.assess(invocation, cwd, channel_reachable).verdict
    }

    /// Classify an invocation and report why.
    #[must_use]
    pub fn assess(
        &self,
        invocation: &ToolInvocation,
        cwd: &Path,
        channel_reachable: bool,
    ) -> Assessment {
        let name = invocation.tool_name();

        if invocation.kind() == ToolKind::Question || self.question_tools.contains(name) {
            let verdict = if channel_reachable {
                Verdict::NeedsApproval
            } else {
                Verdict::PassThrough
            };
            return Assessment::new(
                verdict,
                vec![Finding::Question {
                    reachable: channel_reachable,
                }],
            );
        }

        if let ToolInvocation::Shell { command, .. } = invocation {
            return self.assess_command(command, cwd);
        }

        if self.safe_tools.contains(name) {
            Assessment::new(Verdict::AutoAllow, Vec::new())
        } else {
            Assessment::new(
                Verdict::NeedsApproval,
                vec![Finding::UnlistedTool(name.to_owned())],
            )
        }
    }

    /// Classify a shell command line run from `cwd`.
    ///
    /// Command substitutions and `sh -c` scripts are classified as command
    /// lines of their own; any of them needing approval escalates the whole
    /// line.
    #[must_use]
    pub fn assess_command(&self, command: &str, cwd: &Path) -> Assessment {
        self.assess_nested(command, cwd, 0, false)
    }

    fn assess_nested(
        &self,
        command: &str,
        cwd: &Path,
        depth: usize,
        mut directory_changed: bool,
    ) -> Assessment {
        if depth > MAX_NESTING {
            return Assessment::new(
                Verdict::NeedsApproval,
                vec![Finding::NestingTooDeep {
                    script: command.to_owned(),
                }],
            );
        }

        if let Some(rule) = self.rules.history_rule(command) {
            debug!(rule = rule.name(), "history-destroying command");
            return Assessment::new(
                Verdict::NeedsApproval,
                vec![Finding::HistoryRewrite {
                    rule: rule.name().to_owned(),
                }],
            );
        }

        let mut findings = Vec::new();
        let inner_depth = depth.saturating_add(1);

        for body in substitutions(command) {
            let inner = self.assess_nested(body, cwd, inner_depth, directory_changed);
            findings.extend(inner.findings);
            if inner.verdict == Verdict::NeedsApproval {
                return Assessment::new(Verdict::NeedsApproval, findings);
            }
        }

        for text in split_segments(command) {
            let segment = Segment::parse(text);
            let Some(program) = segment.program.as_deref() else {
                continue;
            };

            if DIRECTORY_CHANGERS.contains(&program) {
                directory_changed = true;
                continue;
            }

            if let Some(script) = segment
                .args
                .as_deref()
                .and_then(|args| inline_script(program, args))
            {
                let inner = self.assess_nested(script, cwd, inner_depth, directory_changed);
                findings.extend(inner.findings);
                if inner.verdict == Verdict::NeedsApproval {
                    return Assessment::new(Verdict::NeedsApproval, findings);
                }
                continue;
            }

            let Some(rule) = self.rules.deletion_rule(program) else {
                continue;
            };

            if directory_changed {
                findings.push(Finding::DirectoryChanged {
                    segment: text.to_owned(),
                });
                return Assessment::new(Verdict::NeedsApproval, findings);
            }

            match self.segment_recoverability(&segment, program, cwd) {
                Ok(()) => findings.push(Finding::Recoverable {
                    rule: rule.name().to_owned(),
                    segment: text.to_owned(),
                }),
                Err(reason) => {
                    debug!(segment = text, %reason, "deletion not recoverable");
                    findings.push(Finding::Unrecoverable {
                        rule: rule.name().to_owned(),
                        segment: text.to_owned(),
                        reason,
                    });
                    return Assessment::new(Verdict::NeedsApproval, findings);
                },
            }
        }

        Assessment::new(Verdict::AutoAllow, findings)
    }

    fn segment_recoverability(
        &self,
        segment: &Segment<'_>,
        program: &str,
        cwd: &Path,
    ) -> Result<(), Unrecoverable> {
        let Some(args) = segment.args.as_deref() else {
            return Err(Unrecoverable::Unparsable);
        };
        if segment.stdin_args {
            return Err(Unrecoverable::StdinTargets);
        }
        let targets = deletion_targets(program, args);
        check_targets(&self.vcs, cwd, &targets)
    }
}
