//! Destructive command rules.
//!
//! A [`DestructiveCommandRule`] is either a set of program names (plain
//! deletion commands, whose effect may still be recoverable) or a regular
//! expression over the whole command line (history-destroying version
//! control operations, which always need a human). The built-in set is
//! plain data in [`BUILTIN_RULES`] so it can be reviewed and tested on
//! its own.

use regex::Regex;
use std::collections::BTreeSet;

use crate::error::{ClassifierError, ClassifierResult};

/// Static description of a rule, compiled by [`RuleSet::from_specs`].
#[derive(Debug, Clone, Copy)]
pub struct RuleSpec {
    /// Stable rule name, used in logs.
    pub name: &'static str,
    /// What the rule matches.
    pub matcher: MatcherSpec,
}

/// Static matcher description.
#[derive(Debug, Clone, Copy)]
pub enum MatcherSpec {
    /// Base program name is one of these.
    Commands(&'static [&'static str]),
    /// Full command line has an occurrence of `pattern` that `unless`
    /// does not also match at the same position.
    Pattern {
        /// Regex that must match.
        pattern: &'static str,
        /// Regex that vetoes a match.
        unless: Option<&'static str>,
    },
}

/// Rules shipped with Warden.
pub const BUILTIN_RULES: &[RuleSpec] = &[
    RuleSpec {
        name: "delete-files",
        matcher: MatcherSpec::Commands(&["rm", "rmdir", "shred", "unlink"]),
    },
    RuleSpec {
        name: "git-clean",
        matcher: MatcherSpec::Pattern {
            pattern: r"\bgit\s+clean\b",
            unless: None,
        },
    },
    RuleSpec {
        name: "git-reset-hard",
        matcher: MatcherSpec::Pattern {
            pattern: r"\bgit\s+reset\s+--hard\b",
            unless: None,
        },
    },
    RuleSpec {
        name: "git-push-force",
        matcher: MatcherSpec::Pattern {
            pattern: r"\bgit\s+push\s+.*--force\b",
            unless: None,
        },
    },
    RuleSpec {
        name: "git-push-f",
        matcher: MatcherSpec::Pattern {
            pattern: r"\bgit\s+push\s+.*-f\b",
            unless: None,
        },
    },
    RuleSpec {
        name: "git-branch-delete",
        matcher: MatcherSpec::Pattern {
            pattern: r"\bgit\s+branch\s+.*-[dD]\b",
            unless: None,
        },
    },
    RuleSpec {
        name: "git-checkout-discard",
        matcher: MatcherSpec::Pattern {
            pattern: r"\bgit\s+checkout\s+--\s",
            unless: None,
        },
    },
    RuleSpec {
        name: "git-restore-discard",
        matcher: MatcherSpec::Pattern {
            pattern: r"\bgit\s+restore\s+",
            unless: Some(r"\bgit\s+restore\s+--staged\b"),
        },
    },
];

/// Compiled matcher.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Membership of the base program name.
    CommandName(BTreeSet<String>),
    /// Regex over the full command line with an optional per-occurrence veto.
    Pattern {
        /// Regex that must match.
        pattern: Regex,
        /// Regex that vetoes a match.
        unless: Option<Regex>,
    },
}

/// A named, stateless matcher for destructive commands.
#[derive(Debug, Clone)]
pub struct DestructiveCommandRule {
    name: String,
    matcher: Matcher,
}

impl DestructiveCommandRule {
    /// Rule matching any of the given program names.
    #[must_use]
    pub fn command_names<I, S>(name: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            matcher: Matcher::CommandName(names.into_iter().map(Into::into).collect()),
        }
    }

    /// Rule matching a regex over the full command line.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::InvalidPattern`] if the regex does not compile.
    pub fn pattern(name: impl Into<String>, pattern: &str) -> ClassifierResult<Self> {
        let name = name.into();
        let pattern = compile(&name, pattern)?;
        Ok(Self {
            name,
            matcher: Matcher::Pattern {
                pattern,
                unless: None,
            },
        })
    }

    /// Add a veto regex to a pattern rule. No effect on name rules.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::InvalidPattern`] if the regex does not compile.
    pub fn unless(mut self, veto: &str) -> ClassifierResult<Self> {
        let compiled = compile(&self.name, veto)?;
        if let Matcher::Pattern { unless, .. } = &mut self.matcher {
            *unless = Some(compiled);
        }
        Ok(self)
    }

    /// Rule name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The compiled matcher.
    #[must_use]
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Whether this is a program-name (deletion) rule.
    #[must_use]
    pub fn is_command_rule(&self) -> bool {
        matches!(self.matcher, Matcher::CommandName(_))
    }

    /// Whether a base program name triggers this rule.
    #[must_use]
    pub fn matches_program(&self, program: &str) -> bool {
        match &self.matcher {
            Matcher::CommandName(names) => names.contains(program),
            Matcher::Pattern { .. } => false,
        }
    }

    /// Whether a full command line triggers this rule.
    #[must_use]
    pub fn matches_line(&self, line: &str) -> bool {
        match &self.matcher {
            Matcher::CommandName(_) => false,
            Matcher::Pattern { pattern, unless: None } => pattern.is_match(line),
            // The veto only cancels the occurrence it starts at.
            Matcher::Pattern {
                pattern,
                unless: Some(veto),
            } => pattern.find_iter(line).any(|m| {
                veto.find_at(line, m.start())
                    .is_none_or(|v| v.start() != m.start())
            }),
        }
    }
}

fn compile(name: &str, pattern: &str) -> ClassifierResult<Regex> {
    Regex::new(pattern).map_err(|source| ClassifierError::InvalidPattern {
        name: name.to_owned(),
        source,
    })
}

/// An ordered collection of rules, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<DestructiveCommandRule>,
}

impl RuleSet {
    /// Compile a set of static rule descriptions.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::InvalidPattern`] for the first rule whose
    /// regex does not compile.
    pub fn from_specs(specs: &[RuleSpec]) -> ClassifierResult<Self> {
        let mut rules = Vec::with_capacity(specs.len());
        for spec in specs {
            let rule = match spec.matcher {
                MatcherSpec::Commands(names) => {
                    DestructiveCommandRule::command_names(spec.name, names.iter().copied())
                },
                MatcherSpec::Pattern { pattern, unless } => {
                    let rule = DestructiveCommandRule::pattern(spec.name, pattern)?;
                    match unless {
                        Some(veto) => rule.unless(veto)?,
                        None => rule,
                    }
                },
            };
            rules.push(rule);
        }
        Ok(Self { rules })
    }

    /// The built-in rules.
    ///
    /// # Errors
    ///
    /// Only fails if [`BUILTIN_RULES`] itself contains a bad regex.
    pub fn builtin() -> ClassifierResult<Self> {
        Self::from_specs(BUILTIN_RULES)
    }

    /// Append a rule.
    #[must_use]
    pub fn with_rule(mut self, rule: DestructiveCommandRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// All rules in order.
    #[must_use]
    pub fn rules(&self) -> &[DestructiveCommandRule] {
        &self.rules
    }

    /// The first program-name rule matching `program`.
    #[must_use]
    pub fn deletion_rule(&self, program: &str) -> Option<&DestructiveCommandRule> {
        self.rules.iter().find(|r| r.matches_program(program))
    }

    /// The first pattern rule matching the full command line.
    #[must_use]
    pub fn history_rule(&self, line: &str) -> Option<&DestructiveCommandRule> {
        self.rules.iter().find(|r| r.matches_line(line))
    }
}
