//! Warden Classifier - decides which tool invocations need a human.
//!
//! The classifier runs inside the hook process, before any network call.
//! It auto-allows safe tools and shell commands whose destructive effects
//! can be undone from version control, and escalates everything else.
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use warden_classifier::{GitCli, RiskClassifier, RuleSet};
//! use warden_core::{ToolInvocation, Verdict};
//!
//! let classifier = RiskClassifier::new(RuleSet::builtin().unwrap(), GitCli::default());
//! let invocation = ToolInvocation::from_wire(
//!     "Bash",
//!     &serde_json::json!({ "command": "git push --force origin main" }),
//! );
//! assert_eq!(
//!     classifier.classify(&invocation, Path::new("."), true),
//!     Verdict::NeedsApproval,
//! );
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod classifier;
pub mod error;
pub mod recovery;
pub mod rules;
pub mod shell;

pub use classifier::{
    Assessment, DEFAULT_QUESTION_TOOLS, DEFAULT_SAFE_TOOLS, Finding, RiskClassifier,
};
pub use error::{ClassifierError, ClassifierResult};
pub use recovery::{GitCli, Unrecoverable, VersionControl};
pub use rules::{BUILTIN_RULES, DestructiveCommandRule, RuleSet, RuleSpec};
