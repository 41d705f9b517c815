//! Subscriber setup.
//!
//! Only two shapes exist. `wardend` writes to stderr in the format the
//! operator picked. `warden-hook` appends compact, uncoloured lines to a
//! file, because its stdout is the decision the agent reads. There is no
//! stdout target for that reason.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    filter::Directive,
    fmt::{self, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::{TelemetryError, TelemetryResult};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, coloured on a terminal.
    #[default]
    Pretty,
    /// One line per event.
    Compact,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Accepted spellings, for error messages and `--help`.
    pub const NAMES: &'static [&'static str] = &["pretty", "compact", "json"];
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(TelemetryError::UnknownFormat(other.to_owned())),
        }
    }
}

/// Where events go.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogTarget {
    /// The broker's terminal.
    #[default]
    Stderr,
    /// Appended to this file; the directory is created on setup.
    File(PathBuf),
}

/// Logging configuration for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Base filter, e.g. `info` or `warden_broker=debug`. `RUST_LOG` wins.
    pub level: String,
    /// Line format.
    pub format: LogFormat,
    /// Destination.
    pub target: LogTarget,
    /// Extra directives added on top of the base filter.
    pub directives: Vec<String>,
}

impl LogConfig {
    /// Stderr, pretty, at `level`.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::default(),
            target: LogTarget::default(),
            directives: Vec::new(),
        }
    }

    /// The hook's debug log: compact lines appended to `path`.
    #[must_use]
    pub fn hook_file(level: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(level)
            .with_format(LogFormat::Compact)
            .with_target(LogTarget::File(path.into()))
    }

    /// Set the line format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the destination.
    #[must_use]
    pub fn with_target(mut self, target: LogTarget) -> Self {
        self.target = target;
        self
    }

    /// Add a directive such as `warden_discord=trace`.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Colour only pretty or compact output on stderr.
    fn ansi(&self) -> bool {
        self.target == LogTarget::Stderr && self.format != LogFormat::Json
    }

    fn build_filter(&self) -> TelemetryResult<EnvFilter> {
        let mut filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&self.level)
                .map_err(|e| TelemetryError::InvalidFilter(format!("{}: {e}", self.level)))?,
        };
        for directive in &self.directives {
            let parsed = directive
                .parse::<Directive>()
                .map_err(|e| TelemetryError::InvalidFilter(format!("{directive}: {e}")))?;
            filter = filter.add_directive(parsed);
        }
        Ok(filter)
    }

    fn make_writer(&self) -> TelemetryResult<BoxMakeWriter> {
        Ok(match &self.target {
            LogTarget::Stderr => BoxMakeWriter::new(std::io::stderr),
            LogTarget::File(path) => BoxMakeWriter::new(append_to(path)?),
        })
    }

    fn fmt_layer(&self, writer: BoxMakeWriter) -> BoxedLayer {
        let base = fmt::layer().with_writer(writer).with_ansi(self.ansi());
        match self.format {
            LogFormat::Pretty => base.pretty().boxed(),
            LogFormat::Compact => base.compact().boxed(),
            LogFormat::Json => base.json().boxed(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("info")
    }
}

/// A never-rotating appender for `path`, creating its directory.
fn append_to(path: &Path) -> TelemetryResult<RollingFileAppender> {
    let log_file = |reason: String| TelemetryError::LogFile {
        path: path.to_path_buf(),
        reason,
    };
    let name = path
        .file_name()
        .ok_or_else(|| log_file("path has no file name".into()))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| log_file(e.to_string()))?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name.to_string_lossy())
        .build(dir)
        .map_err(|e| log_file(e.to_string()))
}

/// Install the global subscriber.
///
/// # Errors
///
/// An invalid filter, an unusable log file, or a subscriber that is
/// already installed.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.build_filter()?;
    let writer = config.make_writer()?;
    tracing_subscriber::registry()
        .with(config.fmt_layer(writer))
        .with(filter)
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))
}
