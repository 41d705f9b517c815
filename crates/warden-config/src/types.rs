//! Configuration struct definitions.
//!
//! Every section derives `Default` with the same values as the embedded
//! `defaults.toml`, so a partially written file still deserializes.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Default broker port.
pub const DEFAULT_PORT: u16 = 19280;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Notification channel.
    pub channel: ChannelSection,
    /// Approval timing.
    pub approval: ApprovalSection,
    /// HTTP listener.
    pub server: ServerSection,
    /// Local risk classifier.
    pub classifier: ClassifierSection,
    /// Hook client.
    pub hook: HookSection,
    /// Session display.
    pub session: SessionSection,
    /// Logging.
    pub logging: LoggingSection,
}

/// Notification channel settings.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChannelSection {
    /// Channel id (URLs are normalized to their last path segment).
    pub destination: Option<String>,
    /// Bot token.
    pub token: Option<String>,
    /// Application id, used for interaction follow-ups when set.
    pub application_id: Option<String>,
    /// Users allowed to answer prompts. Empty allows everyone.
    pub allowed_users: Vec<String>,
}

impl std::fmt::Debug for ChannelSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSection")
            .field("destination", &self.destination)
            .field("has_token", &self.token.is_some())
            .field("application_id", &self.application_id)
            .field("allowed_users", &self.allowed_users)
            .finish()
    }
}

impl Serialize for ChannelSection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ChannelSection", 3)?;
        state.serialize_field("destination", &self.destination)?;
        // token is omitted.
        state.serialize_field("application_id", &self.application_id)?;
        state.serialize_field("allowed_users", &self.allowed_users)?;
        state.end()
    }
}

/// Destination and token, both present.
#[derive(Clone, Copy)]
pub struct ChannelCredentials<'a> {
    /// Normalized channel id.
    pub destination: &'a str,
    /// Bot token.
    pub token: &'a str,
}

impl ChannelSection {
    /// Destination and token, or the first one missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] naming the unset field.
    pub fn credentials(&self) -> ConfigResult<ChannelCredentials<'_>> {
        let destination = non_empty(self.destination.as_deref()).ok_or_else(|| {
            ConfigError::MissingField {
                field: "channel.destination".to_owned(),
                hint: "DISCORD_CHANNEL_ID".to_owned(),
            }
        })?;
        let token =
            non_empty(self.token.as_deref()).ok_or_else(|| ConfigError::MissingField {
                field: "channel.token".to_owned(),
                hint: "DISCORD_TOKEN".to_owned(),
            })?;
        Ok(ChannelCredentials { destination, token })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Approval timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalSection {
    /// Seconds the broker waits for a human.
    pub timeout_secs: u64,
    /// Extra seconds before the waiter gives up.
    pub grace_secs: u64,
    /// Extra seconds the hook adds to its HTTP timeout.
    pub client_margin_secs: u64,
}

impl Default for ApprovalSection {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            grace_secs: 5,
            client_margin_secs: 30,
        }
    }
}

impl ApprovalSection {
    /// The human-facing approval timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The broker-side wait: timeout plus grace.
    #[must_use]
    pub fn broker_wait(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.saturating_add(self.grace_secs))
    }

    /// The hook's HTTP timeout: broker wait plus margin.
    #[must_use]
    pub fn client_timeout(&self) -> Duration {
        self.broker_wait()
            .saturating_add(Duration::from_secs(self.client_margin_secs))
    }
}

/// HTTP listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Bind host. Must be a loopback address or `localhost`.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerSection {
    /// The bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if the host is not a
    /// loopback address.
    pub fn socket_addr(&self) -> ConfigResult<SocketAddr> {
        let ip = loopback_ip(&self.host).ok_or_else(|| ConfigError::ValidationError {
            field: "server.host".to_owned(),
            message: format!("'{}' is not a loopback address", self.host),
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// `http://host:port`.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Parse `host` as a loopback IP; `localhost` maps to `127.0.0.1`.
pub(crate) fn loopback_ip(host: &str) -> Option<IpAddr> {
    if host.eq_ignore_ascii_case("localhost") {
        return Some(IpAddr::from([127, 0, 0, 1]));
    }
    host.parse::<IpAddr>().ok().filter(IpAddr::is_loopback)
}

/// Local classifier settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSection {
    /// Tools auto-allowed unless a rule says otherwise.
    pub safe_tools: Vec<String>,
    /// Tools that ask the human a question.
    pub question_tools: Vec<String>,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            safe_tools: [
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
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
            question_tools: vec!["AskUserQuestion".to_owned()],
        }
    }
}

/// Hook client settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookSection {
    /// Broker base URL.
    pub server_url: Option<String>,
    /// Debug log file.
    pub log_file: Option<PathBuf>,
}

impl HookSection {
    /// The broker URL, falling back to the server section.
    #[must_use]
    pub fn server_url(&self, server: &ServerSection) -> String {
        self.server_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map_or_else(|| server.base_url(), |u| u.trim_end_matches('/').to_owned())
    }

    /// The debug log path, defaulting to the temp directory.
    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("warden-hook.log"))
    }
}

/// Session display settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Maximum thread name length in characters.
    pub thread_name_max: usize,
    /// Characters of the session id used when no title is known.
    pub id_fallback_len: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            thread_name_max: 100,
            id_fallback_len: 8,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Filter directive, e.g. `info` or `warden_broker=debug`.
    pub level: String,
    /// One of `pretty`, `compact` or `json`.
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "pretty".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_debug_redacts_token() {
        let section = ChannelSection {
            token: Some("secret-token".into()),
            ..ChannelSection::default()
        };
        let debug = format!("{section:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("has_token: true"));
    }

    #[test]
    fn channel_serialize_omits_token() {
        let section = ChannelSection {
            token: Some("secret-token".into()),
            ..ChannelSection::default()
        };
        let out = toml::to_string(&section).unwrap();
        assert!(!out.contains("secret-token"));
        assert!(!out.contains("token"));
    }

    #[test]
    fn credentials_report_missing_fields() {
        let mut section = ChannelSection::default();
        assert!(matches!(
            section.credentials(),
            Err(ConfigError::MissingField { field, .. }) if field == "channel.destination"
        ));
        section.destination = Some("123".into());
        section.token = Some("  ".into());
        assert!(matches!(
            section.credentials(),
            Err(ConfigError::MissingField { field, .. }) if field == "channel.token"
        ));
        section.token = Some("t".into());
        let creds = section.credentials().unwrap();
        assert_eq!(creds.destination, "123");
        assert_eq!(creds.token, "t");
    }

    #[test]
    fn approval_durations_stack() {
        let a = ApprovalSection::default();
        assert_eq!(a.timeout(), Duration::from_secs(300));
        assert_eq!(a.broker_wait(), Duration::from_secs(305));
        assert_eq!(a.client_timeout(), Duration::from_secs(335));
    }

    #[test]
    fn server_socket_addr_requires_loopback() {
        let mut s = ServerSection::default();
        assert_eq!(s.socket_addr().unwrap().to_string(), "127.0.0.1:19280");
        s.host = "localhost".into();
        assert!(s.socket_addr().is_ok());
        s.host = "::1".into();
        assert!(s.socket_addr().is_ok());
        s.host = "0.0.0.0".into();
        assert!(s.socket_addr().is_err());
    }

    #[test]
    fn hook_url_falls_back_to_server() {
        let server = ServerSection {
            host: "127.0.0.1".into(),
            port: 4000,
        };
        let mut hook = HookSection::default();
        assert_eq!(hook.server_url(&server), "http://127.0.0.1:4000");
        hook.server_url = Some("http://localhost:5000/".into());
        assert_eq!(hook.server_url(&server), "http://localhost:5000");
    }
}
