//! Post-merge normalization and validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Config, loopback_ip};

/// Largest thread name the channel accepts.
const THREAD_NAME_LIMIT: usize = 100;

/// Accepted `logging.format` values.
const LOG_FORMATS: &[&str] = &["pretty", "compact", "json", "full"];

/// Reduce a channel reference to its id.
///
/// A bare id is returned trimmed. A URL yields its last non-empty path
/// segment, so `https://discord.com/channels/1/2` becomes `2`.
#[must_use]
pub fn normalize_destination(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(parsed) = url::Url::parse(trimmed)
        && parsed.has_host()
    {
        if let Some(last) = parsed
            .path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        {
            return last.to_owned();
        }
        return String::new();
    }
    trimmed
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_owned()
}

/// Normalize fields that accept several spellings.
pub fn normalize(config: &mut Config) {
    if let Some(dest) = config.channel.destination.as_mut() {
        *dest = normalize_destination(dest);
    }
    config.channel.allowed_users = std::mem::take(&mut config.channel.allowed_users)
        .into_iter()
        .map(|u| u.trim().to_owned())
        .filter(|u| !u.is_empty())
        .collect();
}

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_channel(config)?;
    validate_approval(config)?;
    validate_server(config)?;
    validate_hook(config)?;
    validate_session(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_channel(config: &Config) -> ConfigResult<()> {
    if let Some(dest) = config.channel.destination.as_deref()
        && !dest.is_empty()
        && !dest.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid(
            "channel.destination",
            format!("'{dest}' is not a numeric channel id"),
        ));
    }
    if let Some(user) = config
        .channel
        .allowed_users
        .iter()
        .find(|u| !u.trim().bytes().all(|b| b.is_ascii_digit()))
    {
        return Err(invalid(
            "channel.allowed_users",
            format!("'{user}' is not a numeric user id"),
        ));
    }
    Ok(())
}

fn validate_approval(config: &Config) -> ConfigResult<()> {
    if config.approval.timeout_secs == 0 {
        return Err(invalid("approval.timeout_secs", "must be greater than zero"));
    }
    Ok(())
}

fn validate_server(config: &Config) -> ConfigResult<()> {
    if config.server.port == 0 {
        return Err(invalid("server.port", "must be non-zero"));
    }
    if loopback_ip(&config.server.host).is_none() {
        return Err(invalid(
            "server.host",
            format!(
                "'{}' is not a loopback address; the broker only listens locally",
                config.server.host
            ),
        ));
    }
    Ok(())
}

fn validate_hook(config: &Config) -> ConfigResult<()> {
    let Some(raw) = config.hook.server_url.as_deref() else {
        return Ok(());
    };
    if raw.trim().is_empty() {
        return Ok(());
    }
    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| invalid("hook.server_url", format!("'{raw}' is not a URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(
            "hook.server_url",
            format!("unsupported scheme '{}'", parsed.scheme()),
        ));
    }
    Ok(())
}

fn validate_session(config: &Config) -> ConfigResult<()> {
    let s = &config.session;
    if s.thread_name_max == 0 || s.thread_name_max > THREAD_NAME_LIMIT {
        return Err(invalid(
            "session.thread_name_max",
            format!("must be between 1 and {THREAD_NAME_LIMIT}"),
        ));
    }
    if s.id_fallback_len == 0 {
        return Err(invalid("session.id_fallback_len", "must be greater than zero"));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    if !LOG_FORMATS.contains(&config.logging.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported format '{}'; expected one of: {}",
                config.logging.format,
                LOG_FORMATS.join(", ")
            ),
        ));
    }
    Ok(())
}
