//! Environment variable overrides and `.env` loading.
//!
//! Environment variables are the highest-precedence layer: a mapped
//! variable replaces whatever the files set. A `.env` file only supplies
//! variables the process environment does not already have; the process
//! environment itself is never modified.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// How a variable's text becomes a TOML value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnvKind {
    Text,
    Integer,
    /// Comma-separated list.
    List,
}

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: EnvKind,
}

/// All supported variables.
const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "DISCORD_CHANNEL_ID",
        field_path: "channel.destination",
        kind: EnvKind::Text,
    },
    EnvMapping {
        var_name: "DISCORD_TOKEN",
        field_path: "channel.token",
        kind: EnvKind::Text,
    },
    EnvMapping {
        var_name: "DISCORD_APPLICATION_ID",
        field_path: "channel.application_id",
        kind: EnvKind::Text,
    },
    EnvMapping {
        var_name: "WARDEN_ALLOWED_USERS",
        field_path: "channel.allowed_users",
        kind: EnvKind::List,
    },
    EnvMapping {
        var_name: "APPROVAL_TIMEOUT",
        field_path: "approval.timeout_secs",
        kind: EnvKind::Integer,
    },
    EnvMapping {
        var_name: "PORT",
        field_path: "server.port",
        kind: EnvKind::Integer,
    },
    EnvMapping {
        var_name: "WARDEN_HOST",
        field_path: "server.host",
        kind: EnvKind::Text,
    },
    EnvMapping {
        var_name: "WARDEN_SERVER_URL",
        field_path: "hook.server_url",
        kind: EnvKind::Text,
    },
    EnvMapping {
        var_name: "WARDEN_HOOK_LOG",
        field_path: "hook.log_file",
        kind: EnvKind::Text,
    },
    EnvMapping {
        var_name: "WARDEN_LOG_LEVEL",
        field_path: "logging.level",
        kind: EnvKind::Text,
    },
];

/// Apply mapped environment variables on top of the merged tree.
///
/// Empty values are ignored. Returns the number of variables applied.
///
/// # Errors
///
/// Returns [`ConfigError::EnvError`] if an integer variable does not parse.
pub fn apply_env_overrides<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<usize> {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        debug!(
            var = mapping.var_name,
            field = mapping.field_path,
            "applying env var override"
        );
        let value = coerce(mapping, raw)?;
        set_field(merged, mapping.field_path, value);
        count = count.saturating_add(1);
    }

    Ok(count)
}

fn coerce(mapping: &EnvMapping, raw: &str) -> ConfigResult<toml::Value> {
    Ok(match mapping.kind {
        EnvKind::Text => toml::Value::String(raw.to_owned()),
        EnvKind::Integer => {
            let n = raw.parse::<i64>().map_err(|e| ConfigError::EnvError {
                var_name: mapping.var_name.to_owned(),
                message: format!("expected an integer, got '{raw}': {e}"),
            })?;
            toml::Value::Integer(n)
        },
        EnvKind::List => toml::Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| toml::Value::String(s.to_owned()))
                .collect(),
        ),
    })
}

/// Set a dotted field, creating intermediate tables.
fn set_field(root: &mut toml::Value, path: &str, value: toml::Value) {
    let mut current = root;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        if segments.peek().is_none() {
            table.insert(segment.to_owned(), value);
            return;
        }
        current = table
            .entry(segment.to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
}

/// Read a `.env` file into a map. A missing file yields an empty map.
///
/// # Errors
///
/// Returns [`ConfigError::EnvError`] if the file exists but cannot be
/// parsed.
pub fn read_dotenv(path: &Path) -> ConfigResult<HashMap<String, String>> {
    let to_err = |e: dotenvy::Error| ConfigError::EnvError {
        var_name: path.display().to_string(),
        message: e.to_string(),
    };

    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), ".env not found, skipping");
            return Ok(HashMap::new());
        },
        Err(e) => return Err(to_err(e)),
    };

    let mut vars = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(to_err)?;
        vars.insert(key, value);
    }
    debug!(path = %path.display(), count = vars.len(), "loaded .env");
    Ok(vars)
}

/// Overlay `process` on top of `dotenv`: the process environment wins.
#[must_use]
pub fn layer_env(
    dotenv: HashMap<String, String>,
    process: HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged = dotenv;
    merged.extend(process);
    merged
}

/// Collect all current environment variables into a map.
///
/// Variables whose name or value is not valid Unicode are skipped.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}
