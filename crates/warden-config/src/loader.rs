//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` into the base tree
//! 2. Merge the user file (`~/.config/warden/config.toml`)
//! 3. Merge the explicit `--config` file
//! 4. Apply environment overrides (process env over `.env`)
//! 5. Deserialize, normalize, validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_overrides, collect_env_vars, layer_env, read_dotenv};
use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Where configuration comes from.
///
/// [`LoadOptions::default`] uses only the embedded defaults and the process
/// environment. [`LoadOptions::discover`] adds the user file and `.env` in
/// the working directory.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// User-level config file, skipped when absent.
    pub user_config: Option<PathBuf>,
    /// Explicit config file, which must exist.
    pub config_file: Option<PathBuf>,
    /// `.env` file, skipped when absent.
    pub dotenv: Option<PathBuf>,
    /// Environment to read instead of the process environment.
    pub env: Option<HashMap<String, String>>,
}

impl LoadOptions {
    /// Standard discovery for the current user and working directory.
    #[must_use]
    pub fn discover() -> Self {
        Self {
            user_config: user_config_path(),
            config_file: None,
            dotenv: std::env::current_dir().ok().map(|d| d.join(".env")),
            env: None,
        }
    }

    /// Add an explicit config file.
    #[must_use]
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Use `env` instead of the process environment.
    #[must_use]
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    /// Read `.env` from `path`.
    #[must_use]
    pub fn with_dotenv(mut self, path: impl Into<PathBuf>) -> Self {
        self.dotenv = Some(path.into());
        self
    }
}

/// Loaded configuration plus the files that contributed to it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The final configuration.
    pub config: Config,
    /// Files merged over the defaults, in order.
    pub loaded_files: Vec<String>,
}

/// `~/.config/warden/config.toml` or the platform equivalent.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "warden").map(|d| d.config_dir().join("config.toml"))
}

/// Load configuration with layered precedence.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, the explicit
/// file is missing, an environment value is malformed, or the final
/// configuration fails validation.
pub fn load(options: &LoadOptions) -> ConfigResult<LoadedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;
    let mut loaded_files = Vec::new();

    if let Some(path) = options.user_config.as_deref()
        && let Some(overlay) = try_load_file(path)?
    {
        deep_merge(&mut merged, &overlay);
        loaded_files.push(path.display().to_string());
        info!(path = %path.display(), "loaded user config");
    }

    if let Some(path) = options.config_file.as_deref() {
        let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })?;
        deep_merge(&mut merged, &overlay);
        loaded_files.push(path.display().to_string());
        info!(path = %path.display(), "loaded config file");
    }

    let dotenv = match options.dotenv.as_deref() {
        Some(path) => read_dotenv(path)?,
        None => HashMap::new(),
    };
    let process = options.env.clone().unwrap_or_else(collect_env_vars);
    let env_vars = layer_env(dotenv, process);

    let env_count = apply_env_overrides(&mut merged, &env_vars)?;
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable overrides");
    }

    let mut config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    validate::normalize(&mut config);
    validate::validate(&config)?;

    Ok(LoadedConfig {
        config,
        loaded_files,
    })
}

/// Load a config from a single file over the defaults, without environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let options = LoadOptions {
        config_file: Some(path.to_path_buf()),
        env: Some(HashMap::new()),
        ..LoadOptions::default()
    };
    load(&options).map(|loaded| loaded.config)
}

/// Try to load a file, returning `None` if the file doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {} byte limit",
                content.len(),
                MAX_CONFIG_FILE_SIZE
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

/// Recursively deep-merge `overlay` into `base`.
///
/// Tables merge per field; scalars and arrays from the overlay replace the
/// base value.
pub fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
        },
    }
}
