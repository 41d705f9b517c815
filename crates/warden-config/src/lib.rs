#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Layered configuration for Warden.
//!
//! # Usage
//!
//! ```rust,no_run
//! use warden_config::{Config, LoadOptions};
//!
//! let loaded = Config::load(&LoadOptions::discover()).unwrap();
//! println!("listening on {}", loaded.config.server.base_url());
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Process environment** (`DISCORD_TOKEN`, `DISCORD_CHANNEL_ID`, `PORT`, ...)
//! 2. **`.env`** in the working directory, for variables the process lacks
//! 3. **Explicit file** passed with `--config`
//! 4. **User file** (`~/.config/warden/config.toml`)
//! 5. **Embedded defaults** (`defaults.toml` compiled into the binary)

/// Environment variable overrides and `.env` loading.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Normalization and validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{LoadOptions, LoadedConfig};
pub use types::*;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load(options: &LoadOptions) -> ConfigResult<LoadedConfig> {
        loader::load(options)
    }

    /// Load configuration from a single file over the defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
