//! Configuration loading and config file resolution
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`<config_dir>/cpn/<file_name>`)
//! 4. None (compiled defaults are used)
//!
//! Secrets may be supplied directly (`NAME=value`) or through a file
//! (`NAME_FILE=/run/secrets/name`); see [`env_or_file`].

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory name under the platform config dir
const CONFIG_DIR_NAME: &str = "cpn";

/// Logging configuration shared by all services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is not set ("trace".."error")
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Resolve the config file path.
///
/// Returns `None` when neither an explicit path was given nor a platform
/// default file exists. An explicit path (CLI or ENV) is returned even if
/// the file is missing so the caller can warn about it.
pub fn resolve_config_path(
    cli_arg: Option<&str>,
    env_var_name: &str,
    file_name: &str,
) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Some(path) = env_var(env_var_name) {
        return Some(PathBuf::from(path));
    }

    // Priority 3: Platform config directory
    let default_path = default_config_path(file_name)?;
    if default_path.exists() {
        Some(default_path)
    } else {
        debug!(path = %default_path.display(), "No config file at default location");
        None
    }
}

/// Platform default config file path (`~/.config/cpn/<file_name>` on Linux)
pub fn default_config_path(file_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(file_name))
}

/// Load a TOML config file, falling back to defaults when the file is missing.
///
/// A missing file is not an error (warning + defaults). A file that exists
/// but cannot be read or parsed is an error.
pub fn load_toml_or_default<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        return Ok(T::default());
    };

    if !path.exists() {
        warn!(
            path = %path.display(),
            "Config file not found, using compiled defaults"
        );
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML {} failed: {}", path.display(), e)))
}

/// Read a non-empty, trimmed environment variable
pub fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read a secret from `key`, or from the file named by `<key>_FILE`.
///
/// Unreadable or empty files are treated as unset.
pub fn env_or_file(key: &str) -> Option<String> {
    if let Some(value) = env_var(key) {
        return Some(value);
    }

    let file_path = env_var(&format!("{}_FILE", key))?;
    match std::fs::read_to_string(&file_path) {
        Ok(content) => {
            let trimmed = content.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Err(e) => {
            warn!(key, file = %file_path, error = %e, "Secret file unreadable, ignoring");
            None
        }
    }
}

/// Parse a comma separated list, dropping blank entries
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
