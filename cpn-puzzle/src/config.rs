//! Service configuration
//!
//! Resolution: compiled defaults, then the TOML file (see
//! [`cpn_common::config::resolve_config_path`]), then environment overrides.
//! Secrets may come from `<NAME>_FILE`.

use cpn_common::config::{
    env_or_file, env_var, load_toml_or_default, parse_list, resolve_config_path, LoggingConfig,
};
use cpn_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{info, warn};

pub const CONFIG_ENV_VAR: &str = "CPN_CONFIG";
pub const CONFIG_FILE_NAME: &str = "puzzle.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub lichess: LichessConfig,
    pub dataset: DatasetConfig,
    pub completion: CompletionConfig,
    pub recency: RecencyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Whole-request timeout applied by the HTTP layer
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 5760,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LichessConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub timeout_secs: u64,
    pub requests_per_second: u32,
}

impl Default for LichessConfig {
    fn default() -> Self {
        Self {
            base_url: "https://lichess.org".to_string(),
            api_token: None,
            timeout_secs: 10,
            requests_per_second: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub enabled: bool,
    pub base_url: String,
    pub dataset: String,
    pub config: String,
    pub split: String,
    pub timeout_secs: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://datasets-server.huggingface.co".to_string(),
            dataset: "Lichess/chess-puzzles".to_string(),
            config: "default".to_string(),
            split: "train".to_string(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Tried in order by the free-form pipeline after the default model
    pub fallback_models: Vec<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://integrate.api.nvidia.com/v1".to_string(),
            api_key: None,
            model: "meta/llama-3.3-70b-instruct".to_string(),
            fallback_models: Vec::new(),
            temperature: 0.7,
            max_tokens: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecencyConfig {
    /// Identifiers remembered per difficulty tier
    pub window: usize,
}

impl Default for RecencyConfig {
    fn default() -> Self {
        Self {
            window: crate::services::recency::DEFAULT_WINDOW,
        }
    }
}

impl ServiceConfig {
    /// Load from file (if any), apply environment overrides and validate
    pub fn load(cli_path: Option<&str>) -> Result<Self> {
        let path = resolve_config_path(cli_path, CONFIG_ENV_VAR, CONFIG_FILE_NAME);
        match &path {
            Some(p) => info!(path = %p.display(), "Loading configuration"),
            None => info!("No config file found, using compiled defaults"),
        }

        let mut config: ServiceConfig = load_toml_or_default(path.as_deref())?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(port) = parsed_env::<u16>("CPN_PORT")? {
            self.server.port = port;
        }
        if let Some(bind) = env_var("CPN_BIND") {
            self.server.bind = bind;
        }
        if let Some(level) = env_var("CPN_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(url) = env_var("LICHESS_BASE_URL") {
            self.lichess.base_url = url;
        }
        if let Some(token) = env_or_file("LICHESS_API_TOKEN") {
            self.lichess.api_token = Some(token);
        }

        if let Some(enabled) = parsed_env::<bool>("HUGGINGFACE_ENABLED")? {
            self.dataset.enabled = enabled;
        }
        if let Some(url) = env_var("HUGGINGFACE_BASE_URL") {
            self.dataset.base_url = url;
        }
        if let Some(dataset) = env_var("HUGGINGFACE_DATASET") {
            self.dataset.dataset = dataset;
        }
        if let Some(subset) = env_var("HUGGINGFACE_CONFIG") {
            self.dataset.config = subset;
        }
        if let Some(split) = env_var("HUGGINGFACE_SPLIT") {
            self.dataset.split = split;
        }

        if let Some(url) = env_var("COMPLETION_BASE_URL") {
            self.completion.base_url = url;
        }
        if let Some(key) = env_or_file("COMPLETION_API_KEY") {
            self.completion.api_key = Some(key);
        }
        if let Some(model) = env_var("COMPLETION_MODEL") {
            self.completion.model = model;
        }
        if let Some(models) = env_var("COMPLETION_FALLBACK_MODELS") {
            self.completion.fallback_models = parse_list(&models);
        }

        if let Some(window) = parsed_env::<usize>("RECENCY_WINDOW")? {
            self.recency.window = window;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::Config("server.port must be 1..=65535".to_string()));
        }
        if self.recency.window == 0 {
            return Err(Error::Config("recency.window must be at least 1".to_string()));
        }

        let timeouts = [
            ("server.request_timeout_secs", self.server.request_timeout_secs),
            ("lichess.timeout_secs", self.lichess.timeout_secs),
            ("dataset.timeout_secs", self.dataset.timeout_secs),
            ("completion.timeout_secs", self.completion.timeout_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(Error::Config(format!("{} must be greater than 0", name)));
        }

        if self.completion.api_key.is_none() {
            warn!("No completion API key configured; AI endpoints will report unavailable");
        }
        Ok(())
    }
}

fn parsed_env<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{}={:?}: {}", key, raw, e))),
        None => Ok(None),
    }
}
