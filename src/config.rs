//! TOML configuration parsing and validation.
//!
//! The file holds non-secret settings only. Secrets (the database connection
//! string and the model API key) come from the process environment and are
//! merged in by [`Secrets::apply`] once, in `main`; every component receives
//! the resulting [`Config`] explicitly.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "./config/snaptext.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Full `sqlite:` connection string. Takes precedence over `path`.
    /// Normally populated from `DATABASE_URL`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/snaptext.sqlite")
}
fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_completion_tokens")]
    pub max_completion_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Never read from the file; filled from the environment.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            max_completion_tokens: default_max_completion_tokens(),
            timeout_secs: default_timeout_secs(),
            api_key_env: default_api_key_env(),
            api_key: None,
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-5".to_string()
}
fn default_max_completion_tokens() -> u32 {
    4096
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl ExtractionConfig {
    /// Extraction actions are only offered when a credential is present.
    pub fn is_enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_export_dir")]
    pub dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: default_export_dir(),
        }
    }
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("./exports")
}

/// Secrets sourced from the process environment.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub database_url: Option<String>,
    pub api_key: Option<String>,
}

impl Secrets {
    /// Read `DATABASE_URL` and the configured API key variable.
    pub fn from_env(config: &Config) -> Self {
        Self {
            database_url: non_empty(std::env::var("DATABASE_URL").ok()),
            api_key: non_empty(std::env::var(&config.extraction.api_key_env).ok()),
        }
    }

    pub fn apply(self, config: &mut Config) {
        if let Some(url) = self.database_url {
            config.db.url = Some(url);
        }
        config.extraction.api_key = self.api_key;
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Like [`load_config`], but a missing file at the default location yields
/// the built-in defaults instead of an error.
pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG_PATH) {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }
    load_config(path)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.db.max_connections == 0 {
        return Err(ConfigError::Invalid(
            "db.max_connections must be >= 1".to_string(),
        ));
    }
    if let Some(url) = &config.db.url {
        if !url.starts_with("sqlite:") {
            return Err(ConfigError::Invalid(format!(
                "db.url must be a sqlite: connection string, got '{}'",
                url
            )));
        }
    }
    if config.extraction.model.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "extraction.model must not be empty".to_string(),
        ));
    }
    if config.extraction.max_completion_tokens == 0 {
        return Err(ConfigError::Invalid(
            "extraction.max_completion_tokens must be > 0".to_string(),
        ));
    }
    if config.extraction.timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "extraction.timeout_secs must be > 0".to_string(),
        ));
    }
    if config.server.max_upload_bytes == 0 {
        return Err(ConfigError::Invalid(
            "server.max_upload_bytes must be > 0".to_string(),
        ));
    }
    Ok(())
}
