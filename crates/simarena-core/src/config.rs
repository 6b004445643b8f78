//! Configuration loading and typed config structures for simarena.
//!
//! Configuration is read from `simarena.yaml` when it exists; every field has
//! a default, so the file is optional. Environment variables are applied on
//! top, which is how container deployments set ports, paths and the model
//! endpoint without editing YAML.

use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

/// Default configuration file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "simarena.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidEnv {
        /// Environment variable name.
        key: &'static str,
        /// The offending value.
        value: String,
        /// Parser message.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ArenaConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Where simulations are persisted.
    #[serde(default)]
    pub storage: StorageSettings,

    /// Language-model endpoint.
    #[serde(default)]
    pub llm: LlmSettings,
}

impl ArenaConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Load `path` if it exists, otherwise start from defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply environment overrides.
    ///
    /// `lookup` resolves a variable name to its value; pass
    /// `|key| std::env::var(key).ok()` for the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(val) = lookup("HOST") {
            self.server.host = val;
        }
        if let Some(val) = lookup("PORT") {
            self.server.port = parse_env("PORT", val)?;
        }
        if let Some(val) = lookup("CORS_ORIGIN") {
            self.server.cors_origin = val;
        }
        if let Some(val) = lookup("DATA_PATH") {
            self.storage.data_dir = val;
        }
        if let Some(val) = lookup("LLM_BASE_URL") {
            self.llm.base_url = val;
        }
        if let Some(val) = lookup("LLM_MODEL") {
            self.llm.model = val;
        }
        if let Some(val) = lookup("LLM_API_KEY") {
            self.llm.api_key = val;
        }
        if let Some(val) = lookup("LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_env("LLM_TIMEOUT_SECS", val)?;
        }
        if let Some(val) = lookup("LLM_RETRY_BACKOFF_MS") {
            self.llm.retry_backoff_ms = parse_env("LLM_RETRY_BACKOFF_MS", val)?;
        }
        Ok(())
    }
}

fn parse_env<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        key,
        reason: e.to_string(),
        value,
    })
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSettings {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origin allowed by CORS (the web client).
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageSettings {
    /// Directory holding `simulations.json`.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// `OpenAI`-compatible completion endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LlmSettings {
    /// Base URL up to and including the API version, e.g. `.../v1`.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model identifier sent with every request.
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Bearer token.
    #[serde(default = "default_llm_api_key")]
    pub api_key: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    /// Pause before the single retry, in milliseconds.
    #[serde(default = "default_llm_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key: default_llm_api_key(),
            timeout_secs: default_llm_timeout_secs(),
            retry_backoff_ms: default_llm_retry_backoff_ms(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:5173".to_owned()
}

fn default_data_dir() -> String {
    "./data".to_owned()
}

fn default_llm_base_url() -> String {
    "http://localhost:7090/v1".to_owned()
}

fn default_llm_model() -> String {
    "openai/gpt-oss-20b".to_owned()
}

fn default_llm_api_key() -> String {
    "not-needed".to_owned()
}

const fn default_llm_timeout_secs() -> u64 {
    120
}

const fn default_llm_retry_backoff_ms() -> u64 {
    5_000
}
