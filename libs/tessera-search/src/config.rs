//! Configuration loading
//!
//! Values come from built-in defaults, an optional `config/tessera.{toml,yaml,json}`
//! file and `TESSERA__*` environment variables (highest precedence). A `.env` file
//! in the working directory is honoured when present.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Config {
    #[serde(default)]
    #[validate(nested)]
    pub search: SearchConfig,

    #[serde(default)]
    #[validate(nested)]
    pub logging: LoggingConfig,
}

/// Connection settings for the Elasticsearch cluster.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchConfig {
    #[serde(default = "default_node_uri")]
    #[validate(url)]
    pub node_uri: String,

    /// Prefix of every index; the document type is appended.
    #[serde(default = "default_index_name")]
    #[validate(length(min = 1))]
    pub index_name: String,

    #[serde(default)]
    pub login: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_request_timeout_seconds")]
    #[validate(range(min = 1, max = 3600))]
    pub request_timeout_seconds: u64,

    /// Documents per bulk request during a full rebuild.
    #[serde(default = "default_bulk_chunk_size")]
    #[validate(range(min = 1, max = 100000))]
    pub bulk_chunk_size: usize,

    /// Whether index managers built from this config make commits wait
    /// for indexed documents to become searchable.
    #[serde(default = "default_true")]
    pub wait_for_refresh: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            node_uri: default_node_uri(),
            index_name: default_index_name(),
            login: None,
            password: None,
            request_timeout_seconds: default_request_timeout_seconds(),
            bulk_chunk_size: default_bulk_chunk_size(),
            wait_for_refresh: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,

    #[serde(default)]
    pub file_enabled: bool,

    #[serde(default = "default_file_directory")]
    pub file_directory: String,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// daily, hourly, minutely or never
    #[serde(default = "default_file_rotation")]
    pub file_rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file_enabled: false,
            file_directory: default_file_directory(),
            file_prefix: default_file_prefix(),
            file_rotation: default_file_rotation(),
        }
    }
}

fn default_node_uri() -> String {
    "http://localhost:9200".to_string()
}

fn default_index_name() -> String {
    "tessera".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    60
}

fn default_bulk_chunk_size() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_file_directory() -> String {
    "logs".to_string()
}

fn default_file_prefix() -> String {
    "tessera".to_string()
}

fn default_file_rotation() -> String {
    "daily".to_string()
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/tessera").required(false))
            .add_source(
                config::Environment::with_prefix("TESSERA")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to load configuration: {}", e)))?;

        settings
            .try_deserialize()
            .map_err(|e| Error::Configuration(format!("Invalid configuration: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        Validate::validate(self)
            .map_err(|e| Error::Configuration(format!("Configuration validation failed: {}", e)))?;

        if self.search.login.is_some() != self.search.password.is_some() {
            return Err(Error::Configuration(
                "search.login and search.password must be set together".to_string(),
            ));
        }

        match self.logging.file_rotation.as_str() {
            "daily" | "hourly" | "minutely" | "never" => Ok(()),
            other => Err(Error::Configuration(format!(
                "Unknown log file rotation '{}'",
                other
            ))),
        }
    }
}
