use crate::error::{ClientError, Result};
use crate::schema::FieldType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "REDISEARCH_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/redisearch.toml";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Index backend selection
    #[serde(default)]
    pub backend: BackendConfig,

    /// Client behavior
    #[serde(default)]
    pub client: ClientSettings,

    /// Record schema used by the command-line tool
    #[serde(default)]
    pub entity: Option<EntityConfig>,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(config_path)
    }

    /// Load configuration, layering `path` (if it exists) over the defaults
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_string_lossy().into_owned();

        let config: Config = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&path).required(false))
            // Override with environment variables (prefix: REDISEARCH__)
            .add_source(
                config::Environment::with_prefix("REDISEARCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Compiled-in defaults only
    pub fn defaults() -> Result<Self> {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.client.validate()?;
        match self.backend.kind {
            BackendKind::Sled if self.backend.sled_path.is_none() => Err(ClientError::Configuration(
                "Sled backend requires 'sled_path' configuration".to_string(),
            )),
            BackendKind::Redis if self.backend.redis_url.is_none() => {
                Err(ClientError::Configuration(
                    "Redis backend requires 'redis_url' configuration".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend type
    #[serde(default)]
    pub kind: BackendKind,

    /// Path for the embedded database (sled)
    pub sled_path: Option<PathBuf>,

    /// Redis connection string
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Memory,
    Sled,
    Redis,
}

/// Settings shared by every client built from one configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientSettings {
    /// Result ceiling applied when a query names no limit
    #[serde(default = "default_result_limit")]
    pub default_result_limit: usize,

    /// Page size for client-side paging
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Batch size for server-side cursor reads
    #[serde(default = "default_page_size")]
    pub cursor_batch_size: usize,

    /// Gzip entity payloads
    #[serde(default = "default_true")]
    pub use_compression: bool,

    /// Separator between index name and natural key in document keys
    #[serde(default = "default_key_separator")]
    pub key_separator: String,
}

impl ClientSettings {
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(ClientError::Configuration(
                "client.page_size must be greater than zero".to_string(),
            ));
        }
        if self.cursor_batch_size == 0 {
            return Err(ClientError::Configuration(
                "client.cursor_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.key_separator.is_empty() {
            return Err(ClientError::Configuration(
                "client.key_separator must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            default_result_limit: default_result_limit(),
            page_size: default_page_size(),
            cursor_batch_size: default_page_size(),
            use_compression: true,
            key_separator: default_key_separator(),
        }
    }
}

/// Runtime schema for schema-less records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Index name
    pub index: String,

    #[serde(default)]
    pub fields: Vec<EntityFieldConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityFieldConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default)]
    pub sortable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

// Default value functions
fn default_result_limit() -> usize {
    1_000_000
}

fn default_page_size() -> usize {
    1000
}

fn default_key_separator() -> String {
    ":".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_compiled_defaults() {
        let config = Config::defaults().unwrap();
        assert_eq!(config.backend.kind, BackendKind::Memory);
        assert_eq!(config.client, ClientSettings::default());
        assert!(config.observability.metrics_enabled);

        let entity = config.entity.unwrap();
        assert_eq!(entity.index, "record");
        assert_eq!(entity.fields[1].field_type, FieldType::Tag);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[backend]\nkind = \"sled\"\nsled_path = \"/tmp/idx\"\n\n[client]\npage_size = 250"
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.backend.kind, BackendKind::Sled);
        assert_eq!(config.client.page_size, 250);
        assert_eq!(config.client.cursor_batch_size, 1000);
    }

    #[test]
    fn test_backend_requirements() {
        let mut config = Config::defaults().unwrap();
        config.backend.kind = BackendKind::Redis;
        assert!(matches!(config.validate(), Err(ClientError::Configuration(_))));
        config.backend.redis_url = Some("redis://127.0.0.1/".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let settings = ClientSettings {
            page_size: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
