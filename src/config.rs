use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::registration::DEFAULT_INVITE_CODE_ATTEMPTS;

/// Default port for the HTTP server.
pub const DEFAULT_PORT: u16 = 8080;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite database holding accounts and user records
    pub database_path: ConfigValue<PathBuf>,
    /// Port the HTTP server listens on
    pub port: ConfigValue<u16>,
    /// Invite codes drawn before a primary registration gives up
    pub invite_code_attempts: ConfigValue<usize>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    port: Option<u16>,
    invite_code_attempts: Option<usize>,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{shown}': {source}", shown = .path.display())]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{shown}': {source}", shown = .path.display())]
    ParseError {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Invalid value '{value}' for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut database_path = ConfigValue::new(
            Self::default_data_dir().join("carelink.db"),
            ConfigSource::Default,
        );
        let mut port = ConfigValue::new(DEFAULT_PORT, ConfigSource::Default);
        let mut invite_code_attempts =
            ConfigValue::new(DEFAULT_INVITE_CODE_ATTEMPTS, ConfigSource::Default);
        let mut config_file = None;

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::ReadError {
                    path: path.clone(),
                    source,
                })?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|source| ConfigError::ParseError {
                    path: path.clone(),
                    source,
                })?;

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                // Resolve relative paths against config file's directory
                let resolved_path = if db_path.is_relative() {
                    path.parent().map(|p| p.join(&db_path)).unwrap_or(db_path)
                } else {
                    db_path
                };
                database_path = ConfigValue::new(resolved_path, ConfigSource::File);
            }
            if let Some(p) = file_config.port {
                port = ConfigValue::new(p, ConfigSource::File);
            }
            if let Some(n) = file_config.invite_code_attempts {
                invite_code_attempts = ConfigValue::new(n, ConfigSource::File);
            }
        }

        // Apply environment variable overrides
        if let Ok(db_path) = std::env::var("CARELINK_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Some(p) = parse_env("CARELINK_PORT")? {
            port = ConfigValue::new(p, ConfigSource::Environment);
        }
        if let Some(n) = parse_env("CARELINK_INVITE_CODE_ATTEMPTS")? {
            invite_code_attempts = ConfigValue::new(n, ConfigSource::Environment);
        }

        Ok(Self {
            database_path,
            port,
            invite_code_attempts,
            config_file,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/carelink/
    /// - macOS: ~/Library/Application Support/carelink/
    /// - Windows: %APPDATA%/carelink/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("carelink")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/carelink/
    /// - macOS: ~/Library/Application Support/carelink/
    /// - Windows: %APPDATA%/carelink/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("carelink")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
        Err(_) => Ok(None),
    }
}
