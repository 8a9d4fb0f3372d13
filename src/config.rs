//! Runtime configuration for the server and the terminal client.
//!
//! Both read the process environment after `dotenv` has loaded any `.env`
//! file. The client additionally reads `<config_dir>/tasktrack/config.toml`.

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://tasks.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },

    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Sqlite,
    InMemory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub storage_mode: StorageMode,
    pub database_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            storage_mode: StorageMode::Sqlite,
            database_url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source; unset variables keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ServerConfig::default();

        if let Some(host) = lookup("HOST").filter(|value| !value.trim().is_empty()) {
            config.host = host.trim().to_string();
        }
        if let Some(port) = lookup("PORT").filter(|value| !value.trim().is_empty()) {
            config.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: "PORT",
                value: port.clone(),
            })?;
        }
        if let Some(mode) = lookup("STORAGE_MODE").filter(|value| !value.trim().is_empty()) {
            config.storage_mode = match mode.trim().to_lowercase().as_str() {
                "sqlite" => StorageMode::Sqlite,
                "in_memory" | "memory" => StorageMode::InMemory,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "STORAGE_MODE",
                        value: mode,
                    })
                }
            };
        }
        if let Some(url) = lookup("DATABASE_URL").filter(|value| !value.trim().is_empty()) {
            config.database_url = url.trim().to_string();
        }

        Ok(config)
    }

    pub fn address(&self) -> Result<SocketAddr, ConfigError> {
        let address = format!("{}:{}", self.host, self.port);
        address.parse().map_err(|_| ConfigError::InvalidValue {
            name: "HOST",
            value: self.host.clone(),
        })
    }
}

/// Settings file for the terminal client. Every key is optional.
#[derive(Debug, Default, Deserialize)]
struct ClientFile {
    api_url: Option<String>,
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub log_file: PathBuf,
}

impl ClientConfig {
    /// Default location of the client settings file.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tasktrack").join("config.toml"))
    }

    fn default_log_file() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(env::temp_dir)
            .join("tasktrack.log")
    }

    pub fn load() -> Result<Self, ConfigError> {
        let file = match Self::config_path() {
            Some(path) if path.exists() => Some(path),
            _ => None,
        };
        Self::load_from(file.as_deref(), |name| env::var(name).ok())
    }

    /// Environment wins over the file, the file over built-in defaults.
    pub fn load_from<F>(file: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = match file {
            Some(path) => read_client_file(path)?,
            None => ClientFile::default(),
        };

        let api_url = lookup("TASKTRACK_API_URL")
            .filter(|value| !value.trim().is_empty())
            .or(settings.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let log_file = lookup("TASKTRACK_LOG_FILE")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .or(settings.log_file)
            .unwrap_or_else(Self::default_log_file);

        Ok(ClientConfig {
            api_url: api_url.trim().trim_end_matches('/').to_string(),
            log_file,
        })
    }
}

fn read_client_file(path: &Path) -> Result<ClientFile, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
