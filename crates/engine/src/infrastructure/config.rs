//! Engine configuration from environment variables.

use std::path::PathBuf;

use crate::infrastructure::id_allocator::AllocatorConfig;

const DEFAULT_DATABASE_PATH: &str = "taleweaver.db";
const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
const DEFAULT_SERVER_PORT: u16 = 3000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub database_path: PathBuf,
    pub server_host: String,
    pub server_port: u16,
    pub allocator: AllocatorConfig,
    /// `None` disables the CORS layer; `Some("*")` allows any origin.
    pub cors_allowed_origins: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            server_host: DEFAULT_SERVER_HOST.to_string(),
            server_port: DEFAULT_SERVER_PORT,
            allocator: AllocatorConfig::default(),
            cors_allowed_origins: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();

        if let Some(path) = get("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(host) = get("SERVER_HOST") {
            config.server_host = host;
        }
        if let Some(port) = get("SERVER_PORT") {
            config.server_port = port.parse().map_err(|_| ConfigError::Invalid {
                name: "SERVER_PORT",
                expected: "a port number",
                value: port.clone(),
            })?;
        }
        if let Some(limit) = get("ID_SOFT_LIMIT") {
            let parsed: u64 = limit.parse().map_err(|_| ConfigError::Invalid {
                name: "ID_SOFT_LIMIT",
                expected: "a positive integer",
                value: limit.clone(),
            })?;
            if parsed == 0 {
                return Err(ConfigError::Invalid {
                    name: "ID_SOFT_LIMIT",
                    expected: "a positive integer",
                    value: limit,
                });
            }
            config.allocator.max_numeric = Some(parsed);
        }
        config.cors_allowed_origins = get("CORS_ALLOWED_ORIGINS");

        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
