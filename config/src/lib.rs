//! # Configuration Management for relstore
//!
//! This crate provides centralized configuration structures for the worker
//! pool (database section) and the entity caches (cache section).
//!
//! ## Quick Start
//!
//! ### Programmatic Configuration
//! ```rust
//! use config::{CacheConfig, DatabaseConfig};
//! use type_mapping::Dialect;
//!
//! let db_config = DatabaseConfig::new(
//!     Dialect::Postgres,
//!     "localhost".to_string(), 5432, "inventory".to_string(),
//!     "postgres".to_string(), "password".to_string(),
//!     4, 30,
//! );
//!
//! let cache_config = CacheConfig::new(60, 30, "*".to_string());
//! ```
//!
//! ### TOML File Configuration
//! ```toml
//! [database]
//! driver = "postgres"
//! host = "localhost"
//! port = 5432
//! database = "inventory"
//! username = "postgres"
//! password = "password"
//! connections = 4
//! postgres_inherit = false
//! connection_timeout_seconds = 30
//!
//! [cache]
//! refresh_interval_seconds = 60
//! request_timeout_seconds = 30
//! includes = "*"
//!
//! [cache.aliases]
//! device = "network_device"
//! ```
//!
//! Load configuration:
//! ```rust,no_run
//! use config::AppConfig;
//!
//! // Load from RELSTORE_CONFIG or ./relstore.toml
//! let config = AppConfig::load()?;
//!
//! // Or load from custom path
//! let config = AppConfig::from_file("config/production.toml")?;
//! # Ok::<(), config::ConfigError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::{env, path::Path};
use thiserror::Error;
use type_mapping::Dialect;

const DEFAULT_CONFIG_PATH: &str = "./relstore.toml";

/// Refresh intervals below this are raised to it
pub const MIN_REFRESH_INTERVAL_SECONDS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Environment variable error: {0}")]
    Env(#[from] env::VarError),
    #[error("Dotenvy error: {0}")]
    Dotenvy(#[from] dotenvy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Driver name, resolved to a dialect while loading
    #[serde(rename = "driver")]
    pub dialect: Dialect,
    /// Full connection URL; overrides the individual parts below
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Number of dedicated connections, one worker each
    #[serde(default = "default_connections")]
    pub connections: u32,
    /// Use native `INHERITS` tables for class-table inheritance
    #[serde(default)]
    pub postgres_inherit: bool,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,
}

/// Entity cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Associations loaded with every cached entity (`*` or a comma list)
    #[serde(default)]
    pub includes: String,
    /// Alternative names accepted by the cache registry
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

fn default_connections() -> u32 {
    1
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_refresh_interval() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval_seconds: default_refresh_interval(),
            request_timeout_seconds: default_request_timeout(),
            includes: String::new(),
            aliases: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file specified in .env or defaults
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }

        // Try RELSTORE_CONFIG first, then DEFAULT_CONFIG_PATH
        if let Ok(config_path) = env::var("RELSTORE_CONFIG") {
            Self::from_file(&config_path)
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::from_file(DEFAULT_CONFIG_PATH)
        } else {
            Err(ConfigError::Invalid(format!(
                "Config path must be specified in .env file as RELSTORE_CONFIG or in {} file",
                DEFAULT_CONFIG_PATH
            )))
        }
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Database validations
        let has_url = self.database.url.as_ref().is_some_and(|u| !u.is_empty());
        if !has_url {
            if self.database.dialect == Dialect::Sqlite {
                return Err(ConfigError::Invalid(
                    "Database url is required for sqlite".to_string(),
                ));
            }
            if self.database.host.is_empty() {
                return Err(ConfigError::Invalid(
                    "Database host cannot be empty".to_string(),
                ));
            }
            if self.database.port == 0 {
                return Err(ConfigError::Invalid(
                    "Database port cannot be zero".to_string(),
                ));
            }
            if self.database.database.is_empty() {
                return Err(ConfigError::Invalid(
                    "Database name cannot be empty".to_string(),
                ));
            }
            if self.database.username.is_empty() {
                return Err(ConfigError::Invalid(
                    "Database username cannot be empty".to_string(),
                ));
            }
        }
        if self.database.connections == 0 {
            return Err(ConfigError::Invalid(
                "Database connections must be greater than 0".to_string(),
            ));
        }
        if self.database.postgres_inherit && self.database.dialect != Dialect::Postgres {
            return Err(ConfigError::Invalid(format!(
                "postgres_inherit is not supported by the {} driver",
                self.database.dialect
            )));
        }
        if self.database.connection_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "Database connection_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        // Cache validations
        if self.cache.refresh_interval_seconds < MIN_REFRESH_INTERVAL_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "Cache refresh_interval_seconds must be at least {}",
                MIN_REFRESH_INTERVAL_SECONDS
            )));
        }
        if self.cache.request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "Cache request_timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if let Some((alias, _)) = self.cache.aliases.iter().find(|(_, target)| target.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "Cache alias '{}' has an empty target",
                alias
            )));
        }

        Ok(())
    }
}

impl CacheConfig {
    /// Create a new cache configuration
    pub fn new(refresh_interval_seconds: u64, request_timeout_seconds: u64, includes: String) -> Self {
        Self {
            refresh_interval_seconds,
            request_timeout_seconds,
            includes,
            aliases: HashMap::new(),
        }
    }

    pub fn with_alias(mut self, alias: &str, target: &str) -> Self {
        self.aliases.insert(alias.to_string(), target.to_string());
        self
    }
}

impl DatabaseConfig {
    /// Create a new database configuration
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dialect: Dialect,
        host: String,
        port: u16,
        database: String,
        username: String,
        password: String,
        connections: u32,
        connection_timeout_seconds: u64,
    ) -> Self {
        Self {
            dialect,
            url: None,
            host,
            port,
            database,
            username,
            password,
            connections,
            postgres_inherit: false,
            connection_timeout_seconds,
        }
    }

    /// Configuration from a full connection URL
    pub fn from_url(dialect: Dialect, url: &str, connections: u32) -> Self {
        Self {
            dialect,
            url: Some(url.to_string()),
            host: String::new(),
            port: 0,
            database: String::new(),
            username: String::new(),
            password: String::new(),
            connections,
            postgres_inherit: false,
            connection_timeout_seconds: default_connection_timeout(),
        }
    }

    pub fn with_postgres_inherit(mut self, enabled: bool) -> Self {
        self.postgres_inherit = enabled;
        self
    }

    /// Build connection string
    pub fn connection_string(&self) -> String {
        if let Some(url) = self.url.as_ref().filter(|u| !u.is_empty()) {
            return url.clone();
        }
        let scheme = match self.dialect {
            Dialect::Postgres => "postgresql",
            Dialect::MySql => "mysql",
            Dialect::MsSql => "mssql",
            Dialect::Oracle => "oracle",
            Dialect::Sqlite | Dialect::Generic => self.dialect.name(),
        };
        format!(
            "{}://{}:{}@{}:{}/{}",
            scheme, self.username, self.password, self.host, self.port, self.database
        )
    }

    /// Connections actually opened; single-writer engines get one
    pub fn effective_connections(&self) -> usize {
        if self.dialect.is_single_writer() {
            1
        } else {
            self.connections.max(1) as usize
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================
    // Parsing
    // ========================================

    #[test]
    fn test_parse_full_config() {
        let config = AppConfig::from_toml_str(
            r#"
            [database]
            driver = "postgresql"
            host = "db"
            port = 5432
            database = "inventory"
            username = "app"
            password = "secret"
            connections = 4
            postgres_inherit = true

            [cache]
            refresh_interval_seconds = 15
            includes = "*"

            [cache.aliases]
            device = "network_device"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.dialect, Dialect::Postgres);
        assert_eq!(config.database.connections, 4);
        assert!(config.database.postgres_inherit);
        assert_eq!(
            config.database.connection_string(),
            "postgresql://app:secret@db:5432/inventory"
        );
        assert_eq!(config.cache.refresh_interval_seconds, 15);
        assert_eq!(config.cache.request_timeout_seconds, 30);
        assert_eq!(config.cache.aliases["device"], "network_device");
    }

    #[test]
    fn test_sqlite_forces_single_connection() {
        let config = AppConfig::from_toml_str(
            r#"
            [database]
            driver = "sqlite3"
            url = "sqlite::memory:"
            connections = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.database.connection_string(), "sqlite::memory:");
        assert_eq!(config.database.effective_connections(), 1);
        assert_eq!(config.cache.refresh_interval_seconds, 60);
    }

    // ========================================
    // Validation
    // ========================================

    #[test]
    fn test_unknown_driver_is_rejected() {
        let err = AppConfig::from_toml_str(
            r#"
            [database]
            driver = "mongodb"
            url = "mongodb://localhost"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            r#"
            [database]
            driver = "sqlite"
            "#,
            r#"
            [database]
            driver = "postgres"
            url = "postgresql://localhost/db"
            connections = 0
            "#,
            r#"
            [database]
            driver = "sqlite"
            url = "sqlite::memory:"
            postgres_inherit = true
            "#,
            r#"
            [database]
            driver = "postgres"
            url = "postgresql://localhost/db"

            [cache]
            refresh_interval_seconds = 5
            "#,
        ];

        for case in cases {
            assert!(
                matches!(AppConfig::from_toml_str(case), Err(ConfigError::Invalid(_))),
                "expected invalid configuration: {}",
                case
            );
        }
    }
}
