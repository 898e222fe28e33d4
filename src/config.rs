use config::ConfigError;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// Connection parameters for the single backend this process talks to.
///
/// `provider` is kept as raw text and only interpreted by
/// [`ConnectionManager::connect`](crate::services::ConnectionManager::connect),
/// so an unknown backend fails at connect time rather than at load time.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub provider: String,
    pub host: String,
    pub port: Option<u16>,
    pub user: String,
    pub password: String,
    pub name: String,
    pub min_pool_size: u32,
    pub max_pool_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub style: String,
}

/// Environment variables holding free text, mapped onto config keys.
const TEXT_VARS: &[(&str, &str)] = &[
    ("DB_PROVIDER", "database.provider"),
    ("DB_HOST", "database.host"),
    ("DB_USER", "database.user"),
    ("DB_PASSWORD", "database.password"),
    ("DB_NAME", "database.name"),
    ("RUST_LOG", "logging.level"),
    ("RUST_LOG_STYLE", "logging.style"),
];

/// Environment variables holding integers.
const NUMERIC_VARS: &[(&str, &str)] = &[
    ("DB_PORT", "database.port"),
    ("DB_MIN_POOL_SIZE", "database.min_pool_size"),
    ("DB_MAX_POOL_SIZE", "database.max_pool_size"),
];

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Try to load from .env file first so real variables still win
        let _ = dotenv::dotenv();

        Self::from_source(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = config::Config::builder()
            .set_default("database.host", "localhost")?
            .set_default("database.min_pool_size", 1)?
            .set_default("database.max_pool_size", 10)?
            .set_default("logging.level", "info")?
            .set_default("logging.style", "auto")?;

        for (var, key) in TEXT_VARS {
            if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
                builder = builder.set_override(*key, value)?;
            }
        }

        for (var, key) in NUMERIC_VARS {
            if let Some(raw) = lookup(var).filter(|v| !v.is_empty()) {
                let value: i64 = raw.trim().parse().map_err(|_| {
                    ConfigError::Message(format!("{} must be an integer, got '{}'", var, raw))
                })?;
                builder = builder.set_override(*key, value)?;
            }
        }

        builder.build()?.try_deserialize()
    }
}
