//! Storage configuration read from the environment.

use servicebus_core::error::ServiceBusError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::info;

use crate::error::storage_error;

/// Variable holding the `PostgreSQL` connection string.
pub const DATABASE_URL: &str = "DATABASE_URL";

/// Variable holding the pool size.
pub const DATABASE_MAX_CONNECTIONS: &str = "DATABASE_MAX_CONNECTIONS";

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} environment variable must be set")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("{name} is invalid: {reason}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Connection settings for the SQL stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Upper bound of the connection pool.
    pub max_connections: u32,
}

impl StorageConfig {
    /// Pool size used when `DATABASE_MAX_CONNECTIONS` is not set.
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `DATABASE_URL` is missing or a value
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `DATABASE_URL` is missing or empty, or if
    /// `DATABASE_MAX_CONNECTIONS` is not a positive integer.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup(DATABASE_URL)
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing(DATABASE_URL))?;

        let max_connections = match lookup(DATABASE_MAX_CONNECTIONS) {
            None => Self::DEFAULT_MAX_CONNECTIONS,
            Some(raw) => {
                let parsed: u32 = raw.trim().parse().map_err(|e| ConfigError::Invalid {
                    name: DATABASE_MAX_CONNECTIONS,
                    reason: format!("{e}"),
                })?;
                if parsed == 0 {
                    return Err(ConfigError::Invalid {
                        name: DATABASE_MAX_CONNECTIONS,
                        reason: "must be at least 1".to_owned(),
                    });
                }
                parsed
            }
        };

        Ok(Self {
            database_url,
            max_connections,
        })
    }

    /// Opens a connection pool.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the database cannot be reached.
    pub async fn connect(&self) -> Result<PgPool, ServiceBusError> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.database_url)
            .await
            .map_err(storage_error)?;

        info!(max_connections = self.max_connections, "connected to storage");
        Ok(pool)
    }
}
