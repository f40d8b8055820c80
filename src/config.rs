//! Configuration module
//!
//! Loads configuration from environment variables. Token secrets and
//! lifetimes are mandatory; the process refuses to start without them.

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Shared secret used to sign all token kinds
    pub jwt_secret: String,

    /// Access token lifetime in seconds
    pub jwt_access_expiration: i64,

    /// Refresh token lifetime in seconds
    pub jwt_refresh_expiration: i64,

    /// Password-reset token lifetime in seconds
    pub jwt_reset_password_expiration: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("APP_PORT")
            .map_err(|_| ConfigError::MissingEnv("APP_PORT"))?
            .parse()
            .map_err(|_| ConfigError::InvalidValue("APP_PORT"))?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let jwt_secret =
            env::var("JWT_SECRET").map_err(|_| ConfigError::MissingEnv("JWT_SECRET"))?;

        let jwt_access_expiration = require_seconds("JWT_ACCESS_EXPIRATION")?;
        let jwt_refresh_expiration = require_seconds("JWT_REFRESH_EXPIRATION")?;
        let jwt_reset_password_expiration = require_seconds("JWT_RESET_PASSWORD_EXPIRATION")?;

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            jwt_secret,
            jwt_access_expiration,
            jwt_refresh_expiration,
            jwt_reset_password_expiration,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Parse a mandatory positive duration (seconds) from the environment
fn require_seconds(name: &'static str) -> Result<i64, ConfigError> {
    let raw = env::var(name).map_err(|_| ConfigError::MissingEnv(name))?;
    let seconds: i64 = raw.parse().map_err(|_| ConfigError::InvalidValue(name))?;
    if seconds <= 0 {
        return Err(ConfigError::InvalidValue(name));
    }
    Ok(seconds)
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
