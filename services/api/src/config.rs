//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: Level,
    pub cors_origin: String,
    /// Lifetime of a login cookie.
    pub auth_session_days: i64,
    /// Period of one rest-timer tick. One second outside of tests.
    pub rest_tick: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address = parse_or_default(
            "BIND_ADDRESS",
            std::env::var("BIND_ADDRESS").ok(),
            SocketAddr::from(([0, 0, 0, 0], 3000)),
        )?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let db_max_connections = parse_or_default(
            "DB_MAX_CONNECTIONS",
            std::env::var("DB_MAX_CONNECTIONS").ok(),
            5u32,
        )?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load HTTP and Session Settings ---
        let cors_origin = std::env::var("CORS_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:8081".to_string());

        let auth_session_days = parse_or_default(
            "AUTH_SESSION_DAYS",
            std::env::var("AUTH_SESSION_DAYS").ok(),
            30i64,
        )?;
        if auth_session_days <= 0 {
            return Err(ConfigError::InvalidValue(
                "AUTH_SESSION_DAYS".to_string(),
                "must be a positive number of days".to_string(),
            ));
        }

        let rest_tick_millis = parse_or_default(
            "REST_TICK_MILLIS",
            std::env::var("REST_TICK_MILLIS").ok(),
            1000u64,
        )?;
        if rest_tick_millis == 0 {
            return Err(ConfigError::InvalidValue(
                "REST_TICK_MILLIS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            database_url,
            db_max_connections,
            log_level,
            cors_origin,
            auth_session_days,
            rest_tick: Duration::from_millis(rest_tick_millis),
        })
    }
}

/// Parses an optional raw value, falling back to `default` when it is absent.
fn parse_or_default<T>(name: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
    }
}
