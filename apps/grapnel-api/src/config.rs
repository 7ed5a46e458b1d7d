//! Application configuration loaded from environment variables.
//!
//! Loading is fail-fast: a required variable that is missing, or any variable
//! that is present but malformed, stops startup with a clear error.

use std::env::VarError;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,grapnel=debug";

/// Shortest webhook secret accepted in production.
pub const MIN_PRODUCTION_SECRET_LEN: usize = 32;

/// Application environment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Production,
}

impl AppEnvironment {
    /// Parse an `APP_ENV` value.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            other => Err(ConfigError::InvalidValue {
                var: "APP_ENV".into(),
                message: format!("expected development or production, got {other}"),
            }),
        }
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        *self == Self::Production
    }
}

impl std::fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Durable store backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { database_url: String, max_connections: u32 },
    Memory,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres { .. } => write!(f, "postgres"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub store: StoreBackend,
    /// HMAC secret shared with every partner.
    pub webhook_secret: String,
    /// Delivery attempts per notification.
    pub max_retry_attempts: i32,
    pub dispatch_interval: Duration,
    pub dispatch_batch_size: i64,
    pub webhook_timeout: Duration,
    /// Requests per client per minute across the whole API.
    pub rate_limit_per_minute: i64,
    pub app_env: AppEnvironment,
    pub api_prefix: String,
    pub cors_origins: Vec<String>,
    pub log_filter: String,
}

/// Read an optional variable, treating an empty value as unset.
fn optional<F>(reader: &F, var: &str) -> Option<String>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    reader(var).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_or<F, T>(reader: &F, var: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional(reader, var) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            var: var.into(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Like [`parse_or`], additionally requiring a value of at least 1.
fn positive_or<F, T>(reader: &F, var: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
    T: std::str::FromStr + PartialOrd + From<u8>,
    T::Err: std::fmt::Display,
{
    let value = parse_or(reader, var, default)?;
    if value < T::from(1) {
        return Err(ConfigError::InvalidValue {
            var: var.into(),
            message: "must be at least 1".into(),
        });
    }
    Ok(value)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader, so tests never
    /// mutate process-global environment state.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let listen_addr = parse_or(&reader, "GRAPNEL_LISTEN_ADDR", SocketAddr::from(([0, 0, 0, 0], 8000)))?;

        let app_env = match optional(&reader, "APP_ENV") {
            Some(raw) => AppEnvironment::parse(&raw)?,
            None => AppEnvironment::Development,
        };

        let store = match optional(&reader, "GRAPNEL_STORE").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("postgres") => StoreBackend::Postgres {
                database_url: optional(&reader, "DATABASE_URL")
                    .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".into()))?,
                max_connections: positive_or(&reader, "DATABASE_MAX_CONNECTIONS", 10u32)?,
            },
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    var: "GRAPNEL_STORE".into(),
                    message: format!("expected postgres or memory, got {other}"),
                })
            }
        };

        let webhook_secret = optional(&reader, "WEBHOOK_SECRET")
            .ok_or_else(|| ConfigError::MissingVar("WEBHOOK_SECRET".into()))?;
        if app_env.is_production() && webhook_secret.len() < MIN_PRODUCTION_SECRET_LEN {
            return Err(ConfigError::InvalidValue {
                var: "WEBHOOK_SECRET".into(),
                message: format!(
                    "must be at least {MIN_PRODUCTION_SECRET_LEN} characters in production"
                ),
            });
        }

        let api_prefix = optional(&reader, "API_V1_PREFIX").unwrap_or_else(|| "/api/v1".into());
        if !api_prefix.starts_with('/') || api_prefix.len() < 2 || api_prefix.ends_with('/') {
            return Err(ConfigError::InvalidValue {
                var: "API_V1_PREFIX".into(),
                message: "must start with / and not end with /".into(),
            });
        }

        let cors_origins = match optional(&reader, "CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            None => default_cors_origins(),
        };

        Ok(Self {
            listen_addr,
            store,
            webhook_secret,
            max_retry_attempts: positive_or(&reader, "MAX_RETRY_ATTEMPTS", 3i32)?,
            dispatch_interval: Duration::from_secs(positive_or(&reader, "DISPATCH_INTERVAL_SECS", 5u64)?),
            dispatch_batch_size: positive_or(&reader, "DISPATCH_BATCH_SIZE", 10i64)?,
            webhook_timeout: Duration::from_secs(positive_or(&reader, "WEBHOOK_TIMEOUT_SECS", 10u64)?),
            rate_limit_per_minute: positive_or(&reader, "RATE_LIMIT_PER_MINUTE", 100i64)?,
            app_env,
            api_prefix,
            cors_origins,
            log_filter: optional(&reader, "RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.into()),
        })
    }
}

fn default_cors_origins() -> Vec<String> {
    ["localhost:3000", "localhost:8000"]
        .iter()
        .flat_map(|host| [format!("http://{host}"), format!("https://{host}")])
        .collect()
}
