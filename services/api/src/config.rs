//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;

use chrono::Duration;
use secrecy::SecretString;
use shop_core::CartStockPolicy;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// SMTP relay settings. Absent when mail should only be logged.
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub token_secret: SecretString,
    pub token_ttl: Duration,
    pub otp_ttl: Duration,
    pub pending_capacity: u64,
    pub cart_stock_policy: CartStockPolicy,
    pub smtp: Option<SmtpConfig>,
    pub mail_from: String,
    pub cors_origin: String,
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
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server and Database Settings ---
        let bind_address_str =
            lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = required(&lookup, "DATABASE_URL")?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Auth Settings ---
        let token_secret = required(&lookup, "TOKEN_SECRET")?;
        if token_secret.len() < 32 {
            return Err(ConfigError::InvalidValue(
                "TOKEN_SECRET".to_string(),
                "must be at least 32 bytes".to_string(),
            ));
        }
        let token_ttl = bounded_duration(
            "TOKEN_TTL_DAYS",
            positive(&lookup, "TOKEN_TTL_DAYS", 30)?,
            MAX_TOKEN_TTL_DAYS,
            Duration::try_days,
        )?;
        let otp_ttl = bounded_duration(
            "OTP_TTL_MINUTES",
            positive(&lookup, "OTP_TTL_MINUTES", 10)?,
            MAX_OTP_TTL_MINUTES,
            Duration::try_minutes,
        )?;
        let pending_capacity = positive(&lookup, "PENDING_CAPACITY", 10_000)?;

        let cart_stock_policy = match lookup("CART_STOCK_POLICY") {
            Some(value) => CartStockPolicy::parse(&value).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "CART_STOCK_POLICY".to_string(),
                    format!("'{}' is not one of requested, cumulative", value),
                )
            })?,
            None => CartStockPolicy::default(),
        };

        // --- Load Mail Settings (SMTP is optional) ---
        let smtp = match lookup("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: positive(&lookup, "SMTP_PORT", 587)?,
                username: lookup("SMTP_USERNAME"),
                password: lookup("SMTP_PASSWORD").map(SecretString::from),
            }),
            None => None,
        };
        let mail_from = lookup("MAIL_FROM")
            .unwrap_or_else(|| "\"ModernShop\" <no-reply@modernshop.local>".to_string());

        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            token_secret: SecretString::from(token_secret),
            token_ttl,
            otp_ttl,
            pending_capacity,
            cart_stock_policy,
            smtp,
            mail_from,
            cors_origin,
        })
    }
}

const MAX_TOKEN_TTL_DAYS: i64 = 3650;
const MAX_OTP_TTL_MINUTES: i64 = 1440;

fn bounded_duration(
    key: &str,
    value: i64,
    max: i64,
    to_duration: fn(i64) -> Option<Duration>,
) -> Result<Duration, ConfigError> {
    to_duration(value).filter(|_| value <= max).ok_or_else(|| {
        ConfigError::InvalidValue(
            key.to_string(),
            format!("'{}' exceeds the maximum of {}", value, max),
        )
    })
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()))
}

fn positive<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + PartialOrd + Default,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("'{}' is not a positive number", raw),
        )),
    }
}
