//! Configuration loaded from environment variables.

use std::time::Duration;

use thiserror::Error;

use crate::storage::RetryPolicy;

pub const DEFAULT_DATABASE: &str = "debtbook.db";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Path of the SQLite database file.
    pub database: String,
    /// Default log filter; `RUST_LOG` takes precedence.
    pub log_level: String,
    /// Retries for transient store failures.
    pub retry_attempts: u32,
    /// Backoff before the first retry, in milliseconds.
    pub retry_delay_ms: u64,
    /// Balance cache lifetime in seconds. Zero disables the cache.
    pub cache_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DEFAULT_DATABASE.to_string(),
            log_level: "warn".to_string(),
            retry_attempts: 3,
            retry_delay_ms: 50,
            cache_ttl_secs: 30,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment (and `.env`, if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for unset keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(database) = lookup("DEBTBOOK_DATABASE") {
            config.database = database;
        }

        if let Some(level) = lookup("DEBTBOOK_LOG_LEVEL") {
            config.log_level = level;
        }

        if let Some(value) = lookup("DEBTBOOK_RETRY_ATTEMPTS") {
            config.retry_attempts = parse_number("DEBTBOOK_RETRY_ATTEMPTS", &value)?;
        }

        if let Some(value) = lookup("DEBTBOOK_RETRY_DELAY_MS") {
            config.retry_delay_ms = parse_number("DEBTBOOK_RETRY_DELAY_MS", &value)?;
        }

        if let Some(value) = lookup("DEBTBOOK_CACHE_TTL_SECS") {
            config.cache_ttl_secs = parse_number("DEBTBOOK_CACHE_TTL_SECS", &value)?;
        }

        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_delay_ms),
        )
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn parse_number<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.database, "debtbook.db");
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.cache_ttl(), Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("DEBTBOOK_DATABASE", "/tmp/ledger.db"),
            ("DEBTBOOK_LOG_LEVEL", "debug"),
            ("DEBTBOOK_RETRY_ATTEMPTS", "5"),
            ("DEBTBOOK_RETRY_DELAY_MS", " 10 "),
            ("DEBTBOOK_CACHE_TTL_SECS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.database, "/tmp/ledger.db");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.retry_attempts, 5);
        assert_eq!(config.retry_delay_ms, 10);
        assert!(config.cache_ttl().is_zero());
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[("DEBTBOOK_RETRY_ATTEMPTS", "many")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "DEBTBOOK_RETRY_ATTEMPTS",
                ..
            }
        ));
    }
}
