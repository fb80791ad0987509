//! Service configuration (environment variables + defaults).

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use crate::domain::aggregates::DEFAULT_ALERT_THRESHOLD;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InventoryConfig {
    /// Postgres URL; without one the service keeps state in memory.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub nats_url: Option<String>,
    pub port: u16,
    pub lock_timeout: Duration,
    pub default_alert_threshold: i64,
}

impl InventoryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let lock_timeout_ms: u64 = parse(&lookup, "INVENTORY_LOCK_TIMEOUT_MS", 5_000)?;
        let default_alert_threshold: i64 = parse(&lookup, "INVENTORY_DEFAULT_ALERT_THRESHOLD", DEFAULT_ALERT_THRESHOLD)?;
        if default_alert_threshold < 0 {
            return Err(ConfigError::Invalid { name: "INVENTORY_DEFAULT_ALERT_THRESHOLD", value: default_alert_threshold.to_string() });
        }
        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            database_max_connections: parse(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            nats_url: non_empty("NATS_URL"),
            port: parse(&lookup, "PORT", 8084)?,
            lock_timeout: Duration::from_millis(lock_timeout_ms.max(1)),
            default_alert_threshold,
        })
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &'static str, default: T) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<InventoryConfig, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        InventoryConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.database_url, None);
        assert_eq!(c.port, 8084);
        assert_eq!(c.lock_timeout, Duration::from_secs(5));
        assert_eq!(c.default_alert_threshold, 5);
    }

    #[test]
    fn test_overrides() {
        let c = config(&[("DATABASE_URL", "postgres://localhost/inv"), ("INVENTORY_LOCK_TIMEOUT_MS", "250"), ("PORT", "9000")]).unwrap();
        assert_eq!(c.database_url.as_deref(), Some("postgres://localhost/inv"));
        assert_eq!(c.lock_timeout, Duration::from_millis(250));
        assert_eq!(c.port, 9000);
    }

    #[test]
    fn test_malformed_values_are_errors() {
        assert_eq!(config(&[("PORT", "eighty")]).unwrap_err(), ConfigError::Invalid { name: "PORT", value: "eighty".into() });
        assert!(config(&[("INVENTORY_DEFAULT_ALERT_THRESHOLD", "-1")]).is_err());
    }
}
