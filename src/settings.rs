//! Process settings from the environment (and `.env` via dotenvy).

use crate::error::ConfigError;
use std::str::FromStr;

pub const DEFAULT_RESOURCE_CONFIG: &str = "resources.json";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_API_PREFIX: &str = "/api/v1";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// No database: the in-memory store is used.
    pub database_url: Option<String>,
    pub resource_config: String,
    pub bind_addr: String,
    pub api_prefix: String,
    pub db_max_connections: u32,
    pub body_limit_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: None,
            resource_config: DEFAULT_RESOURCE_CONFIG.into(),
            bind_addr: DEFAULT_BIND_ADDR.into(),
            api_prefix: DEFAULT_API_PREFIX.into(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
        }
    }
}

impl Settings {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        let get = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Ok(Settings {
            database_url: get("DATABASE_URL"),
            resource_config: get("RESOURCE_CONFIG").unwrap_or(defaults.resource_config),
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            api_prefix: normalize_prefix(&get("API_PREFIX").unwrap_or(defaults.api_prefix)),
            db_max_connections: parse(get("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            body_limit_bytes: parse(get("BODY_LIMIT_BYTES"), "BODY_LIMIT_BYTES", defaults.body_limit_bytes)?,
        })
    }
}

fn parse<T: FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| ConfigError::Load(format!("{} must be a number, got '{}'", key, v))),
    }
}

/// `api/v1/` -> `/api/v1`; `/` -> empty (mount at the root).
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_apply() {
        assert_eq!(settings(&[]).unwrap(), Settings::default());
    }

    #[test]
    fn overrides_and_prefix_normalization() {
        let s = settings(&[("API_PREFIX", "api/v2/"), ("DB_MAX_CONNECTIONS", "12"), ("DATABASE_URL", " ")]).unwrap();
        assert_eq!(s.api_prefix, "/api/v2");
        assert_eq!(s.db_max_connections, 12);
        assert_eq!(s.database_url, None);
        assert_eq!(settings(&[("API_PREFIX", "/")]).unwrap().api_prefix, "");
    }

    #[test]
    fn bad_numbers_are_rejected() {
        assert!(settings(&[("BODY_LIMIT_BYTES", "lots")]).is_err());
    }
}
