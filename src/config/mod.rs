//! Environment-driven configuration.

use crate::crypto::Cipher;
use crate::error::ConfigError;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_SCHEMA: &str = "public";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_REQUEST_BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    /// PostgreSQL schema holding the tables.
    pub db_schema: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Log every statement at info level.
    pub db_debug: bool,
    pub server_addr: SocketAddr,
    pub request_body_limit: usize,
    /// Create missing tables at startup.
    pub auto_migrate: bool,
    /// Key sealing connector config data and token values, from `aesgcm:<hex>`.
    pub data_encryption: Option<Cipher>,
}

impl Config {
    /// Reads the process environment, after loading `.env` when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = get("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let db_schema = get("DB_SCHEMA").unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
        if db_schema.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "DB_SCHEMA",
                message: "must not be empty".into(),
            });
        }
        Ok(Config {
            database_url,
            db_schema,
            max_connections: parse(&get, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            acquire_timeout: Duration::from_secs(parse(
                &get,
                "DB_ACQUIRE_TIMEOUT_SECS",
                DEFAULT_ACQUIRE_TIMEOUT_SECS,
            )?),
            db_debug: parse_bool(&get, "DB_DEBUG", false)?,
            server_addr: match get("SERVER_ADDR") {
                Some(v) => v.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    name: "SERVER_ADDR",
                    message: e.to_string(),
                })?,
                None => SocketAddr::from(([0, 0, 0, 0], 3000)),
            },
            request_body_limit: parse(&get, "REQUEST_BODY_LIMIT", DEFAULT_REQUEST_BODY_LIMIT)?,
            auto_migrate: parse_bool(&get, "AUTO_MIGRATE", true)?,
            data_encryption: match get("DATA_ENCRYPTION").filter(|v| !v.trim().is_empty()) {
                Some(v) => Some(Cipher::parse(&v).map_err(|e| ConfigError::Invalid {
                    name: "DATA_ENCRYPTION",
                    message: e.to_string(),
                })?),
                None => None,
            },
        })
    }
}

fn parse<T>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(name) {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            message: e.to_string(),
        }),
    }
}

fn parse_bool(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match get(name).as_deref().map(str::trim).map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            name,
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply() {
        let env = lookup(&[("DATABASE_URL", "postgres://localhost/walrus")]);
        let cfg = Config::from_lookup(env).unwrap();
        assert_eq!(cfg.db_schema, DEFAULT_SCHEMA);
        assert_eq!(cfg.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(cfg.acquire_timeout, Duration::from_secs(30));
        assert!(!cfg.db_debug);
        assert_eq!(cfg.server_addr.to_string(), DEFAULT_SERVER_ADDR);
        assert_eq!(cfg.request_body_limit, DEFAULT_REQUEST_BODY_LIMIT);
        assert!(cfg.auto_migrate);
        assert!(cfg.data_encryption.is_none());
    }

    #[test]
    fn data_encryption_key_is_parsed() {
        let cfg = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/walrus"),
            ("DATA_ENCRYPTION", "aesgcm:000102030405060708090a0b0c0d0e0f"),
        ]))
        .unwrap();
        assert!(matches!(cfg.data_encryption, Some(Cipher::Aes128(_))));

        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/walrus"),
            ("DATA_ENCRYPTION", "aesgcm:0001"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "DATA_ENCRYPTION", .. }));
    }

    #[test]
    fn database_url_is_required() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/walrus"),
            ("DB_MAX_CONNECTIONS", "many"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "DB_MAX_CONNECTIONS", .. }));

        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/walrus"),
            ("AUTO_MIGRATE", "maybe"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "AUTO_MIGRATE", .. }));
    }

    #[test]
    fn overrides_are_read() {
        let cfg = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/walrus"),
            ("DB_SCHEMA", "walrus"),
            ("DB_DEBUG", "true"),
            ("SERVER_ADDR", "127.0.0.1:8080"),
            ("AUTO_MIGRATE", "0"),
        ]))
        .unwrap();
        assert_eq!(cfg.db_schema, "walrus");
        assert!(cfg.db_debug);
        assert_eq!(cfg.server_addr.port(), 8080);
        assert!(!cfg.auto_migrate);
    }
}
