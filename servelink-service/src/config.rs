use std::env;

use chrono::TimeDelta;

const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8100";
const DEFAULT_POOL_SIZE: usize = 16;
const DEFAULT_ACCESS_TOKEN_HOURS: i64 = 8;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value `{value}`")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub secret_key: String,
    pub kafka_url: Option<String>,
    pub public_base_url: String,
    pub listen_addr: String,
    pub pool_size: usize,
    pub access_token_expires: TimeDelta,
}

impl Config {
    /// Reads the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let pool_size = match lookup("DATABASE_POOL_SIZE") {
            Some(value) => value
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid {
                    name: "DATABASE_POOL_SIZE",
                    value,
                })?,
            None => DEFAULT_POOL_SIZE,
        };
        let token_hours = match lookup("ACCESS_TOKEN_HOURS") {
            Some(value) => value
                .parse::<i64>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid {
                    name: "ACCESS_TOKEN_HOURS",
                    value,
                })?,
            None => DEFAULT_ACCESS_TOKEN_HOURS,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            secret_key: required("SECRET_KEY")?,
            kafka_url: lookup("KAFKA_URL").filter(|v| !v.is_empty()),
            public_base_url: lookup("PUBLIC_BASE_URL")
                .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string()),
            listen_addr: lookup("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            pool_size,
            access_token_expires: TimeDelta::hours(token_hours),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/servelink"),
            ("SECRET_KEY", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.kafka_url, None);
        assert_eq!(config.public_base_url, "http://localhost:8080");
        assert_eq!(config.listen_addr, "0.0.0.0:8100");
        assert_eq!(config.pool_size, 16);
        assert_eq!(config.access_token_expires, TimeDelta::hours(8));
    }

    #[test]
    fn test_missing_required() {
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/x")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing("SECRET_KEY"));
    }

    #[test]
    fn test_invalid_pool_size() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/x"),
            ("SECRET_KEY", "secret"),
            ("DATABASE_POOL_SIZE", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "DATABASE_POOL_SIZE",
                ..
            }
        ));
    }
}
