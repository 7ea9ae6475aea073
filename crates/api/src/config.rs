//! Process configuration read from environment variables.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    #[default]
    Development,
    Test,
    Production,
}

impl AppEnv {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "development" => Some(Self::Development),
            "test" => Some(Self::Test),
            "production" => Some(Self::Production),
            _ => None,
        }
    }

    pub fn is_development(self) -> bool {
        self == Self::Development
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub env: AppEnv,
    pub database_max_connections: u32,
    /// Upper bound on a row-lock wait; `None` waits indefinitely.
    pub lock_timeout: Option<Duration>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(raw) => parse_number("PORT", &raw)?,
            None => DEFAULT_PORT,
        };

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let env_var = get("APP_ENV")
            .map(|v| ("APP_ENV", v))
            .or_else(|| get("NODE_ENV").map(|v| ("NODE_ENV", v)));
        let env = match env_var {
            Some((name, raw)) => AppEnv::parse(raw.trim()).ok_or(ConfigError::Invalid {
                name,
                value: raw,
                reason: "expected development, test or production",
            })?,
            None => AppEnv::default(),
        };

        let database_max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => {
                let n: u32 = parse_number("DATABASE_MAX_CONNECTIONS", &raw)?;
                if n == 0 {
                    return Err(ConfigError::Invalid {
                        name: "DATABASE_MAX_CONNECTIONS",
                        value: raw,
                        reason: "must be at least 1",
                    });
                }
                n
            }
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let lock_timeout = match get("LEDGER_LOCK_TIMEOUT_MS") {
            Some(raw) => {
                let ms: u64 = parse_number("LEDGER_LOCK_TIMEOUT_MS", &raw)?;
                (ms > 0).then(|| Duration::from_millis(ms))
            }
            None => None,
        };

        Ok(Self {
            port,
            database_url,
            env,
            database_max_connections,
            lock_timeout,
        })
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
        reason: "expected a non-negative integer",
    })
}
