use std::{env, fmt::Display, str::FromStr, time::Duration};

use protocol::Limits;
use thiserror::Error;
use tracing::{info, warn};

const DEFAULT_PORT: u16 = 1111;
const DEFAULT_DATABASE_PATH: &str = "campus.db";
const DEFAULT_PAGE_SIZE: u32 = 10;
const DEFAULT_MAX_PAGE_SIZE: u32 = 100;
const DEFAULT_QUERY_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_CORS_MAX_AGE_SECS: u64 = 60 * 60;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {key} value `{value}`: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("DEFAULT_PAGE_SIZE ({default}) must be between 1 and MAX_PAGE_SIZE ({max})")]
    PageSizeBounds { default: u32, max: u32 },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub query_timeout: Duration,
    pub cors_max_age: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            query_timeout: Duration::from_millis(DEFAULT_QUERY_TIMEOUT_MS),
            cors_max_age: Duration::from_secs(DEFAULT_CORS_MAX_AGE_SECS),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self {
            port: try_load("RUST_PORT", DEFAULT_PORT)?,
            database_path: try_load("DATABASE_PATH", DEFAULT_DATABASE_PATH.to_string())?,
            default_page_size: try_load("DEFAULT_PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
            max_page_size: try_load("MAX_PAGE_SIZE", DEFAULT_MAX_PAGE_SIZE)?,
            query_timeout: Duration::from_millis(try_load(
                "QUERY_TIMEOUT_MS",
                DEFAULT_QUERY_TIMEOUT_MS,
            )?),
            cors_max_age: Duration::from_secs(try_load(
                "CORS_MAX_AGE_SECS",
                DEFAULT_CORS_MAX_AGE_SECS,
            )?),
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(ConfigError::PageSizeBounds {
                default: self.default_page_size,
                max: self.max_page_size,
            });
        }

        Ok(())
    }

    pub fn limits(&self) -> Limits {
        Limits {
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
        }
    }
}

fn try_load<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(value) => value.parse().map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");

            ConfigError::Invalid {
                key,
                value,
                reason: e.to_string(),
            }
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
