use std::{env, fmt::Display, str::FromStr, time::Duration};

use protocol::DEFAULT_PAGE_SIZE;
use tracing::{info, warn};

use crate::error::ConfigError;

const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Page size of a fresh view.
    pub page_size: u32,
    pub search_debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            search_debounce: Duration::from_millis(DEFAULT_SEARCH_DEBOUNCE_MS),
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            page_size: try_load("DEFAULT_PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
            search_debounce: Duration::from_millis(try_load(
                "SEARCH_DEBOUNCE_MS",
                DEFAULT_SEARCH_DEBOUNCE_MS,
            )?),
        };
        config.validate()?;

        Ok(config)
    }

    /// A fresh view must start from a page size of at least one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid {
                key: "DEFAULT_PAGE_SIZE",
                value: self.page_size.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
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
