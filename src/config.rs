//! Runtime configuration read from the environment
//!
//! `.env` is loaded first (if present) by `main`, so every key below can
//! live there as well.
//!
//! | key | default |
//! |---|---|
//! | `PORT` | `8080` |
//! | `DATABASE_URL` | `staybook.db` |
//! | `SEED_FILE` | unset |
//! | `CANCELLATION_WINDOW_HOURS` | `12` |
//! | `RUST_LOG` | `staybook=debug,tower_http=debug` |

use std::env;
use std::str::FromStr;

use chrono::Duration;
use thiserror::Error;

use crate::booking::BookingPolicy;

pub const DEFAULT_LOG_FILTER: &str = "staybook=debug,tower_http=debug";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a valid number, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("CANCELLATION_WINDOW_HOURS must not be negative")]
    NegativeWindow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub seed_file: Option<String>,
    pub log_filter: String,
    pub cancellation_window_hours: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: "staybook.db".to_string(),
            seed_file: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            cancellation_window_hours: 12,
        }
    }
}

fn parse_number<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = parse_number("PORT", get("PORT"), defaults.port)?;
        let cancellation_window_hours = parse_number(
            "CANCELLATION_WINDOW_HOURS",
            get("CANCELLATION_WINDOW_HOURS"),
            defaults.cancellation_window_hours,
        )?;
        if cancellation_window_hours < 0 {
            return Err(ConfigError::NegativeWindow);
        }

        Ok(Self {
            port,
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            seed_file: get("SEED_FILE"),
            log_filter: get("RUST_LOG").unwrap_or(defaults.log_filter),
            cancellation_window_hours,
        })
    }

    pub fn policy(&self) -> BookingPolicy {
        BookingPolicy {
            cancellation_window: Duration::hours(self.cancellation_window_hours),
        }
    }
}
