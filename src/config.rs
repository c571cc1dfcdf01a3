//! Server configuration parsed from environment variables.
//!
//! All keys are optional:
//! - `PORT`: listen port, default 3000
//! - `LOCK_LEASE_SECS`: lock lease TTL, default 30
//! - `LOCK_SWEEP_INTERVAL_MS`: lease sweeper tick, default 1000
//! - `CLIENT_CHANNEL_CAPACITY`: per-session outbound queue, default 256
//!
//! A key that is present but unparseable (or zero where zero makes no sense)
//! is a startup error rather than a silent fallback to the default.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_LOCK_LEASE_SECS: u64 = 30;
pub const DEFAULT_LOCK_SWEEP_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_CLIENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub lock_lease: Duration,
    pub sweep_interval: Duration,
    pub client_channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            lock_lease: Duration::from_secs(DEFAULT_LOCK_LEASE_SECS),
            sweep_interval: Duration::from_millis(DEFAULT_LOCK_SWEEP_INTERVAL_MS),
            client_channel_capacity: DEFAULT_CLIENT_CHANNEL_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Build config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a key is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a key is set to an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = parse_or(&lookup, "PORT", DEFAULT_PORT)?;
        let lease_secs = parse_nonzero(&lookup, "LOCK_LEASE_SECS", DEFAULT_LOCK_LEASE_SECS)?;
        let sweep_ms = parse_nonzero(&lookup, "LOCK_SWEEP_INTERVAL_MS", DEFAULT_LOCK_SWEEP_INTERVAL_MS)?;
        let client_channel_capacity = parse_nonzero(&lookup, "CLIENT_CHANNEL_CAPACITY", DEFAULT_CLIENT_CHANNEL_CAPACITY)?;

        Ok(Self {
            port,
            lock_lease: Duration::from_secs(lease_secs),
            sweep_interval: Duration::from_millis(sweep_ms),
            client_channel_capacity,
        })
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn parse_nonzero<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
{
    let value = parse_or(lookup, key, default)?;
    if value == T::default() {
        return Err(ConfigError::Zero { key });
    }
    Ok(value)
}
