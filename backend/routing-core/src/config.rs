use resilience::RetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Tunables for the routing core, env-driven with production defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Liveness sweep interval in seconds (default: 30)
    pub sweep_interval_secs: u64,
    /// Inactivity after which a record turns stale, seconds (default: 120)
    pub stale_threshold_secs: u64,
    /// Inactivity after which a record is evicted, seconds (default: 24h)
    pub hard_expiry_secs: u64,
    /// Deadline for each individual delivery attempt, seconds (default: 5)
    pub attempt_timeout_secs: u64,
    /// Total delivery attempts per dispatch, including the first (default: 3)
    pub max_attempts: u32,
    /// Base backoff between attempts, milliseconds (default: 200)
    pub backoff_base_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 30,
            stale_threshold_secs: 120,
            hard_expiry_secs: 86_400,
            attempt_timeout_secs: 5,
            max_attempts: 3,
            backoff_base_ms: 200,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();
        Ok(Config {
            sweep_interval_secs: env_parse("SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs)?,
            stale_threshold_secs: env_parse(
                "STALE_THRESHOLD_SECS",
                defaults.stale_threshold_secs,
            )?,
            hard_expiry_secs: env_parse("HARD_EXPIRY_SECS", defaults.hard_expiry_secs)?,
            attempt_timeout_secs: env_parse(
                "ATTEMPT_TIMEOUT_SECS",
                defaults.attempt_timeout_secs,
            )?,
            max_attempts: env_parse("DISPATCH_MAX_ATTEMPTS", defaults.max_attempts)?,
            backoff_base_ms: env_parse("DISPATCH_BACKOFF_BASE_MS", defaults.backoff_base_ms)?,
        })
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_threshold_secs)
    }

    pub fn hard_expiry(&self) -> Duration {
        Duration::from_secs(self.hard_expiry_secs)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            base_backoff: Duration::from_millis(self.backoff_base_ms),
            ..RetryConfig::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| Error::Config(format!("invalid value for {key}: {raw}"))),
        Err(_) => Ok(default),
    }
}
