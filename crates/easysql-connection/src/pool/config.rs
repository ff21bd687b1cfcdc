//! Pool configuration types

use std::time::Duration;

use easysql_core::{ConnectionSettings, EasySqlError, Result};
use easysql_core::{DEFAULT_ACQUIRE_TIMEOUT_MS, DEFAULT_IDLE_TIMEOUT_MS, DEFAULT_POOL_SIZE};
use serde::{Deserialize, Serialize};

/// Configuration for a connection pool
///
/// Controls pool sizing and timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of connections in use at the same time
    max_size: usize,
    /// Timeout in milliseconds when acquiring a connection from the pool
    acquire_timeout_ms: u64,
    /// Timeout in milliseconds before an idle connection is closed
    idle_timeout_ms: u64,
}

impl PoolConfig {
    /// Create a new pool configuration with the given maximum size
    ///
    /// # Panics
    ///
    /// Panics if `max_size` is 0.
    pub fn new(max_size: usize) -> Self {
        assert!(
            max_size > 0,
            "max_size must be greater than 0, got {}",
            max_size
        );

        Self {
            max_size,
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
        }
    }

    /// Derive the pool configuration described by connection settings
    pub fn from_settings(settings: &ConnectionSettings) -> Result<Self> {
        if settings.pool_size() == 0 {
            return Err(EasySqlError::Configuration(
                "pool_size must be greater than 0".into(),
            ));
        }

        Ok(Self {
            max_size: settings.pool_size(),
            acquire_timeout_ms: settings.acquire_timeout().as_millis() as u64,
            idle_timeout_ms: settings.idle_timeout().as_millis() as u64,
        })
    }

    /// Set the acquire timeout in milliseconds
    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Set the idle timeout in milliseconds
    pub fn with_idle_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.idle_timeout_ms = timeout_ms;
        self
    }

    /// Get the maximum pool size
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Get the acquire timeout as a Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Get the idle timeout as a Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

impl Default for PoolConfig {
    /// Defaults:
    /// - max_size: 10
    /// - acquire_timeout: 30 seconds
    /// - idle_timeout: 5 seconds
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}
