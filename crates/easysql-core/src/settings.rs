//! Connection settings
//!
//! [`ConnectionSettings`] is the immutable configuration value every
//! connection path starts from. It is never mutated after construction: the
//! `with_*` builders consume and return a new value, so a caller's settings
//! cannot be changed behind its back by the pool or facade.
//!
//! Two settings values describe the same pool iff their
//! [`ConnectionSettings::canonical_key`] strings are equal.

mod logging;


pub use logging::{LogLevel, QueryLogging};

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{EasySqlError, Result};

/// Default maximum number of pooled connections
pub const DEFAULT_POOL_SIZE: usize = 10;
/// Default idle timeout for pooled connections, in milliseconds
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 5_000;
/// Default time to wait for a pooled connection, in milliseconds
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 30_000;

/// Connection configuration
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionSettings {
    /// Driver ID (e.g., "mysql", "sqlite")
    driver: String,
    /// Database user
    user: Option<String>,
    /// Password, if the server requires one
    password: Option<String>,
    /// Host address
    host: String,
    /// Port number (None = driver default)
    port: Option<u16>,
    /// Database name (file path for SQLite)
    database: Option<String>,
    /// Maximum connections in an internally managed pool
    pool_size: usize,
    /// Idle time before a pooled connection is evicted, in milliseconds
    #[serde(alias = "idle_timeout")]
    idle_timeout_ms: u64,
    /// Time to wait for a pooled connection, in milliseconds
    #[serde(alias = "acquire_timeout")]
    acquire_timeout_ms: u64,
    /// Use an internally managed pool shared by all identical settings
    use_internal_pool: bool,
    /// Additional driver parameters
    params: BTreeMap<String, String>,
    /// Optional log event emitted for every failed query
    logging: Option<QueryLogging>,
}

/// Borrowed view of the fields that decide pool identity.
///
/// Field order is fixed by this struct and `params` is a sorted map, so the
/// serialization does not depend on how the settings were assembled.
#[derive(Serialize)]
struct CanonicalSettings<'a> {
    driver: &'a str,
    user: Option<&'a str>,
    password: Option<&'a str>,
    host: &'a str,
    port: Option<u16>,
    database: Option<&'a str>,
    pool_size: usize,
    idle_timeout_ms: u64,
    acquire_timeout_ms: u64,
    params: &'a BTreeMap<String, String>,
}

impl ConnectionSettings {
    /// Create settings for the given driver with default values
    pub fn new(driver: &str) -> Self {
        Self {
            driver: driver.to_string(),
            ..Self::default()
        }
    }

    /// Create MySQL settings
    pub fn mysql() -> Self {
        Self::new("mysql")
    }

    /// Create SQLite settings for a database file (or `:memory:`)
    pub fn sqlite(path: &str) -> Self {
        Self::new("sqlite").with_database(path)
    }

    /// Parse settings from a JSON object
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EasySqlError::Configuration(e.to_string()))
    }

    /// Parse settings from a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn with_user(mut self, user: &str) -> Self {
        self.user = Some(user.to_string());
        self
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn with_host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_database(mut self, database: &str) -> Self {
        self.database = Some(database.to_string());
        self
    }

    /// Set the maximum size of an internally managed pool
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_idle_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.idle_timeout_ms = timeout_ms;
        self
    }

    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Request (or stop requesting) an internally managed pool
    pub fn with_internal_pool(mut self, enabled: bool) -> Self {
        self.use_internal_pool = enabled;
        self
    }

    /// Set an additional driver parameter
    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        let str_val = match value.into() {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        self.params.insert(key.to_string(), str_val);
        self
    }

    pub fn with_logging(mut self, logging: QueryLogging) -> Self {
        self.logging = Some(logging);
        self
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Configured port, if any
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Configured port, or the given driver default
    pub fn port_or(&self, default: u16) -> u16 {
        self.port.unwrap_or(default)
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn use_internal_pool(&self) -> bool {
        self.use_internal_pool
    }

    /// Get an additional driver parameter
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn logging(&self) -> Option<&QueryLogging> {
        self.logging.as_ref()
    }

    /// Check that the settings can be used to connect
    ///
    /// `user` and `database` are required. Pool sizing is checked when a
    /// pool is actually built from these settings.
    pub fn validate(&self) -> Result<()> {
        if self.driver.trim().is_empty() {
            return Err(EasySqlError::Configuration("driver is required".into()));
        }
        if self.user.as_deref().is_none_or(|u| u.is_empty()) {
            return Err(EasySqlError::Configuration("user is required".into()));
        }
        if self.database.as_deref().is_none_or(|d| d.is_empty()) {
            return Err(EasySqlError::Configuration("database is required".into()));
        }
        Ok(())
    }

    /// Deterministic serialization identifying the pool these settings describe
    ///
    /// The logging hook is not part of the key: two facades that only differ
    /// in how they log errors share one pool.
    pub fn canonical_key(&self) -> Result<String> {
        let canonical = CanonicalSettings {
            driver: &self.driver,
            user: self.user.as_deref(),
            password: self.password.as_deref(),
            host: &self.host,
            port: self.port,
            database: self.database.as_deref(),
            pool_size: self.pool_size,
            idle_timeout_ms: self.idle_timeout_ms,
            acquire_timeout_ms: self.acquire_timeout_ms,
            params: &self.params,
        };
        Ok(serde_json::to_string(&canonical)?)
    }

    /// Human readable pool name, `<driver>_<database>`
    pub fn pool_name(&self) -> String {
        format!("{}_{}", self.driver, self.database.as_deref().unwrap_or(""))
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            driver: "mysql".to_string(),
            user: None,
            password: None,
            host: "localhost".to_string(),
            port: None,
            database: None,
            pool_size: DEFAULT_POOL_SIZE,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
            use_internal_pool: false,
            params: BTreeMap::new(),
            logging: None,
        }
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("driver", &self.driver)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("pool_size", &self.pool_size)
            .field("idle_timeout_ms", &self.idle_timeout_ms)
            .field("acquire_timeout_ms", &self.acquire_timeout_ms)
            .field("use_internal_pool", &self.use_internal_pool)
            .field("params", &self.params)
            .field("logging", &self.logging)
            .finish()
    }
}
