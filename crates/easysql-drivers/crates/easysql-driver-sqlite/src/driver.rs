//! SQLite driver implementation

use async_trait::async_trait;
use easysql_core::{Connection, ConnectionSettings, DatabaseDriver, EasySqlError, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::SqliteConnection;

/// SQLite database driver
pub struct SqliteDriver;

impl SqliteDriver {
    /// Create a new SQLite driver instance
    pub fn new() -> Self {
        tracing::debug!("SQLite driver initialized");
        Self
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn display_name(&self) -> &'static str {
        "SQLite"
    }

    fn connection_string_help(&self) -> &'static str {
        "/path/to/database.db or :memory:"
    }

    #[tracing::instrument(skip(self, settings), fields(path = settings.database()))]
    async fn connect(&self, settings: &ConnectionSettings) -> Result<Arc<dyn Connection>> {
        let path = settings.database().ok_or_else(|| {
            EasySqlError::Configuration(
                "SQLite requires a 'database' path. Example: { \"database\": \"/path/to/database.db\" }"
                    .into(),
            )
        })?;

        let conn = match settings.param("busy_timeout") {
            Some(ms) => {
                let ms: u64 = ms.parse().map_err(|_| {
                    EasySqlError::Configuration(format!("Invalid busy_timeout: {}", ms))
                })?;
                SqliteConnection::open_with_busy_timeout(path, Duration::from_millis(ms))
            }
            None => SqliteConnection::open(path),
        }
        .map_err(|e| {
            tracing::error!(error = %e, "failed to connect to SQLite database");
            e
        })?;

        tracing::info!(path = %path, "SQLite connection created");
        Ok(Arc::new(conn))
    }

    fn build_connection_string(&self, settings: &ConnectionSettings) -> String {
        settings.database().unwrap_or(":memory:").to_string()
    }
}
