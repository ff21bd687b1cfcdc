//! Database driver trait definition

use crate::{Connection, ConnectionSettings, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Core driver trait that all database drivers must implement
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Unique identifier for this driver (e.g., "mysql", "sqlite")
    fn name(&self) -> &'static str;

    /// Display name for logs and messages
    fn display_name(&self) -> &'static str {
        self.name()
    }

    /// Default connection port (None for file-based databases like SQLite)
    fn default_port(&self) -> Option<u16> {
        None
    }

    /// Connection string format help text
    fn connection_string_help(&self) -> &'static str {
        ""
    }

    /// Open a new connection
    async fn connect(&self, settings: &ConnectionSettings) -> Result<Arc<dyn Connection>>;

    /// Open a connection, run a trivial query and close it again
    async fn test_connection(&self, settings: &ConnectionSettings) -> Result<()> {
        let conn = self.connect(settings).await?;
        let probe = conn.query("SELECT 1", &[]).await;
        conn.close().await?;
        probe.map(|_| ())
    }

    /// Build a connection string from settings, with the password redacted
    fn build_connection_string(&self, settings: &ConnectionSettings) -> String;
}
