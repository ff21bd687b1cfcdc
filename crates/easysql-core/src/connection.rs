//! Connection trait

use crate::{QueryResult, Result, Value};
use async_trait::async_trait;

/// A single live database connection
///
/// Implementations pass `sql` and `params` to the database untouched and
/// report database-side failures as [`crate::EasySqlError::Query`]. A
/// connection runs one statement at a time; callers that share one must
/// serialize their calls.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "sqlite", "mysql")
    fn driver_name(&self) -> &str;

    /// Run a statement and return whatever it produced
    ///
    /// Row-returning statements fill `rows`; anything else reports
    /// `affected_rows` (and `last_insert_id` where the driver knows it).
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Close the connection
    ///
    /// Closing an already closed connection is a no-op.
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}
