//! Connection pooling for database connections
//!
//! This module provides a bounded connection pool with idle eviction and
//! statistics tracking, plus the [`Pool`] trait that any pool handed to the
//! query facade must implement.
//!
//! # Example
//!
//! ```ignore
//! use easysql_connection::pool::{ConnectionPool, Pool, PoolConfig};
//!
//! let config = PoolConfig::new(5)
//!     .with_acquire_timeout_ms(5000)
//!     .with_idle_timeout_ms(30000);
//!
//! let pool = ConnectionPool::new("mysql_app", config, connection_factory);
//! if let Some(conn) = pool.acquire().await? {
//!     // Use connection...
//!     pool.release(conn);
//! }
//! ```

mod config;
mod pool;
mod stats;

#[cfg(test)]
mod tests;

pub use config::PoolConfig;
pub(crate) use pool::close_detached;
pub use pool::{ConnectionFactory, ConnectionPool, DriverConnectionFactory, Pool};
pub use stats::PoolStats;
