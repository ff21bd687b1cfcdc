//! easysql drivers - database driver implementations
//!
//! This crate re-exports the concrete drivers enabled through cargo features
//! and provides the [`DriverRegistry`] used to look them up by name.

#[cfg(feature = "mysql")]
pub use easysql_driver_mysql as mysql;
#[cfg(feature = "sqlite")]
pub use easysql_driver_sqlite as sqlite;

mod registry;

pub use registry::DriverRegistry;

/// Re-export commonly used types from easysql-core
pub use easysql_core::{
    ColumnMeta, Connection, ConnectionSettings, DatabaseDriver, EasySqlError, QueryResult, Result,
    Row, Value,
};
