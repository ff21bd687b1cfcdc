//! easysql - run SQL without managing connections
//!
//! [`EasySql`] runs statements against a database and hands every connection
//! back as soon as the statement finishes. Where connections come from is
//! decided once, when the facade is built:
//!
//! - directly from the driver, one connection per call
//! - from a pool the caller supplies ([`Pool`])
//! - from a pool managed by a [`PoolRegistry`], shared by every facade built
//!   from the same settings
//!
//! ```ignore
//! use easysql::{ConnectionSettings, EasySql, PoolRegistry};
//!
//! let registry = PoolRegistry::with_default_drivers();
//! let settings = ConnectionSettings::mysql()
//!     .with_user("app")
//!     .with_database("widgets")
//!     .with_internal_pool(true);
//!
//! let db = EasySql::connect(&registry, &settings)?;
//! db.execute("insert into widgets (name) values (?)", ["foo"]).await?;
//! let row = db.get_one("select name from widgets", ()).await?;
//! ```

mod facade;
mod params;

pub use facade::EasySql;
pub use params::Params;

pub use easysql_connection::{
    ConnectionFactory, ConnectionHandle, ConnectionMode, ConnectionPool, ConnectionSource,
    DriverConnectionFactory, Pool, PoolConfig, PoolRegistry, PoolStats,
};
pub use easysql_core::{
    ColumnMeta, Connection, ConnectionSettings, DatabaseDriver, EasySqlError, LogLevel,
    QueryError, QueryLogging, QueryResult, Result, Row, Value,
};
pub use easysql_drivers::DriverRegistry;
