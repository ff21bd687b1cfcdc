//! easysql connection - pooling and connection lifecycle
//!
//! This crate decides where a connection comes from and makes sure it goes
//! back there:
//!
//! - [`pool`] - the bounded [`ConnectionPool`] and the [`Pool`] contract an
//!   externally supplied pool honors
//! - [`PoolRegistry`] - one pool per distinct connection configuration
//! - [`ConnectionHandle`] - a single acquired connection that must be released

mod handle;
pub mod pool;
mod registry;

pub use handle::{ConnectionHandle, ConnectionMode, ConnectionSource};
pub use pool::{
    ConnectionFactory, ConnectionPool, DriverConnectionFactory, Pool, PoolConfig, PoolStats,
};
pub use registry::PoolRegistry;
