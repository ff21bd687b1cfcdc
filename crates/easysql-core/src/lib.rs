//! easysql core - shared abstractions for the easysql crates
//!
//! This crate defines the pieces every other easysql crate builds on:
//!
//! - `Connection` - one live database connection (opaque driver capability)
//! - `DatabaseDriver` - opens connections from `ConnectionSettings`
//! - `ConnectionSettings` - immutable connection configuration with a
//!   canonical key used for pool de-duplication
//! - `Value`, `Row`, `QueryResult` - what queries take and return
//! - `EasySqlError` - the error taxonomy shared by drivers, pools and the facade

mod connection;
mod driver;
mod error;
mod settings;
mod types;

pub use connection::*;
pub use driver::*;
pub use error::*;
pub use settings::*;
pub use types::*;
