//! Error types for easysql

use std::fmt;

use thiserror::Error;

/// Error reported by the database itself while running a statement.
///
/// The driver's message, numeric code and SQLSTATE are kept exactly as the
/// server reported them so callers can branch on them (e.g. MySQL 1062 for a
/// duplicate key).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    /// Driver-specific numeric error code
    pub code: Option<i64>,
    /// Five character SQLSTATE, when the driver reports one
    pub sql_state: Option<String>,
    /// Message as reported by the driver
    pub message: String,
}

impl QueryError {
    /// Create a query error with only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            sql_state: None,
            message: message.into(),
        }
    }

    /// Attach a driver error code
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a SQLSTATE
    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.sql_state) {
            (Some(code), Some(state)) => write!(f, "{} ({}): {}", code, state, self.message),
            (Some(code), None) => write!(f, "{}: {}", code, self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

/// Core error type for easysql operations
#[derive(Error, Debug)]
pub enum EasySqlError {
    /// The driver could not open or talk to a connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// No usable connection could be produced (connect failure, pool
    /// exhaustion or acquire timeout)
    #[error("Acquisition error: {0}")]
    Acquisition(String),

    /// A pool reported success but handed out no connection
    #[error("Client not acquired: pool returned no connection")]
    NoConnection,

    /// The database rejected the statement
    #[error("Query error: {0}")]
    Query(QueryError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Driver error: {0}")]
    Driver(String),

    /// A connection handle was used after it was released
    #[error("Connection handle already released")]
    HandleReleased,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl EasySqlError {
    /// Wrap any error that prevented a connection from being handed out
    pub fn acquisition(err: impl fmt::Display) -> Self {
        Self::Acquisition(err.to_string())
    }

    /// Whether this error means no connection could be obtained
    pub fn is_acquisition(&self) -> bool {
        matches!(self, Self::Acquisition(_) | Self::NoConnection)
    }

    /// Whether this error came from the database rejecting a statement
    pub fn is_query(&self) -> bool {
        matches!(self, Self::Query(_))
    }

    /// The driver error details, if this is a query error
    pub fn query_error(&self) -> Option<&QueryError> {
        match self {
            Self::Query(err) => Some(err),
            _ => None,
        }
    }
}

impl From<QueryError> for EasySqlError {
    fn from(err: QueryError) -> Self {
        Self::Query(err)
    }
}

impl From<toml::de::Error> for EasySqlError {
    fn from(err: toml::de::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Result type alias for easysql operations
pub type Result<T> = std::result::Result<T, EasySqlError>;
