//! Query error logging hook

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use crate::EasySqlError;

/// Severity used when reporting failed queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    #[default]
    Error,
}

impl LogLevel {
    pub fn as_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Emit one log record for every failed query
///
/// Records go through `tracing` with target `easysql::query`; the installed
/// subscriber plays the role of the logger.
///
/// Accepts either the flat form `{ "level": "warn" }` or the event form
/// `{ "logger": ..., "events": { "error": { "level": "warn" } } }`. A
/// `logger` entry is accepted and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "QueryLoggingRepr")]
pub struct QueryLogging {
    pub level: LogLevel,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct QueryLoggingRepr {
    #[serde(default)]
    level: Option<LogLevel>,
    #[serde(default, rename = "logger")]
    _logger: Option<IgnoredAny>,
    #[serde(default)]
    events: Option<LoggingEvents>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LoggingEvents {
    #[serde(default)]
    error: Option<ErrorEvent>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ErrorEvent {
    #[serde(default)]
    level: Option<LogLevel>,
}

impl TryFrom<QueryLoggingRepr> for QueryLogging {
    type Error = String;

    fn try_from(repr: QueryLoggingRepr) -> Result<Self, Self::Error> {
        let event_level = repr.events.and_then(|e| e.error).and_then(|e| e.level);
        let level = match (repr.level, event_level) {
            (Some(flat), Some(event)) if flat != event => {
                return Err(format!(
                    "conflicting logging levels: level = {flat:?}, events.error.level = {event:?}"
                ));
            }
            (Some(level), _) | (None, Some(level)) => level,
            (None, None) => LogLevel::default(),
        };
        Ok(Self { level })
    }
}

impl QueryLogging {
    pub fn new(level: LogLevel) -> Self {
        Self { level }
    }

    /// Report a failed query at the configured level
    pub fn log_failure(&self, sql: &str, error: &EasySqlError) {
        let sql_preview: String = sql.chars().take(100).collect();
        let code = error.query_error().and_then(|e| e.code);
        match self.level {
            LogLevel::Trace => {
                tracing::trace!(target: "easysql::query", sql = %sql_preview, code = ?code, error = %error, "query failed")
            }
            LogLevel::Debug => {
                tracing::debug!(target: "easysql::query", sql = %sql_preview, code = ?code, error = %error, "query failed")
            }
            LogLevel::Info => {
                tracing::info!(target: "easysql::query", sql = %sql_preview, code = ?code, error = %error, "query failed")
            }
            LogLevel::Warn => {
                tracing::warn!(target: "easysql::query", sql = %sql_preview, code = ?code, error = %error, "query failed")
            }
            LogLevel::Error => {
                tracing::error!(target: "easysql::query", sql = %sql_preview, code = ?code, error = %error, "query failed")
            }
        }
    }
}
