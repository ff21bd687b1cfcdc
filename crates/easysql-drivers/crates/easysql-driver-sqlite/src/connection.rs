//! SQLite connection implementation

use async_trait::async_trait;
use easysql_core::{
    ColumnMeta, Connection, EasySqlError, QueryError, QueryResult, Result, Row, Value,
};
use parking_lot::Mutex;
use rusqlite::{Connection as RusqliteConnection, OpenFlags, params_from_iter};
use std::sync::Arc;
use std::time::Duration;

/// Default busy timeout so several connections can share one database file
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite connection wrapper
pub struct SqliteConnection {
    /// `None` once the connection has been closed
    conn: Mutex<Option<RusqliteConnection>>,
}

impl SqliteConnection {
    /// Open a SQLite database
    pub fn open(path: &str) -> Result<Self> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open a SQLite database, waiting up to `busy_timeout` for locks held by
    /// other connections
    pub fn open_with_busy_timeout(path: &str, busy_timeout: Duration) -> Result<Self> {
        tracing::info!(path = %path, "opening SQLite database");

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = if path == ":memory:" {
            RusqliteConnection::open_in_memory().map_err(|e| {
                EasySqlError::Connection(format!("Failed to open in-memory database: {}", e))
            })?
        } else {
            // Validate that parent directory exists for non-URI paths
            if !path.starts_with("file:") {
                let file_path = std::path::Path::new(path);
                if let Some(parent) = file_path.parent()
                    && !parent.as_os_str().is_empty()
                    && !parent.exists()
                {
                    return Err(EasySqlError::Connection(format!(
                        "Parent directory does not exist: {}",
                        parent.display()
                    )));
                }
            }

            RusqliteConnection::open_with_flags(path, flags).map_err(|e| {
                EasySqlError::Connection(format!(
                    "Failed to open SQLite database at '{}': {}",
                    path, e
                ))
            })?
        };

        conn.pragma_update(None, "foreign_keys", "ON").map_err(|e| {
            EasySqlError::Connection(format!("Failed to enable foreign keys: {}", e))
        })?;

        conn.busy_timeout(busy_timeout)
            .map_err(|e| EasySqlError::Connection(format!("Failed to set busy timeout: {}", e)))?;

        tracing::info!(path = %path, "SQLite database connection established");
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let start_time = std::time::Instant::now();

        let guard = self.conn.lock();
        let conn = guard
            .as_ref()
            .ok_or_else(|| EasySqlError::Connection("SQLite connection is closed".into()))?;
        let rusqlite_params = values_to_rusqlite(params);

        let mut stmt = conn.prepare(sql).map_err(to_query_error)?;

        // Statements without result columns (INSERT, UPDATE, DDL) only report
        // how many rows they touched.
        let column_count = stmt.column_count();
        if column_count == 0 {
            let rowid_before = conn.last_insert_rowid();
            let affected_rows = stmt
                .execute(params_from_iter(rusqlite_params.iter()))
                .map_err(to_query_error)?;
            // The rowid is per connection; only report it when this
            // statement inserted a row.
            let rowid = conn.last_insert_rowid();
            let inserted = rowid != rowid_before || is_insert(sql);
            let last_insert_id = (affected_rows > 0 && inserted)
                .then_some(rowid)
                .and_then(|id| u64::try_from(id).ok())
                .filter(|id| *id > 0);

            tracing::debug!(affected_rows = affected_rows, "statement executed");
            return Ok(QueryResult {
                affected_rows: affected_rows as u64,
                last_insert_id,
                execution_time_ms: start_time.elapsed().as_millis() as u64,
                ..QueryResult::empty()
            });
        }

        let mut column_names: Vec<String> = Vec::with_capacity(column_count);
        let mut columns: Vec<ColumnMeta> = Vec::with_capacity(column_count);
        for (idx, col) in stmt.columns().iter().enumerate() {
            let name = col.name().to_string();
            column_names.push(name.clone());
            columns.push(ColumnMeta {
                name,
                data_type: col.decl_type().unwrap_or("DYNAMIC").to_string(),
                ordinal: idx,
            });
        }
        let column_names: Arc<[String]> = Arc::from(column_names);

        let mut rows = Vec::new();
        let mut query_rows = stmt
            .query(params_from_iter(rusqlite_params.iter()))
            .map_err(to_query_error)?;

        while let Some(row) = query_rows.next().map_err(to_query_error)? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(rusqlite_to_value(row, i)?);
            }
            rows.push(Row::new(column_names.clone(), values));
        }

        let execution_time_ms = start_time.elapsed().as_millis() as u64;
        tracing::debug!(
            row_count = rows.len(),
            execution_time_ms = execution_time_ms,
            "query executed successfully"
        );
        Ok(QueryResult {
            columns,
            rows,
            execution_time_ms,
            ..QueryResult::empty()
        })
    }

    async fn close(&self) -> Result<()> {
        if let Some(conn) = self.conn.lock().take() {
            tracing::debug!("closing SQLite connection");
            conn.close().map_err(|(_, e)| {
                EasySqlError::Connection(format!("Failed to close SQLite connection: {}", e))
            })?;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.conn.lock().is_none()
    }
}

/// Whether a statement starts with INSERT or REPLACE
fn is_insert(sql: &str) -> bool {
    let keyword: String = sql
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    keyword.eq_ignore_ascii_case("insert") || keyword.eq_ignore_ascii_case("replace")
}

/// Map a rusqlite failure onto a query error, keeping SQLite's extended code
fn to_query_error(err: rusqlite::Error) -> EasySqlError {
    let query_error = match &err {
        rusqlite::Error::SqliteFailure(failure, message) => QueryError::new(
            message
                .clone()
                .unwrap_or_else(|| failure.to_string()),
        )
        .with_code(failure.extended_code as i64),
        other => QueryError::new(other.to_string()),
    };
    EasySqlError::Query(query_error)
}

/// Convert our Value types to rusqlite-compatible types
fn values_to_rusqlite(values: &[Value]) -> Vec<rusqlite::types::Value> {
    values.iter().map(value_to_rusqlite).collect()
}

fn value_to_rusqlite(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(b) => rusqlite::types::Value::Integer(if *b { 1 } else { 0 }),
        Value::Int64(i) => rusqlite::types::Value::Integer(*i),
        Value::UInt64(u) => match i64::try_from(*u) {
            Ok(i) => rusqlite::types::Value::Integer(i),
            Err(_) => rusqlite::types::Value::Text(u.to_string()),
        },
        Value::Float64(f) => rusqlite::types::Value::Real(*f),
        Value::Decimal(d) => rusqlite::types::Value::Text(d.clone()),
        Value::String(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Bytes(b) => rusqlite::types::Value::Blob(b.clone()),
        Value::Date(d) => rusqlite::types::Value::Text(d.to_string()),
        Value::Time(t) => rusqlite::types::Value::Text(t.to_string()),
        Value::DateTime(dt) => rusqlite::types::Value::Text(dt.to_string()),
        Value::Json(j) => rusqlite::types::Value::Text(j.to_string()),
    }
}

/// Convert rusqlite row value to our Value type
fn rusqlite_to_value(row: &rusqlite::Row, idx: usize) -> Result<Value> {
    use rusqlite::types::ValueRef;

    let value_ref = row.get_ref(idx).map_err(to_query_error)?;

    let value = match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    };

    Ok(value)
}
