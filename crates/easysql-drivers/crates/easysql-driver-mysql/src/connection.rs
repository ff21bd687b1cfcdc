//! MySQL connection implementation

use async_trait::async_trait;
use chrono::{Datelike, NaiveTime, Timelike};
use easysql_core::{
    ColumnMeta, Connection, EasySqlError, QueryError, QueryResult, Result, Row, Value,
};
use mysql_async::{
    Conn, Opts, Params, QueryResult as MySqlQueryResult, Row as MySqlRow, consts::ColumnType,
    prelude::*,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// A single MySQL session
///
/// Statements on one connection are serialized; concurrency comes from
/// holding several connections, which is what the pools above this layer do.
pub struct MySqlConnection {
    conn: Mutex<Option<Conn>>,
    closed: AtomicBool,
}

impl MySqlConnection {
    /// Open a session with the given options
    pub async fn connect(opts: Opts) -> Result<Self> {
        tracing::info!(
            host = %opts.ip_or_hostname(),
            port = opts.tcp_port(),
            database = ?opts.db_name(),
            "connecting to MySQL database"
        );

        let conn = Conn::new(opts)
            .await
            .map_err(|e| EasySqlError::Connection(format!("Failed to connect to MySQL: {}", e)))?;

        tracing::debug!(connection_id = conn.id(), "MySQL connection established");
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl Connection for MySqlConnection {
    fn driver_name(&self) -> &str {
        "mysql"
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let start_time = std::time::Instant::now();

        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| EasySqlError::Connection("MySQL connection is closed".into()))?;

        let mut result = match run_statement(conn, sql, params).await {
            Ok(result) => result,
            Err(err) => {
                if loses_session(&err) {
                    tracing::warn!(error = %err, "MySQL session lost, closing connection");
                    guard.take();
                    self.closed.store(true, Ordering::SeqCst);
                }
                return Err(err);
            }
        };

        result.execution_time_ms = start_time.elapsed().as_millis() as u64;
        tracing::debug!(
            row_count = result.rows.len(),
            affected_rows = result.affected_rows,
            execution_time_ms = result.execution_time_ms,
            "query executed successfully"
        );
        Ok(result)
    }

    async fn close(&self) -> Result<()> {
        let conn = self.conn.lock().await.take();
        self.closed.store(true, Ordering::SeqCst);
        if let Some(conn) = conn {
            tracing::debug!(connection_id = conn.id(), "closing MySQL connection");
            conn.disconnect().await.map_err(|e| {
                EasySqlError::Connection(format!("Failed to close MySQL connection: {}", e))
            })?;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

async fn run_statement(conn: &mut Conn, sql: &str, params: &[Value]) -> Result<QueryResult> {
    // The text protocol handles statements that cannot be prepared
    // (e.g. some DDL); parameters force the binary protocol.
    if params.is_empty() {
        read_result(conn.query_iter(sql).await.map_err(to_easysql_error)?).await
    } else {
        let params = Params::Positional(params.iter().map(value_to_mysql).collect());
        read_result(conn.exec_iter(sql, params).await.map_err(to_easysql_error)?).await
    }
}

/// Drain the first result set, keeping its column metadata and OK packet data
async fn read_result<P: Protocol>(mut result: MySqlQueryResult<'_, '_, P>) -> Result<QueryResult> {
    let mysql_columns = result.columns().unwrap_or_else(|| Arc::from(Vec::new()));

    let mut column_names = Vec::with_capacity(mysql_columns.len());
    let mut column_types = Vec::with_capacity(mysql_columns.len());
    let mut columns = Vec::with_capacity(mysql_columns.len());
    for (idx, col) in mysql_columns.iter().enumerate() {
        let name = col.name_str().to_string();
        column_names.push(name.clone());
        column_types.push(col.column_type());
        columns.push(ColumnMeta {
            name,
            data_type: format!("{:?}", col.column_type()),
            ordinal: idx,
        });
    }
    let column_names: Arc<[String]> = Arc::from(column_names);

    let mysql_rows: Vec<MySqlRow> = result.collect().await.map_err(to_easysql_error)?;
    let affected_rows = result.affected_rows();
    let last_insert_id = result.last_insert_id().filter(|id| *id > 0);

    let mut rows = Vec::with_capacity(mysql_rows.len());
    for mysql_row in mysql_rows {
        let mut values = Vec::with_capacity(column_types.len());
        for (idx, col_type) in column_types.iter().enumerate() {
            let mysql_val: mysql_async::Value =
                mysql_row.get(idx).unwrap_or(mysql_async::Value::NULL);
            values.push(mysql_value_to_value(mysql_val, *col_type));
        }
        rows.push(Row::new(column_names.clone(), values));
    }

    // Discard any further result sets so the session is clean for reuse
    result.drop_result().await.map_err(to_easysql_error)?;

    Ok(QueryResult {
        columns,
        rows,
        affected_rows,
        last_insert_id,
        ..QueryResult::empty()
    })
}

/// Server errors keep their code and SQLSTATE; transport failures are
/// connection errors.
fn to_easysql_error(err: mysql_async::Error) -> EasySqlError {
    match err {
        mysql_async::Error::Server(server) => EasySqlError::Query(
            QueryError::new(server.message)
                .with_code(i64::from(server.code))
                .with_sql_state(server.state),
        ),
        mysql_async::Error::Driver(driver) => {
            EasySqlError::Query(QueryError::new(driver.to_string()))
        }
        other => EasySqlError::Connection(other.to_string()),
    }
}

/// Whether a failed statement left the session unusable
///
/// Statement errors keep the session; transport and protocol failures do not.
fn loses_session(err: &EasySqlError) -> bool {
    !err.is_query()
}

/// Convert a statement parameter to its MySQL wire value
fn value_to_mysql(value: &Value) -> mysql_async::Value {
    match value {
        Value::Null => mysql_async::Value::NULL,
        Value::Bool(v) => mysql_async::Value::Int(i64::from(*v)),
        Value::Int64(v) => mysql_async::Value::Int(*v),
        Value::UInt64(v) => mysql_async::Value::UInt(*v),
        Value::Float64(v) => mysql_async::Value::Double(*v),
        Value::Decimal(v) | Value::String(v) => mysql_async::Value::Bytes(v.clone().into_bytes()),
        Value::Bytes(v) => mysql_async::Value::Bytes(v.clone()),
        Value::Date(d) => mysql_async::Value::Date(
            d.year() as u16,
            d.month() as u8,
            d.day() as u8,
            0,
            0,
            0,
            0,
        ),
        Value::Time(t) => mysql_async::Value::Time(
            false,
            0,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            t.nanosecond() / 1_000,
        ),
        Value::DateTime(dt) => mysql_async::Value::Date(
            dt.year() as u16,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
            dt.nanosecond() / 1_000,
        ),
        Value::Json(v) => mysql_async::Value::Bytes(v.to_string().into_bytes()),
    }
}

/// Convert mysql_async Value to our Value type, using column type metadata
/// to correctly interpret byte strings from the text protocol.
fn mysql_value_to_value(val: mysql_async::Value, col_type: ColumnType) -> Value {
    match val {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => match col_type {
                ColumnType::MYSQL_TYPE_TINY
                | ColumnType::MYSQL_TYPE_SHORT
                | ColumnType::MYSQL_TYPE_LONG
                | ColumnType::MYSQL_TYPE_LONGLONG
                | ColumnType::MYSQL_TYPE_INT24
                | ColumnType::MYSQL_TYPE_YEAR => s
                    .parse::<i64>()
                    .map(Value::Int64)
                    .or_else(|_| s.parse::<u64>().map(Value::UInt64))
                    .unwrap_or(Value::String(s)),
                ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => {
                    s.parse::<f64>().map(Value::Float64).unwrap_or(Value::String(s))
                }
                ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
                    Value::Decimal(s)
                }
                ColumnType::MYSQL_TYPE_JSON => serde_json::from_str(&s)
                    .map(Value::Json)
                    .unwrap_or(Value::String(s)),
                _ => Value::String(s),
            },
            Err(e) => Value::Bytes(e.into_bytes()),
        },
        mysql_async::Value::Int(i) => Value::Int64(i),
        mysql_async::Value::UInt(u) => match i64::try_from(u) {
            Ok(i) => Value::Int64(i),
            Err(_) => Value::UInt64(u),
        },
        mysql_async::Value::Float(f) => Value::Float64(f64::from(f)),
        mysql_async::Value::Double(d) => Value::Float64(d),
        mysql_async::Value::Date(year, month, day, hour, min, sec, micro) => {
            let date = chrono::NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32);
            if col_type == ColumnType::MYSQL_TYPE_DATE {
                date.map(Value::Date)
                    .unwrap_or_else(|| Value::String(format!("{:04}-{:02}-{:02}", year, month, day)))
            } else {
                date.and_then(|d| d.and_hms_micro_opt(hour as u32, min as u32, sec as u32, micro))
                    .map(Value::DateTime)
                    .unwrap_or_else(|| {
                        Value::String(format!(
                            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                            year, month, day, hour, min, sec
                        ))
                    })
            }
        }
        mysql_async::Value::Time(negative, days, hours, mins, secs, micros) => {
            let time_of_day = (!negative && days == 0)
                .then(|| {
                    NaiveTime::from_hms_micro_opt(hours as u32, mins as u32, secs as u32, micros)
                })
                .flatten();
            match time_of_day {
                Some(t) => Value::Time(t),
                // MySQL TIME is an interval and may exceed one day
                None => {
                    let total_hours = days * 24 + hours as u32;
                    let sign = if negative { "-" } else { "" };
                    Value::String(format!(
                        "{}{:02}:{:02}:{:02}.{:06}",
                        sign, total_hours, mins, secs, micros
                    ))
                }
            }
        }
    }
}
