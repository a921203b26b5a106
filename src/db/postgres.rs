//! PostgreSQL query executor.
//!
//! Opens one connection per statement and closes it before returning, on both
//! the success and the failure path. There is no pool.

use crate::config::ConnectionConfig;
use crate::db::{ColumnInfo, QueryExecutor, QueryResult, Row, Value};
use crate::error::{AskError, Result};
use async_trait::async_trait;
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgConnection, PgRow, Postgres};
use sqlx::{Column as SqlxColumn, Connection, Executor, Row as SqlxRow, TypeInfo, ValueRef};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Maximum number of connection attempts per statement.
const MAX_CONNECT_ATTEMPTS: u32 = 3;

/// Base delay between connection attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Executes SQL against PostgreSQL with a short-lived connection per call.
#[derive(Debug, Clone)]
pub struct PostgresExecutor {
    config: ConnectionConfig,
    conn_str: String,
    query_timeout: Option<Duration>,
}

impl PostgresExecutor {
    /// Creates an executor for the given connection settings.
    ///
    /// No connection is opened until [`QueryExecutor::execute`] is called.
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;
        Ok(Self {
            config: config.clone(),
            conn_str,
            query_timeout: config.query_timeout_secs.map(Duration::from_secs),
        })
    }

    /// Opens a connection, retrying transient failures with backoff.
    async fn connect(&self) -> Result<PgConnection> {
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut attempt = 1;

        loop {
            debug!("Connection attempt {} of {}", attempt, MAX_CONNECT_ATTEMPTS);

            match PgConnection::connect(&self.conn_str).await {
                Ok(conn) => return Ok(conn),
                Err(e) if attempt < MAX_CONNECT_ATTEMPTS && is_transient_error(&e) => {
                    warn!(
                        "Connection attempt {} failed (transient error), retrying in {:?}",
                        attempt, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(map_connection_error(e, &self.config)),
            }
        }
    }

    /// Runs the statement on an open connection.
    async fn run(conn: &mut PgConnection, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();

        let result = sqlx::query(sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| AskError::execution(format_query_error(e)))?;

        let execution_time = start.elapsed();

        let columns: Vec<ColumnInfo> = match result.first() {
            Some(first_row) => first_row
                .columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect(),
            // No rows to read metadata from, so ask the server to describe the statement
            None => match conn.describe(sql).await {
                Ok(described) => described
                    .columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect(),
                Err(e) => {
                    debug!("Could not describe empty result: {}", e);
                    Vec::new()
                }
            },
        };

        let rows: Vec<Row> = result.iter().map(convert_row).collect();

        Ok(QueryResult::with_data(columns, rows).with_execution_time(execution_time))
    }
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    async fn execute(&self, sql: &str) -> Result<QueryResult> {
        let mut conn = self.connect().await?;

        let outcome = match self.query_timeout {
            Some(limit) => tokio::time::timeout(limit, Self::run(&mut conn, sql))
                .await
                .unwrap_or_else(|_| {
                    Err(AskError::execution(format!(
                        "Query timed out after {} seconds",
                        limit.as_secs()
                    )))
                }),
            None => Self::run(&mut conn, sql).await,
        };

        if let Err(e) = conn.close().await {
            debug!("Error closing connection: {}", e);
        }

        let result = outcome?;
        info!(
            "Query returned {} rows in {:?} ({})",
            result.row_count,
            result.execution_time,
            self.config.display_string()
        );
        Ok(result)
    }
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
///
/// NULL is detected from the raw value before decoding, so a type the driver
/// cannot decode never shows up as NULL. It renders as `<TYPE>` instead.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    let raw_is_null = row.try_get_raw(index).map(|raw| raw.is_null()).unwrap_or(true);
    if raw_is_null {
        return Value::Null;
    }

    match type_name {
        "BOOL" => decode(row, index, type_name, Value::Bool),
        "INT2" => decode(row, index, type_name, |v: i16| Value::Int(v.into())),
        "INT4" => decode(row, index, type_name, |v: i32| Value::Int(v.into())),
        "INT8" => decode(row, index, type_name, Value::Int),
        "FLOAT4" => decode(row, index, type_name, |v: f32| Value::Float(v.into())),
        "FLOAT8" => decode(row, index, type_name, Value::Float),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" | "UNKNOWN" => {
            decode(row, index, type_name, Value::String)
        }
        "BYTEA" => decode(row, index, type_name, Value::Bytes),

        // Aggregates such as SUM and AVG return NUMERIC; keep full precision as text
        "NUMERIC" => row
            .try_get_raw(index)
            .ok()
            .and_then(|raw| raw.as_bytes().ok().and_then(decode_numeric))
            .map(Value::String)
            .unwrap_or_else(|| unsupported(type_name)),

        "UUID" => decode(row, index, type_name, |v: sqlx::types::Uuid| {
            Value::String(v.to_string())
        }),
        "JSON" | "JSONB" => decode(row, index, type_name, |v: sqlx::types::JsonValue| {
            Value::String(v.to_string())
        }),
        "DATE" => decode(row, index, type_name, |v: chrono::NaiveDate| {
            Value::String(v.to_string())
        }),
        "TIME" => decode(row, index, type_name, |v: chrono::NaiveTime| {
            Value::String(v.to_string())
        }),
        "TIMESTAMP" => decode(row, index, type_name, |v: chrono::NaiveDateTime| {
            Value::String(v.to_string())
        }),
        "TIMESTAMPTZ" => decode(row, index, type_name, |v: chrono::DateTime<chrono::Utc>| {
            Value::String(v.to_rfc3339())
        }),
        "INTERVAL" => decode(row, index, type_name, |v: PgInterval| {
            Value::String(format_interval(&v))
        }),

        _ => unsupported(type_name),
    }
}

/// Decodes a non-NULL cell as `T`, falling back to a type placeholder.
fn decode<'r, T>(
    row: &'r PgRow,
    index: usize,
    type_name: &str,
    wrap: impl FnOnce(T) -> Value,
) -> Value
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    match row.try_get::<T, _>(index) {
        Ok(value) => wrap(value),
        Err(e) => {
            debug!("Could not decode {} column {}: {}", type_name, index, e);
            unsupported(type_name)
        }
    }
}

/// Placeholder for a non-NULL value with no text rendering.
fn unsupported(type_name: &str) -> Value {
    Value::String(format!("<{type_name}>"))
}

/// Renders an interval the way psql does, e.g. `1 year 2 mons 3 days 04:05:06`.
fn format_interval(interval: &PgInterval) -> String {
    fn unit(n: i32, singular: &str, plural: &str) -> String {
        format!("{n} {}", if n.abs() == 1 { singular } else { plural })
    }

    let mut parts = Vec::new();
    let (years, months) = (interval.months / 12, interval.months % 12);
    if years != 0 {
        parts.push(unit(years, "year", "years"));
    }
    if months != 0 {
        parts.push(unit(months, "mon", "mons"));
    }
    if interval.days != 0 {
        parts.push(unit(interval.days, "day", "days"));
    }

    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let micros = interval.microseconds.unsigned_abs();
        let secs = micros / 1_000_000;
        let mut clock = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        let fraction = micros % 1_000_000;
        if fraction != 0 {
            clock.push_str(format!(".{fraction:06}").trim_end_matches('0'));
        }
        parts.push(clock);
    }

    parts.join(" ")
}

/// Decodes a NUMERIC value in PostgreSQL's binary wire format to its decimal text.
///
/// Layout: ndigits, weight, sign, dscale (all 16-bit), then base-10000 digits.
fn decode_numeric(bytes: &[u8]) -> Option<String> {
    if bytes.len() < 8 {
        return None;
    }
    let read = |i: usize| i16::from_be_bytes([bytes[i], bytes[i + 1]]);
    let ndigits = usize::try_from(read(0)).ok()?;
    let weight = i32::from(read(2));
    let sign = u16::from_be_bytes([bytes[4], bytes[5]]);
    let dscale = usize::from(u16::from_be_bytes([bytes[6], bytes[7]]));

    match sign {
        0xC000 => return Some("NaN".to_string()),
        0xD000 => return Some("Infinity".to_string()),
        0xF000 => return Some("-Infinity".to_string()),
        _ => {}
    }
    if bytes.len() < 8 + ndigits * 2 {
        return None;
    }

    let digit = |k: i32| -> i16 {
        match usize::try_from(k) {
            Ok(k) if k < ndigits => read(8 + k * 2),
            _ => 0,
        }
    };

    let mut out = String::new();
    if sign == 0x4000 {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&digit(0).to_string());
        for k in 1..=weight {
            out.push_str(&format!("{:04}", digit(k)));
        }
    }

    if dscale > 0 {
        let mut fraction = String::new();
        let mut k = weight + 1;
        while fraction.len() < dscale {
            fraction.push_str(&format!("{:04}", digit(k)));
            k += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }

    Some(out)
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    // Connection refused or timeout are often transient
    if error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
    {
        return true;
    }

    // Authentication, missing databases and TLS problems are not retried
    false
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> AskError {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.port;
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        AskError::execution(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        AskError::execution(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        AskError::execution(format!("Database '{database}' does not exist."))
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        AskError::execution(
            "Server requires SSL. Add '?sslmode=require' to connection string.".to_string(),
        )
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        AskError::execution(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        AskError::execution(error.to_string())
    }
}

/// Formats a query error with hints if available.
fn format_query_error(error: sqlx::Error) -> String {
    let error_str = error.to_string();

    let mut result = String::new();

    // Extract the main error message
    if let Some(db_error) = error.as_database_error() {
        result.push_str("ERROR: ");
        result.push_str(db_error.message());

        // Try to downcast to PgDatabaseError for Postgres-specific fields
        if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
            // Add detail if available
            if let Some(detail) = pg_error.detail() {
                result.push_str("\n  DETAIL: ");
                result.push_str(detail);
            }

            // Add hint if available
            if let Some(hint) = pg_error.hint() {
                result.push_str("\n  HINT: ");
                result.push_str(hint);
            }

            // Add position/context if available
            if let Some(table) = pg_error.table() {
                result.push_str("\n  TABLE: ");
                result.push_str(table);
            }

            if let Some(column) = pg_error.column() {
                result.push_str("\n  COLUMN: ");
                result.push_str(column);
            }

            if let Some(constraint) = pg_error.constraint() {
                result.push_str("\n  CONSTRAINT: ");
                result.push_str(constraint);
            }
        }
    } else {
        // Fallback for non-database errors
        result = error_str;
    }

    result
}
