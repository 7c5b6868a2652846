//! SQLite executor over `rusqlite`.
//!
//! SQLite stores only integers, reals, text and blobs, so the declared column type
//! decides how a stored value is read back: `BOOL`/`BOOLEAN` integers become booleans,
//! `TIMESTAMP`/`DATETIME`/`DATE` text becomes a timestamp, `JSON` text becomes JSON.
//! A bare `TIME` column stays text.
//! Timestamps are written in the `CURRENT_TIMESTAMP` layout so they compare as text.

use crate::backend::Backend;
use crate::executor::{DbError, Executor};
use crate::metrics::observe;
use crate::row::RowData;
use crate::value::ColumnValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use sea_query::{Value, Values};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

/// Whole decimals as integers, the rest as reals
fn decimal_to_sqlite(d: &Decimal) -> SqlValue {
    match d.fract().is_zero().then(|| d.to_i64()).flatten() {
        Some(i) => SqlValue::Integer(i),
        None => d
            .to_f64()
            .map_or_else(|| SqlValue::Text(d.to_string()), SqlValue::Real),
    }
}

/// Convert a sea-query value into a SQLite value
fn to_sqlite(value: &Value) -> Result<SqlValue, DbError> {
    let converted = match value {
        Value::Bool(Some(b)) => SqlValue::Integer(i64::from(*b)),
        Value::TinyInt(Some(i)) => SqlValue::Integer(i64::from(*i)),
        Value::SmallInt(Some(i)) => SqlValue::Integer(i64::from(*i)),
        Value::Int(Some(i)) => SqlValue::Integer(i64::from(*i)),
        Value::BigInt(Some(i)) => SqlValue::Integer(*i),
        Value::TinyUnsigned(Some(u)) => SqlValue::Integer(i64::from(*u)),
        Value::SmallUnsigned(Some(u)) => SqlValue::Integer(i64::from(*u)),
        Value::Unsigned(Some(u)) => SqlValue::Integer(i64::from(*u)),
        Value::BigUnsigned(Some(u)) => SqlValue::Integer(
            i64::try_from(*u)
                .map_err(|_| DbError::Other(format!("BigUnsigned value {u} exceeds i64::MAX")))?,
        ),
        Value::Float(Some(f)) => SqlValue::Real(f64::from(*f)),
        Value::Double(Some(d)) => SqlValue::Real(*d),
        Value::String(Some(s)) => SqlValue::Text(s.to_string()),
        Value::Char(Some(c)) => SqlValue::Text(c.to_string()),
        Value::Bytes(Some(b)) => SqlValue::Blob(b.to_vec()),
        Value::Json(Some(j)) => SqlValue::Text(j.to_string()),
        Value::ChronoDateTimeUtc(Some(t)) => SqlValue::Text(format_timestamp(&t.with_timezone(&Utc))),
        Value::ChronoDateTimeWithTimeZone(Some(t)) => {
            SqlValue::Text(format_timestamp(&t.with_timezone(&Utc)))
        }
        Value::ChronoDateTimeLocal(Some(t)) => SqlValue::Text(format_timestamp(&t.with_timezone(&Utc))),
        Value::ChronoDateTime(Some(t)) => SqlValue::Text(t.format(TIMESTAMP_FORMAT).to_string()),
        Value::ChronoDate(Some(d)) => SqlValue::Text(d.format("%Y-%m-%d").to_string()),
        Value::ChronoTime(Some(t)) => SqlValue::Text(t.to_string()),
        Value::Decimal(Some(d)) => decimal_to_sqlite(d),
        Value::Uuid(Some(u)) => SqlValue::Text(u.to_string()),
        Value::Bool(None)
        | Value::TinyInt(None)
        | Value::SmallInt(None)
        | Value::Int(None)
        | Value::BigInt(None)
        | Value::TinyUnsigned(None)
        | Value::SmallUnsigned(None)
        | Value::Unsigned(None)
        | Value::BigUnsigned(None)
        | Value::Float(None)
        | Value::Double(None)
        | Value::String(None)
        | Value::Char(None)
        | Value::Bytes(None)
        | Value::Json(None)
        | Value::ChronoDateTimeUtc(None)
        | Value::ChronoDateTimeWithTimeZone(None)
        | Value::ChronoDateTimeLocal(None)
        | Value::ChronoDateTime(None)
        | Value::ChronoDate(None)
        | Value::ChronoTime(None)
        | Value::Decimal(None)
        | Value::Uuid(None) => SqlValue::Null,
        other => {
            return Err(DbError::Other(format!(
                "Unsupported value type in query: {other:?}"
            )))
        }
    };
    Ok(converted)
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT) {
        return Some(t.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
}

fn holds_timestamp(decl: &str) -> bool {
    decl == "DATE" || (decl.contains("TIME") && decl != "TIME")
}

/// Decode a stored value using the column's declared type (uppercased)
fn decode(value: ValueRef<'_>, decl_type: Option<&str>, column: &str) -> Result<ColumnValue, DbError> {
    let decl = decl_type.unwrap_or("");
    let decoded = match value {
        ValueRef::Null => ColumnValue::Null,
        ValueRef::Integer(i) if decl.starts_with("BOOL") => ColumnValue::Bool(i != 0),
        ValueRef::Integer(i) => ColumnValue::Int(i),
        ValueRef::Real(f) => ColumnValue::Float(f),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| DbError::ParseError(format!("Column {column} is not UTF-8: {e}")))?;
            if holds_timestamp(decl) {
                parse_timestamp(text).map(ColumnValue::Timestamp).ok_or_else(|| {
                    DbError::ParseError(format!("Column {column} holds an invalid timestamp: {text}"))
                })?
            } else if decl.starts_with("JSON") {
                ColumnValue::Json(serde_json::from_str(text).map_err(|e| {
                    DbError::ParseError(format!("Column {column} holds invalid JSON: {e}"))
                })?)
            } else {
                ColumnValue::Text(text.to_string())
            }
        }
        ValueRef::Blob(b) => ColumnValue::Bytes(b.to_vec()),
    };
    Ok(decoded)
}

/// `Executor` over a single SQLite connection
///
/// ```rust
/// use rowkeeper::{Executor, SqliteExecutor};
/// use sea_query::Values;
///
/// let db = SqliteExecutor::open_in_memory()?;
/// db.execute_batch("CREATE TABLE kansen (id INTEGER PRIMARY KEY, name TEXT)")?;
/// db.execute("INSERT INTO kansen (name) VALUES ('Tokaido')", &Values(vec![]))?;
/// let rows = db.query_all("SELECT * FROM kansen", &Values(vec![]))?;
/// assert_eq!(rows.len(), 1);
/// # Ok::<(), rowkeeper::DbError>(())
/// ```
pub struct SqliteExecutor {
    conn: Mutex<Connection>,
}

impl SqliteExecutor {
    /// Open (or create) a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wrap an existing connection, enabling foreign keys
    pub fn from_connection(conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run several `;`-separated statements without parameters (schema setup)
    pub fn execute_batch(&self, sql: &str) -> Result<(), DbError> {
        let conn = self.lock()?;
        observe(sql, || conn.execute_batch(sql).map_err(DbError::from))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn
            .lock()
            .map_err(|_| DbError::Other("SQLite connection lock poisoned".to_string()))
    }
}

fn bind(values: &Values) -> Result<Vec<SqlValue>, DbError> {
    values.iter().map(to_sqlite).collect()
}

impl Executor for SqliteExecutor {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn execute(&self, sql: &str, values: &Values) -> Result<u64, DbError> {
        let params = bind(values)?;
        let conn = self.lock()?;
        observe(sql, || -> Result<u64, DbError> {
            let affected = conn.execute(sql, params_from_iter(params.iter()))?;
            Ok(affected as u64)
        })
    }

    fn query_all(&self, sql: &str, values: &Values) -> Result<Vec<RowData>, DbError> {
        let params = bind(values)?;
        let conn = self.lock()?;
        observe(sql, || -> Result<Vec<RowData>, DbError> {
            let mut stmt = conn.prepare(sql)?;
            let columns: Vec<(String, Option<String>)> = stmt
                .columns()
                .iter()
                .map(|c| (c.name().to_string(), c.decl_type().map(str::to_ascii_uppercase)))
                .collect();

            let mut rows = stmt.query(params_from_iter(params.iter()))?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut data = RowData::new();
                for (idx, (name, decl)) in columns.iter().enumerate() {
                    let value = decode(row.get_ref(idx)?, decl.as_deref(), name)?;
                    data.insert(name.clone(), value);
                }
                out.push(data);
            }
            Ok(out)
        })
    }
}
