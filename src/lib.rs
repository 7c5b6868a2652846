//! # Rowkeeper
//!
//! Soft-delete aware row wrappers and query helpers over sea-query, for PostgreSQL
//! (`may_postgres`, coroutine-friendly blocking calls) and SQLite (`rusqlite`).
//!
//! A [`Row`] is one fetched record: a snapshot of its columns plus the connection it
//! came from. It reads columns with typed extraction, writes through to its table by
//! primary key, and soft-deletes by stamping a deletion column with server time.
//! The query helpers ([`find_all`], [`find`], [`count_all`], [`insert`], [`insert_all`])
//! skip soft-deleted records unless told otherwise.
//!
//! ```no_run
//! use rowkeeper::{find_all, FindOptions, SharedExecutor, SqliteExecutor};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), rowkeeper::DbError> {
//! let conn: SharedExecutor = Arc::new(SqliteExecutor::open("kansen.db")?);
//!
//! for mut row in find_all(&conn, &FindOptions::new("kansen"))? {
//!     if row.get_column::<i64>("score")? % 2 == 1 {
//!         row.delete()?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod connection;
pub mod executor;
pub mod metrics;
pub mod postgres;
pub mod query;
pub mod row;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod transaction;
pub mod value;

#[cfg(test)]
mod test_support;

pub use backend::{Backend, BuildStatement, Ident};
pub use config::Settings;
pub use connection::{connect, ConnectionError};
pub use executor::{DbError, Executor, SharedExecutor};
pub use postgres::PgExecutor;
pub use query::{
    count_all, find, find_all, insert, insert_all, CountBy, CountOptions, FindOptions, InsertOptions,
    Pagination, QueryScope, DEFAULT_PAGE_LIMIT,
};
pub use row::{ColumnNames, PrimaryKey, Row, RowData, RowQuery};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteExecutor;
pub use transaction::{IsolationLevel, Transaction, TransactionError};
pub use value::{ColumnValue, FromColumnValue, ValueExtractionError};
