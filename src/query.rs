//! Query helpers.
//!
//! Free functions that compose a statement against a table, run it on an executor and
//! wrap each result record in a [`Row`]:
//!
//! - [`find_all`] / [`find`]: filter, soft-delete filter, pagination, `before` hook
//! - [`count_all`]: filter and soft-delete filter, then a count aggregate
//! - [`insert`] / [`insert_all`]: single and multi-record inserts
//!
//! Callers shape a query through [`QueryScope`], which exposes filtering and ordering
//! only; the full sea-query statement is never handed out.
//!
//! # Example
//!
//! ```no_run
//! use rowkeeper::{count_all, find_all, CountOptions, FindOptions, Pagination, SharedExecutor, SqliteExecutor};
//! use sea_query::Order;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), rowkeeper::DbError> {
//! let conn: SharedExecutor = Arc::new(SqliteExecutor::open_in_memory()?);
//!
//! let page = find_all(
//!     &conn,
//!     &FindOptions::new("kansen")
//!         .filter(|q| {
//!             q.gte("score", 30);
//!         })
//!         .paginate(Pagination::new(2, 4))
//!         .before(|q| {
//!             q.order_by("score", Order::Desc);
//!         }),
//! )?;
//!
//! let total = count_all(&conn, &CountOptions::new("kansen").include_deleted(true))?;
//! # Ok(())
//! # }
//! ```

use crate::backend::{BuildStatement, Ident};
use crate::executor::{DbError, SharedExecutor};
use crate::row::{ColumnNames, Row, RowData};
use crate::value::ColumnValue;
use sea_query::{Asterisk, Expr, ExprTrait, Func, Order, Query, SelectStatement};
use std::collections::BTreeSet;

/// Page size used when a page is requested without a limit
pub const DEFAULT_PAGE_LIMIT: u64 = 20;

/// Result alias of the count aggregate
const COUNT_ALIAS: &str = "count";

/// Narrow handle on a statement under construction
///
/// Every method ANDs one condition into the `WHERE` clause (or appends an ordering)
/// and returns `&mut Self` so calls chain.
pub struct QueryScope<'s> {
    stmt: &'s mut SelectStatement,
}

impl<'s> QueryScope<'s> {
    fn new(stmt: &'s mut SelectStatement) -> Self {
        Self { stmt }
    }

    fn col(col: &str) -> Expr {
        Expr::col(Ident::new(col))
    }

    fn val(value: impl Into<ColumnValue>) -> Expr {
        Expr::val(value.into().into_sea_value())
    }

    pub fn eq(&mut self, col: &str, value: impl Into<ColumnValue>) -> &mut Self {
        self.filter(Self::col(col).eq(Self::val(value)))
    }

    pub fn ne(&mut self, col: &str, value: impl Into<ColumnValue>) -> &mut Self {
        self.filter(Self::col(col).ne(Self::val(value)))
    }

    pub fn gt(&mut self, col: &str, value: impl Into<ColumnValue>) -> &mut Self {
        self.filter(Self::col(col).gt(Self::val(value)))
    }

    pub fn gte(&mut self, col: &str, value: impl Into<ColumnValue>) -> &mut Self {
        self.filter(Self::col(col).gte(Self::val(value)))
    }

    pub fn lt(&mut self, col: &str, value: impl Into<ColumnValue>) -> &mut Self {
        self.filter(Self::col(col).lt(Self::val(value)))
    }

    pub fn lte(&mut self, col: &str, value: impl Into<ColumnValue>) -> &mut Self {
        self.filter(Self::col(col).lte(Self::val(value)))
    }

    /// `col BETWEEN low AND high`
    pub fn between(
        &mut self,
        col: &str,
        low: impl Into<ColumnValue>,
        high: impl Into<ColumnValue>,
    ) -> &mut Self {
        self.filter(Self::col(col).between(Self::val(low), Self::val(high)))
    }

    pub fn is_in<I, V>(&mut self, col: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ColumnValue>,
    {
        let values: Vec<Expr> = values.into_iter().map(Self::val).collect();
        self.filter(Self::col(col).is_in(values))
    }

    pub fn is_null(&mut self, col: &str) -> &mut Self {
        self.filter(Self::col(col).is_null())
    }

    pub fn is_not_null(&mut self, col: &str) -> &mut Self {
        self.filter(Self::col(col).is_not_null())
    }

    pub fn like(&mut self, col: &str, pattern: &str) -> &mut Self {
        self.filter(Self::col(col).like(pattern.to_string()))
    }

    /// AND an arbitrary sea-query expression into the `WHERE` clause
    pub fn filter(&mut self, expr: Expr) -> &mut Self {
        self.stmt.and_where(expr);
        self
    }

    /// AND a raw SQL fragment into the `WHERE` clause
    ///
    /// The fragment is sent verbatim; it must not contain placeholders or untrusted input.
    pub fn raw(&mut self, sql: impl Into<String>) -> &mut Self {
        self.filter(Expr::cust(sql.into()))
    }

    pub fn order_by(&mut self, col: &str, order: Order) -> &mut Self {
        self.stmt.order_by(Ident::new(col), order);
        self
    }
}

type ScopeFn<'a> = Box<dyn Fn(&mut QueryScope<'_>) + 'a>;

/// A 1-indexed page of results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Pagination {
    pub fn new(page: u64, limit: u64) -> Self {
        Self { page, limit }
    }

    /// Page `page` with [`DEFAULT_PAGE_LIMIT`] rows per page
    pub fn page(page: u64) -> Self {
        Self::new(page, DEFAULT_PAGE_LIMIT)
    }

    /// Rows to skip; page 0 is treated as page 1
    pub fn offset(&self) -> u64 {
        self.page.max(1).saturating_sub(1).saturating_mul(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::page(1)
    }
}

/// Options for [`find_all`] and [`find`]
pub struct FindOptions<'a> {
    table: String,
    columns: ColumnNames,
    filter: Option<ScopeFn<'a>>,
    include_deleted: bool,
    pagination: Option<Pagination>,
    before: Option<ScopeFn<'a>>,
}

impl<'a> FindOptions<'a> {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: ColumnNames::default(),
            filter: None,
            include_deleted: false,
            pagination: None,
            before: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Column aliases handed to every produced row (and used for the soft-delete filter)
    pub fn columns(mut self, columns: ColumnNames) -> Self {
        self.columns = columns;
        self
    }

    /// Caller conditions, applied first
    pub fn filter<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut QueryScope<'_>) + 'a,
    {
        self.filter = Some(Box::new(f));
        self
    }

    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = include;
        self
    }

    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// Last-chance hook, applied after pagination
    pub fn before<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut QueryScope<'_>) + 'a,
    {
        self.before = Some(Box::new(f));
        self
    }

    fn statement(&self, paginate: bool) -> Result<SelectStatement, DbError> {
        let mut stmt = Query::select();
        stmt.column(Asterisk).from(Ident::new(self.table.as_str()));

        if let Some(filter) = &self.filter {
            filter(&mut QueryScope::new(&mut stmt));
        }
        if !self.include_deleted {
            stmt.and_where(Expr::col(Ident::new(self.columns.time_deleted.as_str())).is_null());
        }
        if let Some(pagination) = self.pagination.filter(|_| paginate) {
            if pagination.limit == 0 {
                return Err(DbError::QueryError(
                    "pagination limit must be greater than zero".to_string(),
                ));
            }
            stmt.limit(pagination.limit).offset(pagination.offset());
        }
        if let Some(before) = &self.before {
            before(&mut QueryScope::new(&mut stmt));
        }
        Ok(stmt)
    }
}

/// What [`count_all`] counts
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CountBy {
    /// Non-null values of the id column
    #[default]
    Id,
    /// Non-null values of one column
    Column(String),
    /// Rows in which every listed column is non-null
    Columns(Vec<String>),
    /// Every matching row
    All,
}

/// Options for [`count_all`]
pub struct CountOptions<'a> {
    table: String,
    columns: ColumnNames,
    filter: Option<ScopeFn<'a>>,
    include_deleted: bool,
    count_by: CountBy,
}

impl<'a> CountOptions<'a> {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: ColumnNames::default(),
            filter: None,
            include_deleted: false,
            count_by: CountBy::default(),
        }
    }

    pub fn columns(mut self, columns: ColumnNames) -> Self {
        self.columns = columns;
        self
    }

    pub fn filter<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut QueryScope<'_>) + 'a,
    {
        self.filter = Some(Box::new(f));
        self
    }

    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = include;
        self
    }

    pub fn count_by(mut self, count_by: CountBy) -> Self {
        self.count_by = count_by;
        self
    }

    fn statement(&self) -> SelectStatement {
        let mut stmt = Query::select();
        stmt.from(Ident::new(self.table.as_str()));

        if let Some(filter) = &self.filter {
            filter(&mut QueryScope::new(&mut stmt));
        }
        if !self.include_deleted {
            stmt.and_where(Expr::col(Ident::new(self.columns.time_deleted.as_str())).is_null());
        }

        let counted = match &self.count_by {
            CountBy::Id => Func::count(Expr::col(Ident::new(self.columns.id.as_str()))),
            CountBy::Column(col) => Func::count(Expr::col(Ident::new(col.as_str()))),
            CountBy::Columns(cols) => {
                for col in cols {
                    stmt.and_where(Expr::col(Ident::new(col.as_str())).is_not_null());
                }
                Func::count(Expr::col(Asterisk))
            }
            CountBy::All => Func::count(Expr::col(Asterisk)),
        };
        stmt.expr_as(counted, Ident::new(COUNT_ALIAS));
        stmt
    }
}

/// Options for [`insert`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOptions {
    /// Column to hand back from the inserted record; `None` skips `RETURNING`
    pub returning: Option<String>,
}

impl Default for InsertOptions {
    fn default() -> Self {
        Self {
            returning: Some(ColumnNames::default().id),
        }
    }
}

impl InsertOptions {
    pub fn returning(col: impl Into<String>) -> Self {
        Self {
            returning: Some(col.into()),
        }
    }

    pub fn no_returning() -> Self {
        Self { returning: None }
    }
}

fn wrap_rows(conn: &SharedExecutor, table: &str, columns: &ColumnNames, rows: Vec<RowData>) -> Vec<Row> {
    rows.into_iter()
        .map(|data| Row::with_columns(conn.clone(), table, data, columns.clone()))
        .collect()
}

/// Fetch every matching record
///
/// Order is whatever the statement (or the database) yields; no ordering is added.
///
/// # Errors
///
/// A zero pagination limit, or whatever the executor raises. No match is `Ok(vec![])`.
pub fn find_all(conn: &SharedExecutor, opts: &FindOptions<'_>) -> Result<Vec<Row>, DbError> {
    let stmt = opts.statement(true)?;
    let (sql, values) = stmt.build_for(conn.backend());
    log::debug!("find_all on {}: {}", opts.table, sql);
    let rows = conn.query_all(&sql, &values)?;
    Ok(wrap_rows(conn, &opts.table, &opts.columns, rows))
}

/// Fetch the first matching record, if any
///
/// Pagination on `opts` is ignored; the statement is limited to one row.
pub fn find(conn: &SharedExecutor, opts: &FindOptions<'_>) -> Result<Option<Row>, DbError> {
    let mut stmt = opts.statement(false)?;
    stmt.limit(1);
    let (sql, values) = stmt.build_for(conn.backend());
    log::debug!("find on {}: {}", opts.table, sql);
    let rows = conn.query_all(&sql, &values)?;
    Ok(wrap_rows(conn, &opts.table, &opts.columns, rows).into_iter().next())
}

/// Count matching records
pub fn count_all(conn: &SharedExecutor, opts: &CountOptions<'_>) -> Result<u64, DbError> {
    let (sql, values) = opts.statement().build_for(conn.backend());
    log::debug!("count_all on {}: {}", opts.table, sql);
    let row = conn.query_one(&sql, &values)?;
    let count = match row.get(COUNT_ALIAS) {
        Some(ColumnValue::Int(n)) => *n,
        Some(ColumnValue::Null) | None => 0,
        Some(other) => {
            return Err(DbError::ParseError(format!(
                "count returned {} instead of an integer",
                other.type_name()
            )))
        }
    };
    u64::try_from(count).map_err(|_| DbError::ParseError(format!("Count cannot be negative: {count}")))
}

/// Insert one record
///
/// Returns the value of `opts.returning` from the inserted record when the database
/// hands one back. Tables without that column behave however the driver makes them
/// behave; callers needing certainty should re-query.
///
/// # Errors
///
/// `DbError::QueryError` for an empty record, otherwise whatever the executor raises.
pub fn insert(
    conn: &SharedExecutor,
    table: &str,
    data: RowData,
    opts: &InsertOptions,
) -> Result<Option<ColumnValue>, DbError> {
    if data.is_empty() {
        return Err(DbError::QueryError("No fields to insert".to_string()));
    }

    let mut stmt = Query::insert();
    stmt.into_table(Ident::new(table));
    let (columns, values): (Vec<_>, Vec<_>) = data
        .into_iter()
        .map(|(col, value)| (Ident::new(col), Expr::val(value.into_sea_value())))
        .unzip();
    stmt.columns(columns);
    stmt.values(values)?;

    match &opts.returning {
        Some(col) => {
            stmt.returning_col(Ident::new(col.as_str()));
            let (sql, values) = stmt.build_for(conn.backend());
            log::debug!("insert into {table}: {sql}");
            let rows = conn.query_all(&sql, &values)?;
            Ok(rows.into_iter().next().and_then(|mut r| r.remove(col)))
        }
        None => {
            let (sql, values) = stmt.build_for(conn.backend());
            log::debug!("insert into {table}: {sql}");
            conn.execute(&sql, &values)?;
            Ok(None)
        }
    }
}

/// Insert many records in one statement
///
/// The column list is the union of every record's keys; a record missing a column
/// binds NULL for it. Nothing is returned beyond the affected count.
pub fn insert_all(conn: &SharedExecutor, table: &str, rows: &[RowData]) -> Result<u64, DbError> {
    if rows.is_empty() {
        return Ok(0);
    }

    let columns: BTreeSet<&String> = rows.iter().flat_map(|r| r.keys()).collect();
    if columns.is_empty() {
        return Err(DbError::QueryError("No fields to insert".to_string()));
    }

    let mut stmt = Query::insert();
    stmt.into_table(Ident::new(table))
        .columns(columns.iter().map(|c| Ident::new(c.as_str())));
    for row in rows {
        let values = columns.iter().map(|col| {
            let value = row.get(*col).cloned().unwrap_or(ColumnValue::Null);
            Expr::val(value.into_sea_value())
        });
        stmt.values(values)?;
    }

    let (sql, values) = stmt.build_for(conn.backend());
    log::debug!("insert_all into {table}: {} record(s)", rows.len());
    conn.execute(&sql, &values)
}
