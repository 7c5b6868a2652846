//! Row entity.
//!
//! A [`Row`] is a snapshot of one fetched record bound to its table and to the
//! connection it should write through. Reads come from the snapshot; writes are scoped
//! to the record's primary key and merged back into the snapshot only after the
//! database accepted them.

use crate::backend::{BuildStatement, Ident};
use crate::executor::{DbError, SharedExecutor};
use crate::value::{ColumnValue, FromColumnValue};
use sea_query::{
    Asterisk, Condition, DeleteStatement, Expr, ExprTrait, Query, SelectStatement,
    UpdateStatement,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// Column name → value mapping for one record
pub type RowData = BTreeMap<String, ColumnValue>;

/// Build a [`RowData`] from `"column" => value` pairs
///
/// ```rust
/// use rowkeeper::{row_data, ColumnValue};
///
/// let data = row_data! { "name" => "Tokaido", "score" => 10 };
/// assert_eq!(data["score"], ColumnValue::Int(10));
/// ```
#[macro_export]
macro_rules! row_data {
    () => { $crate::RowData::new() };
    ($($col:expr => $value:expr),+ $(,)?) => {{
        let mut data = $crate::RowData::new();
        $(data.insert(::std::string::String::from($col), $crate::ColumnValue::from($value));)+
        data
    }};
}

/// Names of the conventional columns a row relies on
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub id: String,
    pub time_created: String,
    pub time_updated: String,
    pub time_deleted: String,
    /// Columns identifying a single record; `None` means `[id]`
    pub primary: Option<Vec<String>>,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            time_created: "time_created".to_string(),
            time_updated: "time_updated".to_string(),
            time_deleted: "time_deleted".to_string(),
            primary: None,
        }
    }
}

impl ColumnNames {
    pub fn with_id(mut self, col: impl Into<String>) -> Self {
        self.id = col.into();
        self
    }

    pub fn with_time_created(mut self, col: impl Into<String>) -> Self {
        self.time_created = col.into();
        self
    }

    pub fn with_time_updated(mut self, col: impl Into<String>) -> Self {
        self.time_updated = col.into();
        self
    }

    pub fn with_time_deleted(mut self, col: impl Into<String>) -> Self {
        self.time_deleted = col.into();
        self
    }

    pub fn with_primary<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary = Some(cols.into_iter().map(Into::into).collect());
        self
    }

    /// Resolved primary columns
    pub fn primary_columns(&self) -> Vec<String> {
        match &self.primary {
            Some(cols) if !cols.is_empty() => cols.clone(),
            _ => vec![self.id.clone()],
        }
    }
}

/// Column/value pairs that identify one record, in primary-column order
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKey(Vec<(String, ColumnValue)>);

impl PrimaryKey {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnValue)> {
        self.0.iter().map(|(col, value)| (col.as_str(), value))
    }

    pub fn get(&self, col: &str) -> Option<&ColumnValue> {
        self.iter().find(|(c, _)| *c == col).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `col1 = v1 AND col2 = v2 ...`
    pub fn condition(&self) -> Condition {
        self.0.iter().fold(Condition::all(), |cond, (col, value)| {
            cond.add(Expr::col(Ident::new(col.clone())).eq(Expr::val(value.clone().into_sea_value())))
        })
    }
}

/// Unexecuted statements scoped to one record's primary key
///
/// Returned by [`Row::query`]; every statement it hands out already carries the
/// `WHERE` clause for the record, and the connection it should run on.
#[derive(Clone)]
pub struct RowQuery {
    table: String,
    key: PrimaryKey,
    conn: SharedExecutor,
}

impl RowQuery {
    pub fn connection(&self) -> &SharedExecutor {
        &self.conn
    }

    pub fn key(&self) -> &PrimaryKey {
        &self.key
    }

    /// `SELECT * FROM table WHERE <key>`
    pub fn select(&self) -> SelectStatement {
        let mut stmt = Query::select();
        stmt.column(Asterisk)
            .from(Ident::new(self.table.clone()))
            .cond_where(self.key.condition());
        stmt
    }

    /// `UPDATE table ... WHERE <key>`, with no assignments yet
    pub fn update(&self) -> UpdateStatement {
        let mut stmt = Query::update();
        stmt.table(Ident::new(self.table.clone()))
            .cond_where(self.key.condition());
        stmt
    }

    /// `DELETE FROM table WHERE <key>`
    pub fn delete(&self) -> DeleteStatement {
        let mut stmt = Query::delete();
        stmt.from_table(Ident::new(self.table.clone()))
            .cond_where(self.key.condition());
        stmt
    }
}

/// One fetched record bound to a table and a connection
///
/// The snapshot in [`Row::data`] changes only when a write issued through this row
/// succeeds. Two rows fetched for the same record do not see each other's writes.
///
/// # Examples
///
/// ```no_run
/// use rowkeeper::{find, DbError, FindOptions, SharedExecutor, SqliteExecutor};
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), DbError> {
/// let conn: SharedExecutor = Arc::new(SqliteExecutor::open("kansen.db")?);
/// let opts = FindOptions::new("kansen").filter(|q| {
///     q.eq("name", "Tokaido");
/// });
/// if let Some(mut row) = find(&conn, &opts)? {
///     let score: i64 = row.get_column("score")?;
///     row.set_column("score", score + 5)?;
///     row.delete()?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Row {
    table_name: String,
    data: RowData,
    columns: ColumnNames,
    primary_cols: Vec<String>,
    initial_conn: SharedExecutor,
    conn: SharedExecutor,
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Row")
            .field("table_name", &self.table_name)
            .field("data", &self.data)
            .field("primary_cols", &self.primary_cols)
            .finish_non_exhaustive()
    }
}

impl Row {
    /// Wrap `data` with the default column names
    pub fn new(conn: SharedExecutor, table_name: impl Into<String>, data: RowData) -> Self {
        Self::with_columns(conn, table_name, data, ColumnNames::default())
    }

    pub fn with_columns(
        conn: SharedExecutor,
        table_name: impl Into<String>,
        data: RowData,
        columns: ColumnNames,
    ) -> Self {
        let primary_cols = columns.primary_columns();
        Self {
            table_name: table_name.into(),
            data,
            columns,
            primary_cols,
            initial_conn: conn.clone(),
            conn,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn data(&self) -> &RowData {
        &self.data
    }

    pub fn column_names(&self) -> &ColumnNames {
        &self.columns
    }

    pub fn primary_columns(&self) -> &[String] {
        &self.primary_cols
    }

    /// Whether `col` was part of the fetched record; a stored null still counts
    pub fn is_column(&self, col: &str) -> bool {
        self.data.contains_key(col)
    }

    /// Read a column as `V`
    ///
    /// # Errors
    ///
    /// `DbError::ColumnNotFound` if the record has no such column, and
    /// `DbError::TypeMismatch` if the stored value is not a `V`.
    pub fn get_column<V: FromColumnValue>(&self, col: &str) -> Result<V, DbError> {
        let value = self
            .data
            .get(col)
            .ok_or_else(|| self.column_not_found(col))?;
        V::from_column_value(value).map_err(|_| DbError::TypeMismatch {
            column: col.to_string(),
            table: self.table_name.clone(),
            expected: V::TYPE_NAME,
            actual: value.type_name(),
        })
    }

    pub fn id<V: FromColumnValue>(&self) -> Result<V, DbError> {
        self.get_column(&self.columns.id)
    }

    pub fn time_created<V: FromColumnValue>(&self) -> Result<V, DbError> {
        self.get_column(&self.columns.time_created)
    }

    pub fn time_updated<V: FromColumnValue>(&self) -> Result<V, DbError> {
        self.get_column(&self.columns.time_updated)
    }

    pub fn time_deleted<V: FromColumnValue>(&self) -> Result<V, DbError> {
        self.get_column(&self.columns.time_deleted)
    }

    /// True when the soft-delete column is present and not null
    pub fn is_deleted(&self) -> bool {
        self.data
            .get(&self.columns.time_deleted)
            .is_some_and(|v| !v.is_null())
    }

    /// Current values of the primary columns
    ///
    /// # Errors
    ///
    /// `DbError::ColumnNotFound` naming the first primary column missing from the record.
    pub fn primary_key(&self) -> Result<PrimaryKey, DbError> {
        self.primary_cols
            .iter()
            .map(|col| {
                self.data
                    .get(col)
                    .map(|value| (col.clone(), value.clone()))
                    .ok_or_else(|| self.column_not_found(col))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(PrimaryKey)
    }

    /// Statement factory scoped to this record on the current connection; nothing runs
    pub fn query(&self) -> Result<RowQuery, DbError> {
        Ok(RowQuery {
            table: self.table_name.clone(),
            key: self.primary_key()?,
            conn: self.conn.clone(),
        })
    }

    /// Update several columns of this record and merge them into the snapshot
    ///
    /// Every key is checked before anything is sent; the first unknown key fails the
    /// whole call and leaves the snapshot untouched.
    ///
    /// # Errors
    ///
    /// `DbError::ColumnNotFound` for an unknown key, otherwise whatever the executor raises.
    pub fn set_columns(&mut self, data: RowData) -> Result<u64, DbError> {
        if let Some(missing) = data.keys().find(|col| !self.is_column(col)) {
            return Err(self.column_not_found(missing));
        }
        if data.is_empty() {
            return Ok(0);
        }

        let mut stmt = self.query()?.update();
        for (col, value) in &data {
            stmt.value(Ident::new(col.clone()), Expr::val(value.clone().into_sea_value()));
        }
        let (sql, values) = stmt.build_for(self.conn.backend());
        log::debug!("updating {} column(s) of {}", data.len(), self.table_name);
        let affected = self.conn.execute(&sql, &values)?;

        self.data.extend(data);
        Ok(affected)
    }

    pub fn set_column(&mut self, col: &str, value: impl Into<ColumnValue>) -> Result<u64, DbError> {
        let mut data = RowData::new();
        data.insert(col.to_string(), value.into());
        self.set_columns(data)
    }

    /// Soft delete: stamp the delete column with the server's current time
    ///
    /// Deleting an already deleted row stamps it again.
    pub fn delete(&mut self) -> Result<u64, DbError> {
        let col = self.columns.time_deleted.clone();
        if !self.is_column(&col) {
            return Err(self.column_not_found(&col));
        }

        let mut stmt = self.query()?.update();
        stmt.value(Ident::new(col.clone()), self.conn.now_expr())
            .returning_col(Ident::new(col.clone()));
        let (sql, values) = stmt.build_for(self.conn.backend());
        log::debug!("soft deleting from {}", self.table_name);
        let rows = self.conn.query_all(&sql, &values)?;

        let affected = rows.len() as u64;
        match rows.into_iter().next().and_then(|mut r| r.remove(&col)) {
            Some(stamp) => {
                self.data.insert(col, stamp);
            }
            None => log::warn!(
                "soft delete on {} matched no record for {:?}",
                self.table_name,
                self.primary_key().ok()
            ),
        }
        Ok(affected)
    }

    /// Undo a soft delete
    pub fn restore(&mut self) -> Result<u64, DbError> {
        let col = self.columns.time_deleted.clone();
        self.set_column(&col, ColumnValue::Null)
    }

    /// Remove the record for good
    ///
    /// The snapshot is left as it was; the row no longer describes a stored record.
    pub fn delete_permanently(&self) -> Result<u64, DbError> {
        let stmt = self.query()?.delete();
        let (sql, values) = stmt.build_for(self.conn.backend());
        log::debug!("deleting from {}", self.table_name);
        self.conn.execute(&sql, &values)
    }

    pub fn connection(&self) -> &SharedExecutor {
        &self.conn
    }

    /// The connection the row was created with
    pub fn initial_connection(&self) -> &SharedExecutor {
        &self.initial_conn
    }

    /// Route subsequent writes through `conn` (e.g. a transaction)
    pub fn set_connection(&mut self, conn: SharedExecutor) {
        self.conn = conn;
    }

    /// Go back to the connection the row was created with
    pub fn reset_connection(&mut self) {
        self.conn = self.initial_conn.clone();
    }

    /// Snapshot as a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.data).unwrap_or(serde_json::Value::Null)
    }

    fn column_not_found(&self, col: &str) -> DbError {
        DbError::ColumnNotFound {
            column: col.to_string(),
            table: self.table_name.clone(),
        }
    }
}
