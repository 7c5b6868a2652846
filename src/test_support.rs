//! In-process executor for unit tests: records rendered statements and serves queued rows.

use crate::backend::Backend;
use crate::executor::{DbError, Executor};
use crate::row::RowData;
use sea_query::Values;
use std::cell::RefCell;
use std::collections::VecDeque;

pub struct MockExecutor {
    backend: Backend,
    statements: RefCell<Vec<(String, Values)>>,
    rows: RefCell<VecDeque<Vec<RowData>>>,
    failure: RefCell<Option<DbError>>,
}

impl MockExecutor {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            statements: RefCell::new(Vec::new()),
            rows: RefCell::new(VecDeque::new()),
            failure: RefCell::new(None),
        }
    }

    /// Every statement received so far, in order
    pub fn statements(&self) -> Vec<(String, Values)> {
        self.statements.borrow().clone()
    }

    /// Queue the result set for the next `query_all`
    pub fn push_rows(&self, rows: Vec<RowData>) {
        self.rows.borrow_mut().push_back(rows);
    }

    /// Make the next statement fail with `err`
    pub fn fail_next(&self, err: DbError) {
        *self.failure.borrow_mut() = Some(err);
    }

    fn record(&self, sql: &str, values: &Values) -> Result<(), DbError> {
        self.statements
            .borrow_mut()
            .push((sql.to_string(), values.clone()));
        match self.failure.borrow_mut().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Executor for MockExecutor {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn execute(&self, sql: &str, values: &Values) -> Result<u64, DbError> {
        self.record(sql, values)?;
        Ok(1)
    }

    fn query_all(&self, sql: &str, values: &Values) -> Result<Vec<RowData>, DbError> {
        self.record(sql, values)?;
        Ok(self.rows.borrow_mut().pop_front().unwrap_or_default())
    }
}
