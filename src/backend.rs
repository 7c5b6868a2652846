//! SQL dialect selection.
//!
//! Statements are built once with sea-query and rendered for whichever backend the
//! executor reports, so the same helper code serves PostgreSQL and SQLite.

use sea_query::{
    DeleteStatement, Iden, InsertStatement, PostgresQueryBuilder, SelectStatement,
    SqliteQueryBuilder, UpdateStatement, Values,
};

/// Database dialect an executor speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// PostgreSQL (`$1` placeholders)
    Postgres,
    /// SQLite (`?` placeholders)
    Sqlite,
}

/// Render a sea-query statement for a [`Backend`]
pub trait BuildStatement {
    /// Build SQL text and bound values for `backend`
    fn build_for(&self, backend: Backend) -> (String, Values);
}

macro_rules! impl_build_statement {
    ($($stmt:ty),* $(,)?) => {
        $(
            impl BuildStatement for $stmt {
                fn build_for(&self, backend: Backend) -> (String, Values) {
                    match backend {
                        Backend::Postgres => self.build(PostgresQueryBuilder),
                        Backend::Sqlite => self.build(SqliteQueryBuilder),
                    }
                }
            }
        )*
    };
}

impl_build_statement!(
    SelectStatement,
    InsertStatement,
    UpdateStatement,
    DeleteStatement,
);

/// Identifier known only at runtime (table and column names supplied by callers)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident(pub String);

impl Ident {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl Iden for Ident {
    fn unquoted(&self) -> &str {
        &self.0
    }
}
