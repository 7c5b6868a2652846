//! Shared fixtures: an in-memory SQLite `kansen` table seeded with six lines.

#![allow(dead_code)]

use fake::faker::name::en::Name;
use fake::Fake;
use rowkeeper::{insert_all, row_data, RowData, SharedExecutor, SqliteExecutor};
use std::sync::Arc;

pub const SCORES: [i64; 6] = [10, 20, 30, 40, 45, 55];

pub const KANSEN_SCHEMA: &str = r#"
    CREATE TABLE kansen (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        score INTEGER NOT NULL,
        time_created TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        time_updated TIMESTAMP,
        time_deleted TIMESTAMP
    );
"#;

/// Empty database with the `kansen` schema
pub fn empty_db() -> SharedExecutor {
    let db = SqliteExecutor::open_in_memory().expect("open in-memory database");
    db.execute_batch(KANSEN_SCHEMA).expect("create kansen table");
    Arc::new(db)
}

/// `kansen` with one record per entry of [`SCORES`], ids 1..=6 in score order
pub fn kansen_db() -> SharedExecutor {
    let conn = empty_db();
    let rows: Vec<RowData> = SCORES
        .iter()
        .map(|score| {
            let name: String = Name().fake();
            row_data! { "name" => name, "score" => *score }
        })
        .collect();
    let inserted = insert_all(&conn, "kansen", &rows).expect("seed kansen");
    assert_eq!(inserted, SCORES.len() as u64);
    conn
}
