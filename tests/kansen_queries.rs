//! Query helper behaviour against a seeded SQLite table.

mod common;

use rowkeeper::{
    count_all, find, find_all, CountBy, CountOptions, DbError, FindOptions, Pagination,
};
use sea_query::Order;
use std::collections::BTreeSet;

fn ids(rows: &[rowkeeper::Row]) -> BTreeSet<i64> {
    rows.iter().map(|r| r.id::<i64>().unwrap()).collect()
}

fn soft_delete_odd_scores(conn: &rowkeeper::SharedExecutor) -> Result<(), DbError> {
    for mut row in find_all(conn, &FindOptions::new("kansen"))? {
        if row.get_column::<i64>("score")? % 2 == 1 {
            row.delete()?;
        }
    }
    Ok(())
}

#[test]
fn test_kansen_counts_before_and_after_soft_delete() {
    let conn = common::kansen_db();

    let at_least_30 = count_all(
        &conn,
        &CountOptions::new("kansen").filter(|q| {
            q.gte("score", 30);
        }),
    )
    .unwrap();
    assert_eq!(at_least_30, 4);

    soft_delete_odd_scores(&conn).unwrap();

    let at_least_20 = count_all(
        &conn,
        &CountOptions::new("kansen").filter(|q| {
            q.gte("score", 20);
        }),
    )
    .unwrap();
    assert_eq!(at_least_20, 3);
}

#[test]
fn test_soft_deleted_records_hidden_unless_included() {
    let conn = common::kansen_db();
    soft_delete_odd_scores(&conn).unwrap();

    assert_eq!(find_all(&conn, &FindOptions::new("kansen")).unwrap().len(), 4);
    assert_eq!(
        find_all(&conn, &FindOptions::new("kansen").include_deleted(true))
            .unwrap()
            .len(),
        6
    );

    let by_score = |include| {
        FindOptions::new("kansen")
            .filter(|q| {
                q.eq("score", 45);
            })
            .include_deleted(include)
    };
    assert!(find(&conn, &by_score(false)).unwrap().is_none());
    let hidden = find(&conn, &by_score(true)).unwrap().expect("deleted record");
    assert!(hidden.is_deleted());

    assert_eq!(count_all(&conn, &CountOptions::new("kansen")).unwrap(), 4);
    assert_eq!(
        count_all(&conn, &CountOptions::new("kansen").include_deleted(true)).unwrap(),
        6
    );
}

#[test]
fn test_pagination_splits_into_disjoint_pages() {
    let conn = common::kansen_db();
    let page = |n| {
        FindOptions::new("kansen")
            .paginate(Pagination::new(n, 4))
            .before(|q| {
                q.order_by("id", Order::Asc);
            })
    };

    let first = find_all(&conn, &page(1)).unwrap();
    let second = find_all(&conn, &page(2)).unwrap();
    assert_eq!(first.len(), 4);
    assert_eq!(second.len(), 2);

    let (a, b) = (ids(&first), ids(&second));
    assert!(a.is_disjoint(&b));
    assert_eq!(a.union(&b).count(), 6);

    assert!(find_all(&conn, &page(3)).unwrap().is_empty());
}

#[test]
fn test_before_hook_orders_results() {
    let conn = common::kansen_db();
    let rows = find_all(
        &conn,
        &FindOptions::new("kansen").before(|q| {
            q.order_by("score", Order::Desc);
        }),
    )
    .unwrap();
    let scores: Vec<i64> = rows.iter().map(|r| r.get_column("score").unwrap()).collect();
    assert_eq!(scores, vec![55, 45, 40, 30, 20, 10]);
}

#[test]
fn test_find_without_match_is_none() {
    let conn = common::kansen_db();
    let opts = FindOptions::new("kansen").filter(|q| {
        q.gt("score", 1000);
    });
    assert!(find(&conn, &opts).unwrap().is_none());
    assert!(find_all(&conn, &opts).unwrap().is_empty());
}

#[test]
fn test_count_by_columns_requires_all_non_null() {
    let conn = common::kansen_db();
    let mut row = find(
        &conn,
        &FindOptions::new("kansen").filter(|q| {
            q.eq("score", 10);
        }),
    )
    .unwrap()
    .unwrap();
    row.set_column("time_updated", chrono::Utc::now()).unwrap();

    let both = count_all(
        &conn,
        &CountOptions::new("kansen")
            .count_by(CountBy::Columns(vec!["name".into(), "time_updated".into()])),
    )
    .unwrap();
    assert_eq!(both, 1);
    assert_eq!(
        count_all(&conn, &CountOptions::new("kansen").count_by(CountBy::All)).unwrap(),
        6
    );
}

#[test]
fn test_raw_driver_error_passes_through() {
    let conn = common::kansen_db();
    let err = find_all(
        &conn,
        &FindOptions::new("kansen").filter(|q| {
            q.raw("no_such_column = 1");
        }),
    )
    .unwrap_err();
    assert!(matches!(err, DbError::Sqlite(_)));
}
