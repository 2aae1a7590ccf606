use basecamp::StoreError;
use basecamp::table::{Fault, Table};

#[derive(Debug, Clone, PartialEq)]
struct Row {
    id: i64,
    group: i64,
    rank: i64,
}

fn row(id: i64, group: i64, rank: i64) -> Row {
    Row { id, group, rank }
}

#[test]
fn test_insert_and_get() {
    let mut table = Table::new();
    let id = table.allocate_id();
    table.insert(id, row(id, 1, 0)).unwrap();

    assert_eq!(table.len(), 1);
    assert_eq!(table.get(id), Some(&row(id, 1, 0)));
    assert!(table.get(id + 1).is_none());
}

#[test]
fn test_ids_are_positive_and_unique() {
    let mut table: Table<Row> = Table::new();
    let a = table.allocate_id();
    let b = table.allocate_id();
    assert!(a > 0);
    assert!(b > a);
}

#[test]
fn test_duplicate_insert_conflicts() {
    let mut table = Table::new();
    let id = table.allocate_id();
    table.insert(id, row(id, 1, 0)).unwrap();

    let err = table.insert(id, row(id, 1, 1)).unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    // The original row survives.
    assert_eq!(table.get(id), Some(&row(id, 1, 0)));
}

#[test]
fn test_update_missing_row() {
    let mut table: Table<Row> = Table::new();
    let err = table.update(42, |r| r.rank = 9).unwrap_err();
    assert_eq!(err, StoreError::NotFound);
}

#[test]
fn test_select_sorted_by_orders_and_filters() {
    let mut table = Table::new();
    for (group, rank) in [(1, 2), (2, 0), (1, 0), (1, 1)] {
        let id = table.allocate_id();
        table.insert(id, row(id, group, rank)).unwrap();
    }

    let group1 = table.select_sorted_by(|r| r.group == 1, |r| r.rank);
    let ranks: Vec<i64> = group1.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, vec![0, 1, 2]);
}

#[test]
fn test_equal_sort_keys_keep_id_order() {
    let mut table = Table::new();
    let first = table.allocate_id();
    table.insert(first, row(first, 1, 5)).unwrap();
    let second = table.allocate_id();
    table.insert(second, row(second, 1, 5)).unwrap();

    let rows = table.select_sorted_by(|_| true, |r| r.rank);
    assert_eq!(rows[0].id, first);
    assert_eq!(rows[1].id, second);
}

#[test]
fn test_faults_consumed_in_order() {
    let mut table = Table::new();
    let id = table.allocate_id();
    table.insert(id, row(id, 1, 0)).unwrap();

    table.push_fault(Fault::Ok);
    table.push_fault(Fault::Err(StoreError::Rejected("offline".into())));

    // First write passes, second fails, third (queue empty) passes again.
    table.update(id, |r| r.rank = 1).unwrap();
    let err = table.update(id, |r| r.rank = 2).unwrap_err();
    assert_eq!(err, StoreError::Rejected("offline".into()));
    table.update(id, |r| r.rank = 3).unwrap();

    assert_eq!(table.get(id).map(|r| r.rank), Some(3));
    assert!(!table.has_pending_fault());
}

#[test]
fn test_remove_where_cascades() {
    let mut table = Table::new();
    for group in [1, 1, 2] {
        let id = table.allocate_id();
        table.insert(id, row(id, group, 0)).unwrap();
    }

    assert_eq!(table.remove_where(|r| r.group == 1), 2);
    assert_eq!(table.len(), 1);
    assert!(table.find(|r| r.group == 1).is_none());
}
