//! Nested-transaction semantics.
//!
//! Covers the commit/abort matrix for transactional variables, the
//! asymmetric package-removal behavior, and the reset point when the last
//! top-level finalize empties the registry.

use satchel::prelude::*;

// ============================================================================
// Basic commit/abort
// ============================================================================

#[test]
fn committed_set_persists() {
    let mut session = Session::new();

    session.begin();
    session.set("pkg", "x", 1, true).unwrap();
    session.commit().unwrap();

    assert_eq!(session.get_int("pkg", "x", true).unwrap(), Some(1));
    assert!(!session.has_pending_changes());
}

#[test]
fn aborted_creation_leaves_no_trace() {
    let mut session = Session::new();

    session.begin();
    session.set("pkg", "x", 1, true).unwrap();
    session.rollback().unwrap();

    assert!(!session.exists("pkg", "x").unwrap());
    assert!(!session.package_exists("pkg").unwrap());
    assert_eq!(session.get("pkg", "x", false).unwrap(), None);
    let err = session.get("pkg", "x", true).unwrap_err();
    assert_eq!(err, Error::PackageNotFound("pkg".into()));
}

#[test]
fn abort_restores_pre_transaction_value() {
    let mut session = Session::new();
    session.set("pkg", "x", 10, true).unwrap();

    session.begin();
    session.set("pkg", "x", 20, true).unwrap();
    assert_eq!(session.get_int("pkg", "x", true).unwrap(), Some(20));
    session.rollback().unwrap();

    assert_eq!(session.get_int("pkg", "x", true).unwrap(), Some(10));
}

// ============================================================================
// Nested levels
// ============================================================================

#[test]
fn inner_abort_keeps_outer_change() {
    let mut session = Session::new();

    session.begin();
    session.set("pkg", "x", 1, true).unwrap();

    session.begin();
    session.set("pkg", "x", 2, true).unwrap();
    session.rollback().unwrap();

    assert_eq!(session.get_int("pkg", "x", true).unwrap(), Some(1));

    session.commit().unwrap();
    assert_eq!(session.get_int("pkg", "x", true).unwrap(), Some(1));
}

#[test]
fn inner_commit_merges_into_outer_then_abort_undoes_both() {
    let mut session = Session::new();

    session.begin();
    session.set("pkg", "x", 1, true).unwrap();

    session.begin();
    session.set("pkg", "x", 2, true).unwrap();
    session.commit().unwrap();

    // Still inside level 1: the inner value is visible.
    assert_eq!(session.get_int("pkg", "x", true).unwrap(), Some(2));

    session.rollback().unwrap();
    assert!(!session.exists("pkg", "x").unwrap());
}

#[test]
fn inner_commit_collapses_into_untouched_parent() {
    let mut session = Session::new();
    session.set("pkg", "x", 0, true).unwrap();

    session.begin();
    // Level 1 does not touch x.
    session.begin();
    session.set("pkg", "x", 2, true).unwrap();
    session.commit().unwrap();

    assert_eq!(session.get_int("pkg", "x", true).unwrap(), Some(2));

    // The collapsed change now belongs to level 1; aborting it restores
    // the pre-transaction value.
    session.rollback().unwrap();
    assert_eq!(session.get_int("pkg", "x", true).unwrap(), Some(0));
}

#[test]
fn inner_commit_merges_with_parent_savepoint() {
    let mut session = Session::new();
    session.set("pkg", "x", 0, true).unwrap();

    session.begin();
    session.set("pkg", "x", 1, true).unwrap();
    session.begin();
    session.set("pkg", "x", 2, true).unwrap();
    session.commit().unwrap();

    assert_eq!(session.get_int("pkg", "x", true).unwrap(), Some(2));

    session.rollback().unwrap();
    assert_eq!(session.get_int("pkg", "x", true).unwrap(), Some(0));
}

#[test]
fn deep_nesting_unwinds_level_by_level() {
    let mut session = Session::new();
    session.set("pkg", "x", 0, true).unwrap();

    for value in 1..=4 {
        session.begin();
        session.set("pkg", "x", value, true).unwrap();
    }
    assert_eq!(session.nesting_level(), 4);

    // Abort levels 4 and 3, commit levels 2 and 1.
    session.rollback().unwrap();
    assert_eq!(session.get_int("pkg", "x", true).unwrap(), Some(3));
    session.rollback().unwrap();
    assert_eq!(session.get_int("pkg", "x", true).unwrap(), Some(2));
    session.commit().unwrap();
    session.commit().unwrap();

    assert_eq!(session.get_int("pkg", "x", true).unwrap(), Some(2));
    assert!(!session.in_transaction());
    assert!(!session.has_pending_changes());
}

#[test]
fn sibling_subtransactions_are_independent() {
    let mut session = Session::new();
    session.set("pkg", "x", 0, true).unwrap();

    session.begin();

    session.begin();
    session.set("pkg", "x", 1, true).unwrap();
    session.rollback().unwrap();
    assert_eq!(session.get_int("pkg", "x", true).unwrap(), Some(0));

    session.begin();
    session.set("pkg", "x", 2, true).unwrap();
    session.commit().unwrap();
    assert_eq!(session.get_int("pkg", "x", true).unwrap(), Some(2));

    session.commit().unwrap();
    assert_eq!(session.get_int("pkg", "x", true).unwrap(), Some(2));
}

// ============================================================================
// Variable removal under transactions
// ============================================================================

#[test]
fn aborted_variable_removal_is_undone() {
    let mut session = Session::new();
    session.set("pkg", "x", 7, true).unwrap();

    session.begin();
    session.remove_variable("pkg", "x").unwrap();
    assert!(!session.exists("pkg", "x").unwrap());
    session.rollback().unwrap();

    assert_eq!(session.get_int("pkg", "x", true).unwrap(), Some(7));
}

#[test]
fn committed_variable_removal_is_final() {
    let mut session = Session::new();
    session.set("pkg", "x", 7, true).unwrap();
    session.set("pkg", "keep", 1, true).unwrap();

    session.begin();
    session.remove_variable("pkg", "x").unwrap();
    session.commit().unwrap();

    assert!(!session.exists("pkg", "x").unwrap());
    assert!(session.package_exists("pkg").unwrap());
    assert_eq!(session.get_int("pkg", "keep", true).unwrap(), Some(1));
}

#[test]
fn remove_then_recreate_in_same_level_rolls_back_to_original() {
    let mut session = Session::new();
    session.set("pkg", "x", 1, true).unwrap();

    session.begin();
    session.remove_variable("pkg", "x").unwrap();
    session.set("pkg", "x", 5, true).unwrap();
    assert_eq!(session.get_int("pkg", "x", true).unwrap(), Some(5));
    session.rollback().unwrap();

    assert_eq!(session.get_int("pkg", "x", true).unwrap(), Some(1));
}

#[test]
fn regular_variable_removal_survives_abort() {
    let mut session = Session::new();
    session.set("pkg", "r", 1, false).unwrap();
    session.set("pkg", "anchor", 0, true).unwrap();

    session.begin();
    session.remove_variable("pkg", "r").unwrap();
    session.rollback().unwrap();

    // Documented irreversibility: regular storage is released eagerly.
    assert!(!session.exists("pkg", "r").unwrap());
    assert!(session.package_exists("pkg").unwrap());
}

// ============================================================================
// Package removal asymmetry
// ============================================================================

#[test]
fn aborted_package_removal_restores_transactional_but_not_regular() {
    let mut session = Session::new();
    session.set("pkg", "reg", "regular-value", false).unwrap();
    session.set("pkg", "trx", "transactional-value", true).unwrap();

    session.begin();
    session.remove_package("pkg").unwrap();
    assert!(!session.package_exists("pkg").unwrap());
    assert!(!session.exists("pkg", "trx").unwrap());
    assert_eq!(session.get("pkg", "trx", false).unwrap(), None);
    session.rollback().unwrap();

    // The package and its transactional variables come back intact.
    assert!(session.package_exists("pkg").unwrap());
    assert_eq!(
        session.get_str("pkg", "trx", true).unwrap(),
        Some("transactional-value".into())
    );
    // The regular map is resurrected empty.
    assert!(!session.exists("pkg", "reg").unwrap());
    assert_eq!(session.get("pkg", "reg", false).unwrap(), None);
}

#[test]
fn committed_package_removal_destroys_everything() {
    let mut session = Session::new();
    session.set("pkg", "reg", 1, false).unwrap();
    session.set("pkg", "trx", 2, true).unwrap();

    session.begin();
    session.remove_package("pkg").unwrap();
    session.commit().unwrap();

    assert!(!session.package_exists("pkg").unwrap());
    assert!(session.list().is_empty());
}

#[test]
fn removed_package_can_be_recreated_in_same_transaction() {
    let mut session = Session::new();
    session.set("pkg", "old", 1, true).unwrap();

    session.begin();
    session.remove_package("pkg").unwrap();
    session.set("pkg", "fresh", 2, true).unwrap();

    // The resurrected package must not leak pre-removal variables.
    assert!(session.package_exists("pkg").unwrap());
    assert!(!session.exists("pkg", "old").unwrap());
    assert_eq!(session.get_int("pkg", "fresh", true).unwrap(), Some(2));

    session.rollback().unwrap();

    // Abort undoes removal and re-creation alike.
    assert_eq!(session.get_int("pkg", "old", true).unwrap(), Some(1));
    assert!(!session.exists("pkg", "fresh").unwrap());
}

#[test]
fn package_created_in_aborted_subtransaction_is_destroyed() {
    let mut session = Session::new();
    session.set("other", "keep", 1, true).unwrap();

    session.begin();
    session.begin();
    session.set("pkg", "x", 1, true).unwrap();
    session.rollback().unwrap();

    assert!(!session.package_exists("pkg").unwrap());
    session.commit().unwrap();
    assert!(session.package_exists("other").unwrap());
}

// ============================================================================
// Records under transactions
// ============================================================================

#[test]
fn record_changes_roll_back_as_a_whole_row_set() {
    let mut session = Session::new();
    session
        .insert_record("pkg", "rows", vec![Value::Int(1), Value::from("one")], true)
        .unwrap();
    session
        .insert_record("pkg", "rows", vec![Value::Int(2), Value::from("two")], true)
        .unwrap();

    session.begin();
    session
        .update_record("pkg", "rows", vec![Value::Int(1), Value::from("ONE")])
        .unwrap();
    session.delete_record("pkg", "rows", 2).unwrap();
    session
        .insert_record("pkg", "rows", vec![Value::Int(3), Value::from("three")], true)
        .unwrap();

    let mut inside: Vec<i64> = session
        .records("pkg", "rows")
        .unwrap()
        .iter()
        .map(|row| row[0].as_int().unwrap())
        .collect();
    inside.sort();
    assert_eq!(inside, vec![1, 3]);

    session.rollback().unwrap();

    let rows = session.records("pkg", "rows").unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(
        session.record_by_key("pkg", "rows", 1).unwrap().unwrap()[1],
        Value::from("one")
    );
    assert_eq!(
        session.record_by_key("pkg", "rows", 2).unwrap().unwrap()[1],
        Value::from("two")
    );
}

#[test]
fn record_changes_commit_level_by_level() {
    let mut session = Session::new();

    session.begin();
    session
        .insert_record("pkg", "rows", vec![Value::Int(1), Value::from("a")], true)
        .unwrap();
    session.begin();
    session
        .insert_record("pkg", "rows", vec![Value::Int(2), Value::from("b")], true)
        .unwrap();
    session.commit().unwrap();
    session.commit().unwrap();

    assert_eq!(session.records("pkg", "rows").unwrap().len(), 2);
}

// ============================================================================
// The reset point
// ============================================================================

#[test]
fn emptying_abort_resets_store_for_first_ever_use() {
    let mut session = Session::new();

    session.begin();
    session.set("pkg", "x", 1, true).unwrap();
    session
        .insert_record("pkg", "rows", vec![Value::Int(1)], true)
        .unwrap();
    session.rollback().unwrap();

    assert!(session.list().is_empty());
    assert!(session.stats().is_empty());
    assert!(!session.has_pending_changes());

    // Subsequent creation behaves as first-ever use.
    session.begin();
    session.set("pkg", "x", 42, true).unwrap();
    session.commit().unwrap();
    assert_eq!(session.get_int("pkg", "x", true).unwrap(), Some(42));
}

#[test]
fn emptying_commit_resets_store() {
    let mut session = Session::new();
    session.set("pkg", "x", 1, true).unwrap();

    session.begin();
    session.remove_package("pkg").unwrap();
    session.commit().unwrap();

    assert!(session.list().is_empty());
    assert!(!session.has_pending_changes());

    session.set("pkg", "x", 2, false).unwrap();
    assert_eq!(session.get_int("pkg", "x", true).unwrap(), Some(2));
}

// ============================================================================
// Autocommit (no active transaction)
// ============================================================================

#[test]
fn changes_outside_transactions_are_immediate() {
    let mut session = Session::new();
    session.set("pkg", "x", 1, true).unwrap();
    assert!(!session.has_pending_changes());

    session.remove_package("pkg").unwrap();
    assert!(!session.package_exists("pkg").unwrap());
    assert!(session.list().is_empty());
}

#[test]
fn commit_without_transaction_is_an_error() {
    let mut session = Session::new();
    let err = session.commit().unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    let err = session.rollback().unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}
