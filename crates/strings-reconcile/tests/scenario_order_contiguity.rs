//! Scenario: Default-bucket order contiguity
//!
//! # Invariants under test
//!
//! 1. After a successful `reconcile`, Default orders are exactly `1..=N`.
//! 2. Explicitly ordered strings keep their requested slot; unordered ones
//!    fill the tail in submission order.
//! 3. Negative orders are rejected as `InvalidOrder`.
//! 4. Orders beyond the bucket size are rejected as `OrderOutOfRange`.
//! 5. Duplicate explicit orders are rejected as `InvalidStringOrder`.
//!
//! All tests are pure in-process; no DB or network required.

use strings_reconcile::{ReconcileError, StringOrderSet};
use strings_schemas::{ClientString, ThreadString};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn drafts(thread_id: Uuid, client: &[ClientString]) -> StringOrderSet {
    let mut set = StringOrderSet::empty();
    let fresh = set.new_strings(thread_id, client);
    set.include(fresh);
    set
}

fn names_and_orders(set: &StringOrderSet) -> Vec<(String, i32)> {
    set.default_bucket()
        .iter()
        .map(|s| (s.name.clone(), s.order))
        .collect()
}

fn assert_contiguous(set: &StringOrderSet) {
    let orders: Vec<i32> = set.default_bucket().iter().map(|s| s.order).collect();
    let expected: Vec<i32> = (1..=orders.len() as i32).collect();
    assert_eq!(orders, expected, "default bucket must read 1..=N");
}

// ---------------------------------------------------------------------------
// 1-2. Assignment
// ---------------------------------------------------------------------------

#[test]
fn all_unordered_strings_get_submission_order() {
    let t = Uuid::new_v4();
    let mut set = drafts(
        t,
        &[
            ClientString::new("a", 0),
            ClientString::new("b", 0),
            ClientString::new("c", 0),
        ],
    );
    set.reconcile().unwrap();

    assert_contiguous(&set);
    assert_eq!(
        names_and_orders(&set),
        vec![("a".into(), 1), ("b".into(), 2), ("c".into(), 3)]
    );
}

#[test]
fn explicit_orders_are_placed_before_unordered_tail() {
    let t = Uuid::new_v4();
    let mut set = drafts(
        t,
        &[
            ClientString::new("tail", 0),
            ClientString::new("second", 2),
            ClientString::new("first", 1),
        ],
    );
    set.reconcile().unwrap();

    assert_contiguous(&set);
    assert_eq!(
        names_and_orders(&set),
        vec![
            ("first".into(), 1),
            ("second".into(), 2),
            ("tail".into(), 3)
        ]
    );
}

#[test]
fn moving_an_existing_string_with_diff_against_keeps_contiguity() {
    let t = Uuid::new_v4();
    let a = ThreadString::first_version(t, Uuid::new_v4(), "a", 1);
    let b = ThreadString::first_version(t, Uuid::new_v4(), "b", 2);
    let mut set = StringOrderSet::new(vec![a.clone(), b.clone()]);

    let updated = set
        .diff_against(&[
            ClientString::existing(a.string_id, "a", 2),
            ClientString::existing(b.string_id, "b", 1),
        ])
        .unwrap();
    assert_eq!(updated.len(), 2);

    set.reconcile().unwrap();
    assert_contiguous(&set);
    assert_eq!(set.default_bucket()[0].string_id, b.string_id);
}

// ---------------------------------------------------------------------------
// 3-5. Rejections
// ---------------------------------------------------------------------------

#[test]
fn negative_order_is_invalid() {
    let t = Uuid::new_v4();
    let mut set = drafts(t, &[ClientString::new("a", -3)]);
    let err = set.reconcile().unwrap_err();
    assert!(matches!(err, ReconcileError::InvalidOrder { order: -3, .. }));
}

#[test]
fn order_beyond_bucket_size_is_out_of_range() {
    let t = Uuid::new_v4();
    let mut set = drafts(
        t,
        &[
            ClientString::new("a", 1),
            ClientString::new("b", 2),
            ClientString::new("c", 5),
        ],
    );
    let err = set.reconcile().unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::OrderOutOfRange {
            order: 5,
            max_range: 3,
            ..
        }
    ));
}

#[test]
fn unordered_strings_count_towards_max_range() {
    let t = Uuid::new_v4();
    let mut set = drafts(
        t,
        &[
            ClientString::new("a", 0),
            ClientString::new("b", 0),
            ClientString::new("c", 3),
        ],
    );
    // Order 3 is within range, but 1 and 2 are not explicitly taken.
    let err = set.reconcile().unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::InvalidStringOrder {
            order: 3,
            expected: 1,
            ..
        }
    ));
}

#[test]
fn duplicate_explicit_order_is_rejected() {
    let t = Uuid::new_v4();
    let mut set = drafts(t, &[ClientString::new("a", 1), ClientString::new("b", 1)]);
    let err = set.reconcile().unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::InvalidStringOrder {
            order: 1,
            expected: 2,
            ..
        }
    ));
}
