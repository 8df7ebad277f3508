//! Scenario E: orders beyond the Default bucket size are rejected
//!
//! # Invariants under test
//!
//! 1. Moving a string to order 5 in a 3-string thread fails `OrderOutOfRange`.
//! 2. Nothing is written.

use strings_engine::EngineError;
use strings_reconcile::ReconcileError;
use strings_testkit::{memory_service, resubmit, string_id, thread_payload};

#[tokio::test]
async fn order_beyond_bucket_size_is_rejected() {
    let svc = memory_service();
    let created = svc
        .post_thread(thread_payload("T", &[("a", 0), ("b", 0), ("c", 0)]))
        .await
        .unwrap();
    let a = string_id(&created, "a").unwrap();

    let mut payload = resubmit(&created);
    for s in payload.strings.iter_mut() {
        if s.string_id == Some(a) {
            s.order = 5;
        }
    }

    let err = svc.post_thread(payload).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Reconcile(ReconcileError::OrderOutOfRange {
            order: 5,
            max_range: 3,
            ..
        })
    ));
    assert_eq!(svc.repository().row_counts().await, (1, 3));
}

#[tokio::test]
async fn new_thread_with_out_of_range_order_writes_nothing() {
    let svc = memory_service();
    let err = svc
        .post_thread(thread_payload("T", &[("a", 0), ("b", 5)]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Reconcile(ReconcileError::OrderOutOfRange { .. })
    ));
    assert_eq!(svc.repository().row_counts().await, (0, 0));
}
