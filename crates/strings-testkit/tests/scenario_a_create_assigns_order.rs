//! Scenario A: creating a thread assigns contiguous orders
//!
//! # Invariants under test
//!
//! 1. A new thread and each of its strings are written at version 1.
//! 2. Unordered strings get 1, 2, ... in submission order.
//! 3. Every string is owned by the new thread.

use strings_testkit::{
    default_orders, is_contiguous, load_client_thread_json, memory_service, thread_payload,
};

#[tokio::test]
async fn create_assigns_orders_in_submission_order() {
    let svc = memory_service();
    let t = svc
        .post_thread(thread_payload("T1", &[("a", 0), ("b", 0)]))
        .await
        .unwrap();

    assert_eq!(t.version, 1);
    assert_eq!(t.name, "T1");
    assert_eq!(
        default_orders(&t),
        vec![("a".to_string(), 1), ("b".to_string(), 2)]
    );
    assert!(t.strings.iter().all(|s| s.version == 1));
    assert!(t.strings.iter().all(|s| s.thread_id == t.thread_id));
    assert!(is_contiguous(&t));

    assert_eq!(svc.repository().row_counts().await, (1, 2));
}

#[tokio::test]
async fn create_from_json_fixture() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/scenario_a.json");
    let payload = load_client_thread_json(path).unwrap();
    assert!(payload.thread_id.is_none());

    let svc = memory_service();
    let t = svc.post_thread(payload).await.unwrap();
    assert_eq!(
        default_orders(&t),
        vec![("a".to_string(), 1), ("b".to_string(), 2)]
    );
}

#[tokio::test]
async fn explicit_orders_are_kept_and_unordered_follow() {
    let svc = memory_service();
    let t = svc
        .post_thread(thread_payload("T", &[("x", 0), ("y", 1)]))
        .await
        .unwrap();
    assert_eq!(
        default_orders(&t),
        vec![("y".to_string(), 1), ("x".to_string(), 2)]
    );
}
