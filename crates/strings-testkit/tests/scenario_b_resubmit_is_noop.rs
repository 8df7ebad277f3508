//! Scenario B: resubmitting an unchanged thread writes nothing
//!
//! # Invariants under test
//!
//! 1. Echoing the server's snapshot back returns equal content.
//! 2. The thread stays at version 1 and no string row is added.
//! 3. Reordering the payload without changing any order is still a no-op.

use strings_testkit::{memory_service, resubmit, thread_payload};

#[tokio::test]
async fn unchanged_resubmission_is_a_no_op() {
    let svc = memory_service();
    let created = svc
        .post_thread(thread_payload("T1", &[("a", 0), ("b", 0)]))
        .await
        .unwrap();

    let again = svc.post_thread(resubmit(&created)).await.unwrap();
    assert_eq!(again, created);
    assert_eq!(again.version, 1);
    assert_eq!(svc.repository().row_counts().await, (1, 2));

    // Repeat: still nothing.
    svc.post_thread(resubmit(&again)).await.unwrap();
    assert_eq!(svc.repository().row_counts().await, (1, 2));
}

#[tokio::test]
async fn payload_position_alone_is_not_a_change() {
    let svc = memory_service();
    let created = svc
        .post_thread(thread_payload("T1", &[("a", 0), ("b", 0)]))
        .await
        .unwrap();

    let mut payload = resubmit(&created);
    payload.strings.reverse();
    let again = svc.post_thread(payload).await.unwrap();

    assert_eq!(again.version, 1);
    assert_eq!(svc.repository().row_counts().await, (1, 2));
}

#[tokio::test]
async fn empty_name_on_existing_thread_keeps_server_name() {
    let svc = memory_service();
    let created = svc
        .post_thread(thread_payload("T1", &[("a", 0)]))
        .await
        .unwrap();

    let mut payload = resubmit(&created);
    payload.name.clear();
    let again = svc.post_thread(payload).await.unwrap();

    assert_eq!(again.name, "T1");
    assert_eq!(again.version, 1);
}
