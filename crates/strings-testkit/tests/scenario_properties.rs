//! Cross-cutting properties of the versioned store
//!
//! # Invariants under test
//!
//! 1. Append-only: each logical id's history has strictly increasing
//!    versions starting at 1, and the latest read is the highest one.
//! 2. Contiguity: the Default bucket reads `1..=N` after every operation.
//! 3. Lock enforcement: a locked thread rejects content edits and writes
//!    nothing.
//! 4. Terminal delete: a deleted entity rejects every further transition.

use strings_engine::EngineError;
use strings_reconcile::ReconcileError;
use strings_testkit::{is_contiguous, memory_service, resubmit, string_id, thread_payload};

#[tokio::test]
async fn history_is_append_only() {
    let svc = memory_service();
    let t = svc
        .post_thread(thread_payload("T", &[("a", 0), ("b", 0), ("c", 0)]))
        .await
        .unwrap();
    let b = string_id(&t, "b").unwrap();

    svc.archive_string(b).await.unwrap();
    svc.restore_string(b).await.unwrap();
    svc.make_private(b).await.unwrap();
    svc.archive_thread(t.thread_id).await.unwrap();
    svc.restore_thread(t.thread_id).await.unwrap();

    let repo = svc.repository();
    let strings = repo.string_versions(b).await;
    let versions: Vec<i32> = strings.iter().map(|s| s.version).collect();
    assert_eq!(versions, vec![1, 2, 3, 4]);

    let threads = repo.thread_versions(t.thread_id).await;
    let versions: Vec<i32> = threads.iter().map(|t| t.version).collect();
    assert_eq!(versions, vec![1, 2, 3]);

    let latest = svc.get_thread_by_id(t.thread_id).await.unwrap();
    assert_eq!(latest.version, 3);
    let latest_b = latest.strings.iter().find(|s| s.string_id == b).unwrap();
    assert_eq!(latest_b.version, 4);
    assert!(latest_b.private);
}

#[tokio::test]
async fn default_bucket_stays_contiguous() {
    let svc = memory_service();
    let t = svc
        .post_thread(thread_payload("T", &[("a", 0), ("b", 0), ("c", 0), ("d", 0)]))
        .await
        .unwrap();
    let a = string_id(&t, "a").unwrap();
    let c = string_id(&t, "c").unwrap();

    svc.archive_string(c).await.unwrap();
    assert!(is_contiguous(&svc.get_thread_by_id(t.thread_id).await.unwrap()));

    svc.delete_string(a).await.unwrap();
    assert!(is_contiguous(&svc.get_thread_by_id(t.thread_id).await.unwrap()));

    svc.restore_string(c).await.unwrap();
    let after = svc.get_thread_by_id(t.thread_id).await.unwrap();
    assert!(is_contiguous(&after));
    let c_now = after.strings.iter().find(|s| s.string_id == c).unwrap();
    assert_eq!(c_now.order, 3);
}

#[tokio::test]
async fn locked_thread_rejects_rename_without_writing() {
    let svc = memory_service();
    let t = svc
        .post_thread(thread_payload("T", &[("a", 0)]))
        .await
        .unwrap();
    let archived = svc.archive_thread(t.thread_id).await.unwrap();
    let before = svc.repository().row_counts().await;

    let mut payload = resubmit(&archived);
    payload.name = "renamed".into();
    let err = svc.post_thread(payload).await.unwrap_err();

    assert!(matches!(
        err,
        EngineError::Reconcile(ReconcileError::ThreadCannotBeUpdated { .. })
    ));
    assert_eq!(svc.repository().row_counts().await, before);

    // Echoing it back unchanged is still fine.
    let same = svc.post_thread(resubmit(&archived)).await.unwrap();
    assert_eq!(same.version, archived.version);
}

#[tokio::test]
async fn delete_is_terminal() {
    let svc = memory_service();
    let t = svc
        .post_thread(thread_payload("T", &[("a", 0)]))
        .await
        .unwrap();
    let a = string_id(&t, "a").unwrap();

    svc.delete_thread(t.thread_id).await.unwrap();
    svc.delete_string(a).await.unwrap();
    let before = svc.repository().row_counts().await;

    for result in [
        svc.archive_thread(t.thread_id).await,
        svc.restore_thread(t.thread_id).await,
        svc.delete_thread(t.thread_id).await,
    ] {
        assert!(matches!(
            result,
            Err(EngineError::Reconcile(ReconcileError::AlreadyDeleted { .. }))
        ));
    }
    for result in [
        svc.archive_string(a).await,
        svc.restore_string(a).await,
        svc.delete_string(a).await,
    ] {
        assert!(matches!(
            result,
            Err(EngineError::Reconcile(ReconcileError::AlreadyDeleted { .. }))
        ));
    }
    assert!(svc.make_private(a).await.is_err());

    assert_eq!(svc.repository().row_counts().await, before);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let svc = memory_service();
    let id = uuid::Uuid::new_v4();
    assert!(matches!(
        svc.get_thread_by_id(id).await,
        Err(EngineError::ThreadNotFound { .. })
    ));
    assert!(matches!(
        svc.archive_string(id).await,
        Err(EngineError::StringNotFound { .. })
    ));
}
