use strings_schemas::{ClientThread, Thread, ThreadString};
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use crate::engine::{Change, ReconciliationEngine};
use crate::error::EngineError;
use crate::store::{Repository, Transaction};

const CHANGE_CAPACITY: usize = 1024;

/// Runs one engine operation per transaction: begin, run, then commit, or
/// roll back on any error. Committed writes are published to subscribers.
pub struct StringsService<R: Repository> {
    repo: R,
    changes: broadcast::Sender<Change>,
}

/// Expands to a full begin / run / commit-or-rollback cycle around one
/// engine call.
macro_rules! in_tx {
    ($svc:expr, $op:literal, |$engine:ident| $call:expr) => {{
        let mut tx = $svc.repo.begin().await?;
        let mut $engine = ReconciliationEngine::new(&mut tx);
        let result = $call.await;
        let changes = $engine.into_changes();
        $svc.finish(tx, $op, result, changes).await
    }};
}

impl<R: Repository> StringsService<R> {
    pub fn new(repo: R) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self { repo, changes }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Committed writes, one message per version row.
    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }

    pub async fn post_thread(&self, client: ClientThread) -> Result<Thread, EngineError> {
        in_tx!(self, "post_thread", |engine| engine.post_thread(client))
    }

    pub async fn get_threads(&self) -> Result<Vec<Thread>, EngineError> {
        in_tx!(self, "get_threads", |engine| engine.get_threads())
    }

    pub async fn get_thread_ids(&self) -> Result<Vec<Uuid>, EngineError> {
        in_tx!(self, "get_thread_ids", |engine| engine.get_thread_ids())
    }

    pub async fn get_thread_by_id(&self, thread_id: Uuid) -> Result<Thread, EngineError> {
        in_tx!(self, "get_thread_by_id", |engine| engine
            .get_thread_by_id(thread_id))
    }

    pub async fn archive_thread(&self, thread_id: Uuid) -> Result<Thread, EngineError> {
        in_tx!(self, "archive_thread", |engine| engine.archive_thread(thread_id))
    }

    pub async fn restore_thread(&self, thread_id: Uuid) -> Result<Thread, EngineError> {
        in_tx!(self, "restore_thread", |engine| engine.restore_thread(thread_id))
    }

    pub async fn delete_thread(&self, thread_id: Uuid) -> Result<Thread, EngineError> {
        in_tx!(self, "delete_thread", |engine| engine.delete_thread(thread_id))
    }

    pub async fn archive_string(&self, string_id: Uuid) -> Result<ThreadString, EngineError> {
        in_tx!(self, "archive_string", |engine| engine.archive_string(string_id))
    }

    pub async fn restore_string(&self, string_id: Uuid) -> Result<ThreadString, EngineError> {
        in_tx!(self, "restore_string", |engine| engine.restore_string(string_id))
    }

    pub async fn delete_string(&self, string_id: Uuid) -> Result<ThreadString, EngineError> {
        in_tx!(self, "delete_string", |engine| engine.delete_string(string_id))
    }

    pub async fn activate_string(&self, string_id: Uuid) -> Result<ThreadString, EngineError> {
        in_tx!(self, "activate_string", |engine| engine.activate_string(string_id))
    }

    pub async fn deactivate_string(&self, string_id: Uuid) -> Result<ThreadString, EngineError> {
        in_tx!(self, "deactivate_string", |engine| engine
            .deactivate_string(string_id))
    }

    pub async fn make_private(&self, string_id: Uuid) -> Result<ThreadString, EngineError> {
        in_tx!(self, "make_private", |engine| engine.make_private(string_id))
    }

    pub async fn make_public(&self, string_id: Uuid) -> Result<ThreadString, EngineError> {
        in_tx!(self, "make_public", |engine| engine.make_public(string_id))
    }

    async fn finish<T>(
        &self,
        tx: R::Tx,
        op: &'static str,
        result: Result<T, EngineError>,
        changes: Vec<Change>,
    ) -> Result<T, EngineError> {
        match result {
            Ok(value) => {
                tx.commit().await?;
                for change in changes {
                    // No subscribers is fine.
                    let _ = self.changes.send(change);
                }
                Ok(value)
            }
            Err(err) => {
                warn!(op, error = %err, writes = changes.len(), "rolling back");
                if let Err(rb) = tx.rollback().await {
                    warn!(op, error = %rb, "rollback failed");
                }
                Err(err)
            }
        }
    }
}
