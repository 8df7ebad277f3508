//! In-process repository.
//!
//! Committed rows live behind a shared mutex; each transaction buffers its
//! own writes and only publishes them on `commit`, which re-checks every
//! buffered `(logical_id, version)` against what other transactions have
//! committed in the meantime. Reads see committed rows plus the
//! transaction's own pending rows.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use strings_schemas::{Thread, ThreadString};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::store::{
    Repository, StoreError, StringStore, Transaction, Versioned, VersionedRecordStore,
};

#[derive(Debug, Default, Clone)]
pub struct Tables {
    threads: Vec<Thread>,
    strings: Vec<ThreadString>,
}

/// Typed access to the row vector holding `T`.
pub trait Table<T> {
    fn rows(&self) -> &Vec<T>;
    fn rows_mut(&mut self) -> &mut Vec<T>;
}

impl Table<Thread> for Tables {
    fn rows(&self) -> &Vec<Thread> {
        &self.threads
    }

    fn rows_mut(&mut self) -> &mut Vec<Thread> {
        &mut self.threads
    }
}

impl Table<ThreadString> for Tables {
    fn rows(&self) -> &Vec<ThreadString> {
        &self.strings
    }

    fn rows_mut(&mut self) -> &mut Vec<ThreadString> {
        &mut self.strings
    }
}

// ---------------------------------------------------------------------------
// MemoryRepository
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    committed: Arc<Mutex<Tables>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed `(thread rows, string rows)`.
    pub async fn row_counts(&self) -> (usize, usize) {
        let t = self.committed.lock().await;
        (t.threads.len(), t.strings.len())
    }

    /// Every committed version of a thread, oldest first.
    pub async fn thread_versions(&self, thread_id: Uuid) -> Vec<Thread> {
        let t = self.committed.lock().await;
        history(&t.threads, thread_id)
    }

    /// Every committed version of a string, oldest first.
    pub async fn string_versions(&self, string_id: Uuid) -> Vec<ThreadString> {
        let t = self.committed.lock().await;
        history(&t.strings, string_id)
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        Ok(MemoryTx {
            committed: Arc::clone(&self.committed),
            pending: Tables::default(),
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryTx
// ---------------------------------------------------------------------------

pub struct MemoryTx {
    committed: Arc<Mutex<Tables>>,
    pending: Tables,
}

#[async_trait]
impl<T> VersionedRecordStore<T> for MemoryTx
where
    T: Versioned,
    Tables: Table<T>,
{
    async fn save(&mut self, mut record: T) -> Result<T, StoreError> {
        let committed = self.committed.lock().await;
        let visible = <Tables as Table<T>>::rows(&committed)
            .iter()
            .chain(<Tables as Table<T>>::rows(&self.pending).iter());

        let mut latest: Option<i32> = None;
        for row in visible {
            if row.version_id() == record.version_id() {
                return Err(StoreError::Backend(anyhow!(
                    "duplicate version_id {}",
                    record.version_id()
                )));
            }
            if row.logical_id() == record.logical_id() {
                latest = latest.max(Some(row.version()));
            }
        }
        drop(committed);

        if record.version() < 1 || latest.is_some_and(|v| record.version() <= v) {
            return Err(StoreError::VersionConflict {
                logical_id: record.logical_id(),
                version: record.version(),
            });
        }

        record.stamp(Utc::now());
        <Tables as Table<T>>::rows_mut(&mut self.pending).push(record.clone());
        Ok(record)
    }

    async fn find_latest_by_logical_id(
        &mut self,
        logical_id: Uuid,
    ) -> Result<Option<T>, StoreError> {
        let committed = self.committed.lock().await;
        let latest = <Tables as Table<T>>::rows(&committed)
            .iter()
            .chain(<Tables as Table<T>>::rows(&self.pending).iter())
            .filter(|r| r.logical_id() == logical_id)
            .max_by_key(|r| r.version())
            .cloned();
        Ok(latest)
    }

    async fn find_all_latest(&mut self) -> Result<Vec<T>, StoreError> {
        let committed = self.committed.lock().await;
        let rows = <Tables as Table<T>>::rows(&committed)
            .iter()
            .chain(<Tables as Table<T>>::rows(&self.pending).iter());
        Ok(latest_per_id(rows, |_| true))
    }
}

#[async_trait]
impl StringStore for MemoryTx {
    async fn find_all_latest_by_thread_id(
        &mut self,
        thread_id: Uuid,
    ) -> Result<Vec<ThreadString>, StoreError> {
        let committed = self.committed.lock().await;
        let rows = committed.strings.iter().chain(self.pending.strings.iter());
        Ok(latest_per_id(rows, |s| s.thread_id == thread_id))
    }
}

#[async_trait]
impl Transaction for MemoryTx {
    async fn commit(self) -> Result<(), StoreError> {
        let mut committed = self.committed.lock().await;
        check_unique(&committed.threads, &self.pending.threads)?;
        check_unique(&committed.strings, &self.pending.strings)?;

        let Tables { threads, strings } = self.pending;
        committed.threads.extend(threads);
        committed.strings.extend(strings);
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Latest row per logical id, in order of first appearance.
fn latest_per_id<'a, T, I, F>(rows: I, keep: F) -> Vec<T>
where
    T: Versioned + 'a,
    I: Iterator<Item = &'a T>,
    F: Fn(&T) -> bool,
{
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    let mut out: Vec<T> = Vec::new();
    for row in rows.filter(|r| keep(*r)) {
        match index.get(&row.logical_id()) {
            Some(&i) => {
                if row.version() > out[i].version() {
                    out[i] = row.clone();
                }
            }
            None => {
                index.insert(row.logical_id(), out.len());
                out.push(row.clone());
            }
        }
    }
    out
}

fn history<T: Versioned>(rows: &[T], logical_id: Uuid) -> Vec<T> {
    let mut out: Vec<T> = rows
        .iter()
        .filter(|r| r.logical_id() == logical_id)
        .cloned()
        .collect();
    out.sort_by_key(|r| r.version());
    out
}

/// The `(logical_id, version)` uniqueness a database would enforce on commit.
fn check_unique<T: Versioned>(committed: &[T], pending: &[T]) -> Result<(), StoreError> {
    for row in pending {
        let taken = committed
            .iter()
            .any(|c| c.logical_id() == row.logical_id() && c.version() >= row.version());
        if taken {
            return Err(StoreError::VersionConflict {
                logical_id: row.logical_id(),
                version: row.version(),
            });
        }
    }
    Ok(())
}
