//! Persistence contract.
//!
//! A store only ever appends version rows. "Current state" is the row with
//! the highest `version` per logical id, computed at read time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use strings_schemas::{Thread, ThreadString};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum StoreError {
    /// `(logical_id, version)` is already taken, or a newer version exists.
    /// Another writer got there first; re-read and retry.
    VersionConflict { logical_id: Uuid, version: i32 },
    /// Anything else the backend reports. Not interpreted.
    Backend(anyhow::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::VersionConflict {
                logical_id,
                version,
            } => write!(
                f,
                "version conflict: {logical_id} already has version {version} or newer"
            ),
            StoreError::Backend(e) => write!(f, "store backend error: {e:#}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Backend(e) => Some(&**e),
            StoreError::VersionConflict { .. } => None,
        }
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(e: anyhow::Error) -> Self {
        StoreError::Backend(e)
    }
}

// ---------------------------------------------------------------------------
// Versioned
// ---------------------------------------------------------------------------

/// A version row keyed by `(logical_id, version)`.
pub trait Versioned: Clone + Send + Sync + 'static {
    fn logical_id(&self) -> Uuid;
    fn version_id(&self) -> Uuid;
    fn version(&self) -> i32;
    /// Server-assigned creation time, set by the store on save.
    fn stamp(&mut self, created_at: DateTime<Utc>);
}

impl Versioned for Thread {
    fn logical_id(&self) -> Uuid {
        self.thread_id
    }

    fn version_id(&self) -> Uuid {
        self.version_id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn stamp(&mut self, created_at: DateTime<Utc>) {
        self.created_at = created_at;
    }
}

impl Versioned for ThreadString {
    fn logical_id(&self) -> Uuid {
        self.string_id
    }

    fn version_id(&self) -> Uuid {
        self.version_id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn stamp(&mut self, created_at: DateTime<Utc>) {
        self.created_at = created_at;
    }
}

// ---------------------------------------------------------------------------
// Store traits
// ---------------------------------------------------------------------------

/// Append-only store for one entity kind.
#[async_trait]
pub trait VersionedRecordStore<T: Versioned>: Send {
    /// Insert `record` as a new immutable row and return it as stored.
    ///
    /// The caller picks `version` (1, or latest + 1) and `version_id`; the
    /// store assigns `created_at`. A `version` that is not newer than the
    /// latest stored one fails with [`StoreError::VersionConflict`].
    async fn save(&mut self, record: T) -> Result<T, StoreError>;

    /// Row with the highest `version` for `logical_id`, if any.
    async fn find_latest_by_logical_id(&mut self, logical_id: Uuid)
        -> Result<Option<T>, StoreError>;

    /// Latest row of every logical id.
    async fn find_all_latest(&mut self) -> Result<Vec<T>, StoreError>;
}

#[async_trait]
pub trait StringStore: VersionedRecordStore<ThreadString> {
    /// Latest row of every string whose `thread_id` matches.
    async fn find_all_latest_by_thread_id(
        &mut self,
        thread_id: Uuid,
    ) -> Result<Vec<ThreadString>, StoreError>;
}

/// Everything the engine reads and writes.
pub trait ThreadStore: VersionedRecordStore<Thread> + StringStore {}

impl<S> ThreadStore for S where S: VersionedRecordStore<Thread> + StringStore {}

/// One unit of work. Dropping without `commit` discards every write.
#[async_trait]
pub trait Transaction: ThreadStore + Sized {
    async fn commit(self) -> Result<(), StoreError>;
    async fn rollback(self) -> Result<(), StoreError>;
}

/// Hands out transactions.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    type Tx: Transaction + 'static;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}
