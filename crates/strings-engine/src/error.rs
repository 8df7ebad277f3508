use std::fmt;
use strings_reconcile::{ErrorKind, ReconcileError};
use uuid::Uuid;

use crate::store::StoreError;

/// Everything an engine operation can fail with.
#[derive(Debug)]
pub enum EngineError {
    /// Validation or lifecycle conflict, detected before any write.
    Reconcile(ReconcileError),
    ThreadNotFound { thread_id: Uuid },
    StringNotFound { string_id: Uuid },
    /// A concurrent writer already produced this version.
    VersionConflict { logical_id: Uuid, version: i32 },
    /// Opaque store failure, propagated unchanged.
    Persistence(anyhow::Error),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Reconcile(e) => e.kind(),
            EngineError::ThreadNotFound { .. } | EngineError::StringNotFound { .. } => {
                ErrorKind::NotFound
            }
            EngineError::VersionConflict { .. } => ErrorKind::Conflict,
            EngineError::Persistence(_) => ErrorKind::Persistence,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Reconcile(e) => e.code(),
            EngineError::ThreadNotFound { .. } => "THREAD_NOT_FOUND",
            EngineError::StringNotFound { .. } => "STRING_NOT_FOUND",
            EngineError::VersionConflict { .. } => "VERSION_CONFLICT",
            EngineError::Persistence(_) => "PERSISTENCE",
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Reconcile(e) => write!(f, "{e}"),
            EngineError::ThreadNotFound { thread_id } => {
                write!(f, "thread {thread_id} not found")
            }
            EngineError::StringNotFound { string_id } => {
                write!(f, "string {string_id} not found")
            }
            EngineError::VersionConflict {
                logical_id,
                version,
            } => write!(
                f,
                "concurrent update: version {version} of {logical_id} already exists"
            ),
            EngineError::Persistence(e) => write!(f, "persistence error: {e:#}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Reconcile(e) => Some(e),
            EngineError::Persistence(e) => Some(&**e),
            _ => None,
        }
    }
}

impl From<ReconcileError> for EngineError {
    fn from(e: ReconcileError) -> Self {
        EngineError::Reconcile(e)
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::VersionConflict {
                logical_id,
                version,
            } => EngineError::VersionConflict {
                logical_id,
                version,
            },
            StoreError::Backend(e) => EngineError::Persistence(e),
        }
    }
}
