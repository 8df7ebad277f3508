use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Entity references
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Thread,
    String,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Thread => "thread",
            EntityKind::String => "string",
        }
    }
}

/// Which logical entity an error is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl EntityRef {
    pub fn thread(id: Uuid) -> Self {
        Self {
            kind: EntityKind::Thread,
            id,
        }
    }

    pub fn string(id: Uuid) -> Self {
        Self {
            kind: EntityKind::String,
            id,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.as_str(), self.id)
    }
}

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Coarse classification the transport layer maps onto response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller-supplied data is malformed. Never retried.
    Validation,
    /// The requested transition is illegal in the current lifecycle state.
    Conflict,
    /// The referenced logical id has no version history.
    NotFound,
    /// Opaque store failure.
    Persistence,
}

// ---------------------------------------------------------------------------
// ReconcileError
// ---------------------------------------------------------------------------

/// Locally-detected validation and conflict failures.
///
/// None of these are retried; any of them aborts the whole reconciliation
/// before a single version row is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// A thread (or new string) was submitted without a name.
    MissingName { kind: EntityKind },
    /// An explicit order below zero.
    InvalidOrder { string_id: Uuid, order: i32 },
    /// An explicit order beyond the size of the Default bucket.
    OrderOutOfRange {
        string_id: Uuid,
        order: i32,
        max_range: i32,
    },
    /// Explicit orders do not form `1..k` (gap or duplicate).
    InvalidStringOrder {
        string_id: Uuid,
        order: i32,
        expected: i32,
    },
    /// The same logical string id appears twice in one client snapshot.
    DuplicateStringId { string_id: Uuid },

    AlreadyArchived { entity: EntityRef },
    AlreadyRestored { entity: EntityRef },
    AlreadyDeleted { entity: EntityRef },
    ThreadCannotBeUpdated { thread_id: Uuid },
    StringCannotBeUpdated { string_id: Uuid },

    AlreadyActive { string_id: Uuid },
    AlreadyInactive { string_id: Uuid },
    AlreadyPrivate { string_id: Uuid },
    AlreadyPublic { string_id: Uuid },
}

impl ReconcileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconcileError::MissingName { .. }
            | ReconcileError::InvalidOrder { .. }
            | ReconcileError::OrderOutOfRange { .. }
            | ReconcileError::InvalidStringOrder { .. }
            | ReconcileError::DuplicateStringId { .. } => ErrorKind::Validation,
            _ => ErrorKind::Conflict,
        }
    }

    /// Stable machine-readable code, e.g. `ORDER_OUT_OF_RANGE`.
    pub fn code(&self) -> &'static str {
        match self {
            ReconcileError::MissingName { .. } => "MISSING_NAME",
            ReconcileError::InvalidOrder { .. } => "INVALID_ORDER",
            ReconcileError::OrderOutOfRange { .. } => "ORDER_OUT_OF_RANGE",
            ReconcileError::InvalidStringOrder { .. } => "INVALID_STRING_ORDER",
            ReconcileError::DuplicateStringId { .. } => "DUPLICATE_STRING_ID",
            ReconcileError::AlreadyArchived { .. } => "ALREADY_ARCHIVED",
            ReconcileError::AlreadyRestored { .. } => "ALREADY_RESTORED",
            ReconcileError::AlreadyDeleted { .. } => "ALREADY_DELETED",
            ReconcileError::ThreadCannotBeUpdated { .. } => "THREAD_CANNOT_BE_UPDATED",
            ReconcileError::StringCannotBeUpdated { .. } => "STRING_CANNOT_BE_UPDATED",
            ReconcileError::AlreadyActive { .. } => "ALREADY_ACTIVE",
            ReconcileError::AlreadyInactive { .. } => "ALREADY_INACTIVE",
            ReconcileError::AlreadyPrivate { .. } => "ALREADY_PRIVATE",
            ReconcileError::AlreadyPublic { .. } => "ALREADY_PUBLIC",
        }
    }
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::MissingName { kind } => {
                write!(f, "{} is missing `name`", kind.as_str())
            }
            ReconcileError::InvalidOrder { string_id, order } => {
                write!(f, "string ({string_id}) order {order} is less than 0")
            }
            ReconcileError::OrderOutOfRange {
                string_id,
                order,
                max_range,
            } => write!(
                f,
                "string ({string_id}) order {order} is greater than max range {max_range}"
            ),
            ReconcileError::InvalidStringOrder {
                string_id,
                order,
                expected,
            } => write!(
                f,
                "invalid string order: string ({string_id}) has order {order}, expected {expected}"
            ),
            ReconcileError::DuplicateStringId { string_id } => {
                write!(f, "duplicate client string provided for string id {string_id}")
            }
            ReconcileError::AlreadyArchived { entity } => write!(f, "{entity} already archived"),
            ReconcileError::AlreadyRestored { entity } => write!(f, "{entity} already restored"),
            ReconcileError::AlreadyDeleted { entity } => write!(f, "{entity} already deleted"),
            ReconcileError::ThreadCannotBeUpdated { thread_id } => write!(
                f,
                "deleted or archived threads cannot be updated (thread {thread_id})"
            ),
            ReconcileError::StringCannotBeUpdated { string_id } => write!(
                f,
                "deleted or archived strings cannot be updated (string {string_id})"
            ),
            ReconcileError::AlreadyActive { string_id } => {
                write!(f, "string {string_id} already active")
            }
            ReconcileError::AlreadyInactive { string_id } => {
                write!(f, "string {string_id} already inactive")
            }
            ReconcileError::AlreadyPrivate { string_id } => {
                write!(f, "string {string_id} already private")
            }
            ReconcileError::AlreadyPublic { string_id } => {
                write!(f, "string {string_id} already public")
            }
        }
    }
}

impl std::error::Error for ReconcileError {}
