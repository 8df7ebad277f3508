//! Lifecycle state machine shared by threads and strings.
//!
//! ```text
//!            archive              delete
//!   Active ──────────► Archived ─────────► Deleted (terminal)
//!     ▲  ◄──────────────┘                    ▲
//!     │      restore                         │
//!     └──────────────────────────────────────┘
//!                    delete
//! ```
//!
//! The rows only carry `archived` / `deleted` booleans; [`EntityState`] is the
//! derived view and every transition is checked here, never at call sites.

use serde::{Deserialize, Serialize};
use strings_schemas::{Thread, ThreadString};

use crate::error::{EntityKind, EntityRef, ReconcileError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    Active,
    Archived,
    /// **Terminal.**
    Deleted,
}

impl EntityState {
    /// Deleted takes precedence over archived.
    pub fn from_flags(archived: bool, deleted: bool) -> Self {
        if deleted {
            EntityState::Deleted
        } else if archived {
            EntityState::Archived
        } else {
            EntityState::Active
        }
    }

    /// Locked entities reject name / order / content edits.
    pub fn is_locked(&self) -> bool {
        !matches!(self, EntityState::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EntityState::Deleted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Archive,
    Restore,
    Delete,
}

/// Apply `t` to an entity currently in `from`.
pub fn transition(
    entity: EntityRef,
    from: EntityState,
    t: Transition,
) -> Result<EntityState, ReconcileError> {
    use EntityState::*;

    match (from, t) {
        (Deleted, _) => Err(ReconcileError::AlreadyDeleted { entity }),
        (Active, Transition::Archive) => Ok(Archived),
        (Archived, Transition::Archive) => Err(ReconcileError::AlreadyArchived { entity }),
        (Archived, Transition::Restore) => Ok(Active),
        (Active, Transition::Restore) => Err(ReconcileError::AlreadyRestored { entity }),
        (Active | Archived, Transition::Delete) => Ok(Deleted),
    }
}

/// Gate for content mutation: fails with the kind-specific `*CannotBeUpdated`.
pub fn ensure_unlocked(entity: EntityRef, state: EntityState) -> Result<(), ReconcileError> {
    if !state.is_locked() {
        return Ok(());
    }
    Err(match entity.kind {
        EntityKind::Thread => ReconcileError::ThreadCannotBeUpdated {
            thread_id: entity.id,
        },
        EntityKind::String => ReconcileError::StringCannotBeUpdated {
            string_id: entity.id,
        },
    })
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Read / write the lifecycle flags of a version row.
pub trait Lifecycle {
    fn entity(&self) -> EntityRef;
    fn flags(&self) -> (bool, bool);
    fn set_flags(&mut self, archived: bool, deleted: bool);

    fn state(&self) -> EntityState {
        let (archived, deleted) = self.flags();
        EntityState::from_flags(archived, deleted)
    }

    fn locked(&self) -> bool {
        self.state().is_locked()
    }

    /// Write `state` back into the flags. Deleting leaves `archived` as it was.
    fn set_state(&mut self, state: EntityState) {
        let (archived, _) = self.flags();
        match state {
            EntityState::Active => self.set_flags(false, false),
            EntityState::Archived => self.set_flags(true, false),
            EntityState::Deleted => self.set_flags(archived, true),
        }
    }

    /// Checked transition applied in place; returns the new state.
    fn apply(&mut self, t: Transition) -> Result<EntityState, ReconcileError> {
        let next = transition(self.entity(), self.state(), t)?;
        self.set_state(next);
        Ok(next)
    }
}

impl Lifecycle for Thread {
    fn entity(&self) -> EntityRef {
        EntityRef::thread(self.thread_id)
    }

    fn flags(&self) -> (bool, bool) {
        (self.archived, self.deleted)
    }

    fn set_flags(&mut self, archived: bool, deleted: bool) {
        self.archived = archived;
        self.deleted = deleted;
    }
}

impl Lifecycle for ThreadString {
    fn entity(&self) -> EntityRef {
        EntityRef::string(self.string_id)
    }

    fn flags(&self) -> (bool, bool) {
        (self.archived, self.deleted)
    }

    fn set_flags(&mut self, archived: bool, deleted: bool) {
        self.archived = archived;
        self.deleted = deleted;
    }
}
