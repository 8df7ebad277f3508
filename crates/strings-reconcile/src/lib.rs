//! strings-reconcile
//!
//! Thread/string reconciliation primitives:
//! - explicit lifecycle state machine (`Active -> Archived <-> Active`, `-> Deleted` terminal)
//! - order validation and assignment for a thread's Default bucket
//! - content diff between a client snapshot and the server snapshot
//!
//! Deterministic, pure logic. No IO, no persistence. The engine crate
//! decides which versions to write from what this crate computes.

mod diff;
mod error;
mod lifecycle;
mod order_set;

pub use diff::{diff, strings_differ, thread_differs};
pub use error::{EntityKind, EntityRef, ErrorKind, ReconcileError};
pub use lifecycle::{ensure_unlocked, transition, EntityState, Lifecycle, Transition};
pub use order_set::StringOrderSet;
