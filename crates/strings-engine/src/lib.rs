//! strings-engine
//!
//! The reconciliation engine and the persistence contract it runs against.
//!
//! - [`store`]: append-only `VersionedRecordStore<T>` plus the transaction
//!   and repository seams a persistence backend implements.
//! - [`ReconciliationEngine`]: `post_thread`, listing, and the per-entity
//!   lifecycle / flag operations, all inside one caller-owned transaction.
//! - [`StringsService`]: begin, run, commit or roll back. What the daemon and
//!   CLI call.
//! - [`MemoryRepository`]: in-process backend used by tests and by the
//!   daemon when no database is configured.

mod engine;
mod error;
mod memory;
mod service;
pub mod store;

pub use engine::{Change, ReconciliationEngine};
pub use error::EngineError;
pub use memory::{MemoryRepository, MemoryTx};
pub use service::StringsService;
pub use store::{
    Repository, StoreError, StringStore, ThreadStore, Transaction, Versioned,
    VersionedRecordStore,
};
