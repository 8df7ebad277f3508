use std::collections::{HashMap, HashSet};

use serde::Serialize;
use strings_reconcile::{
    diff, ensure_unlocked, EntityKind, EntityState, Lifecycle, ReconcileError, StringOrderSet,
    Transition,
};
use strings_schemas::{ClientThread, Thread, ThreadString, ORDER_SENTINEL};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::EngineError;
use crate::store::{StringStore, ThreadStore, VersionedRecordStore};

/// A version row written by the engine. Published after commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Change {
    Thread {
        thread_id: Uuid,
        version: i32,
    },
    String {
        string_id: Uuid,
        thread_id: Uuid,
        version: i32,
    },
}

#[derive(Debug, Clone, Copy)]
enum StringFlag {
    Active,
    Private,
}

/// Reconciles client snapshots against the latest server snapshot and issues
/// new version rows.
///
/// The engine never begins, commits or rolls back: every read and write goes
/// through `store`, which the caller scopes to a single transaction. Any
/// error leaves the caller to roll back, so a failed operation never exposes
/// a partial set of versions.
pub struct ReconciliationEngine<'s, S: ThreadStore> {
    store: &'s mut S,
    changes: Vec<Change>,
}

impl<'s, S: ThreadStore> ReconciliationEngine<'s, S> {
    pub fn new(store: &'s mut S) -> Self {
        Self {
            store,
            changes: Vec::new(),
        }
    }

    /// Rows written so far, in write order.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn into_changes(self) -> Vec<Change> {
        self.changes
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// Create the thread, or reconcile it against the latest server snapshot.
    pub async fn post_thread(&mut self, client: ClientThread) -> Result<Thread, EngineError> {
        let Some(thread_id) = client.thread_id else {
            return self.create_new_thread(client).await;
        };
        match self.load_thread(thread_id).await? {
            Some(server) => self.update_thread_if_needed(client, server).await,
            None => self.create_new_thread(client).await,
        }
    }

    /// Persist version 1 of a thread and of each of its strings.
    ///
    /// A client-supplied `thread_id` is kept; otherwise a fresh one is minted.
    pub async fn create_new_thread(&mut self, client: ClientThread) -> Result<Thread, EngineError> {
        validate_name(&client.name)?;
        StringOrderSet::validate_client(&client.strings)?;

        let thread_id = client.thread_id.unwrap_or_else(Uuid::new_v4);

        let mut set = StringOrderSet::empty();
        let fresh = set.new_strings(thread_id, &client.strings);
        set.include(fresh);
        set.reconcile()?;

        let saved = self
            .save_thread(Thread::first_version(thread_id, client.name))
            .await?;

        let mut strings = Vec::new();
        for s in set.into_strings() {
            strings.push(self.save_string(s).await?);
        }

        info!(thread_id = %thread_id, strings = strings.len(), "created thread");
        Ok(saved.with_strings(strings))
    }

    /// Write new versions only for what actually changed.
    ///
    /// An unchanged resubmission returns `server` as-is and writes nothing.
    pub async fn update_thread_if_needed(
        &mut self,
        mut client: ClientThread,
        server: Thread,
    ) -> Result<Thread, EngineError> {
        if client.name.is_empty() {
            client.name = server.name.clone();
        }

        if !diff(&server, &client) {
            debug!(
                thread_id = %server.thread_id,
                version = server.version,
                "no changes; skipping write"
            );
            return Ok(server);
        }

        ensure_unlocked(server.entity(), server.state())?;

        let mut draft = server.next_version();
        draft.name = client.name;
        validate_name(&draft.name)?;

        let mut set = StringOrderSet::new(server.strings.clone());
        let updated = set.diff_against(&client.strings)?;
        let fresh = set.new_strings(server.thread_id, &client.strings);
        let fresh_ids: HashSet<Uuid> = fresh.iter().map(|s| s.string_id).collect();
        set.include(fresh);
        set.reconcile()?;

        // Everything is validated; from here on only store errors can fail.
        // Writes compare the reconciled entry with the server row, not
        // `updated`: a string sent with order 0 can be handed its old slot
        // back by `reconcile`, leaving nothing to version.
        let originals: HashMap<Uuid, &ThreadString> =
            server.strings.iter().map(|s| (s.string_id, s)).collect();

        let mut strings = Vec::with_capacity(server.strings.len() + fresh_ids.len());
        for s in set.default_bucket().to_vec() {
            let current = if fresh_ids.contains(&s.string_id) {
                self.save_string(s).await?
            } else {
                match originals.get(&s.string_id) {
                    Some(original) if original.content_differs(&s.name, s.order) => {
                        self.save_string(s.next_version()).await?
                    }
                    _ => s,
                }
            };
            strings.push(current);
        }
        strings.extend(set.archived_bucket().iter().cloned());
        strings.extend(set.deleted_bucket().iter().cloned());

        let saved = self.save_thread(draft).await?;

        info!(
            thread_id = %saved.thread_id,
            version = saved.version,
            updated = updated.len(),
            created = fresh_ids.len(),
            "reconciled thread"
        );
        Ok(saved.with_strings(strings))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Latest version of every thread with its latest strings.
    pub async fn get_threads(&mut self) -> Result<Vec<Thread>, EngineError> {
        let rows = VersionedRecordStore::<Thread>::find_all_latest(&mut *self.store).await?;
        let mut threads = Vec::with_capacity(rows.len());
        for row in rows {
            let strings = self.load_strings(row.thread_id).await?;
            threads.push(row.with_strings(strings));
        }
        Ok(threads)
    }

    pub async fn get_thread_ids(&mut self) -> Result<Vec<Uuid>, EngineError> {
        let rows = VersionedRecordStore::<Thread>::find_all_latest(&mut *self.store).await?;
        Ok(rows.into_iter().map(|t| t.thread_id).collect())
    }

    pub async fn get_thread_by_id(&mut self, thread_id: Uuid) -> Result<Thread, EngineError> {
        self.load_thread(thread_id)
            .await?
            .ok_or(EngineError::ThreadNotFound { thread_id })
    }

    // -----------------------------------------------------------------------
    // Thread lifecycle
    // -----------------------------------------------------------------------

    pub async fn archive_thread(&mut self, thread_id: Uuid) -> Result<Thread, EngineError> {
        self.transition_thread(thread_id, Transition::Archive).await
    }

    pub async fn restore_thread(&mut self, thread_id: Uuid) -> Result<Thread, EngineError> {
        self.transition_thread(thread_id, Transition::Restore).await
    }

    /// Strings are left as they are.
    pub async fn delete_thread(&mut self, thread_id: Uuid) -> Result<Thread, EngineError> {
        self.transition_thread(thread_id, Transition::Delete).await
    }

    async fn transition_thread(
        &mut self,
        thread_id: Uuid,
        t: Transition,
    ) -> Result<Thread, EngineError> {
        let latest = self
            .latest_thread(thread_id)
            .await?
            .ok_or(EngineError::ThreadNotFound { thread_id })?;

        let mut draft = latest.next_version();
        let state = draft.apply(t)?;
        let saved = self.save_thread(draft).await?;

        info!(thread_id = %thread_id, version = saved.version, ?state, "thread transition");
        let strings = self.load_strings(thread_id).await?;
        Ok(saved.with_strings(strings))
    }

    // -----------------------------------------------------------------------
    // String lifecycle
    // -----------------------------------------------------------------------

    /// Moves the string out of the Default bucket and closes the gap.
    pub async fn archive_string(&mut self, string_id: Uuid) -> Result<ThreadString, EngineError> {
        self.transition_string(string_id, Transition::Archive).await
    }

    /// Appends the string to the end of the Default bucket.
    pub async fn restore_string(&mut self, string_id: Uuid) -> Result<ThreadString, EngineError> {
        self.transition_string(string_id, Transition::Restore).await
    }

    pub async fn delete_string(&mut self, string_id: Uuid) -> Result<ThreadString, EngineError> {
        self.transition_string(string_id, Transition::Delete).await
    }

    async fn transition_string(
        &mut self,
        string_id: Uuid,
        t: Transition,
    ) -> Result<ThreadString, EngineError> {
        let latest = self
            .latest_string(string_id)
            .await?
            .ok_or(EngineError::StringNotFound { string_id })?;

        let from = latest.state();
        let mut draft = latest.next_version();
        let to = draft.apply(t)?;

        let mut siblings: Vec<ThreadString> =
            StringStore::find_all_latest_by_thread_id(&mut *self.store, latest.thread_id)
                .await?
                .into_iter()
                .filter(|s| s.string_id != string_id && s.state() == EntityState::Active)
                .collect();
        siblings.sort_by_key(|s| s.order);

        match (from, to) {
            (EntityState::Active, EntityState::Archived | EntityState::Deleted) => {
                draft.order = ORDER_SENTINEL;
                for sibling in siblings {
                    if sibling.order <= latest.order {
                        continue;
                    }
                    let mut next = sibling.next_version();
                    next.order -= 1;
                    self.save_string(next).await?;
                }
            }
            (_, EntityState::Active) => {
                draft.order = siblings.len() as i32 + 1;
            }
            _ => {
                draft.order = ORDER_SENTINEL;
            }
        }

        let saved = self.save_string(draft).await?;
        info!(
            string_id = %string_id,
            thread_id = %saved.thread_id,
            version = saved.version,
            state = ?to,
            "string transition"
        );
        Ok(saved)
    }

    // -----------------------------------------------------------------------
    // String flags
    // -----------------------------------------------------------------------

    pub async fn activate_string(&mut self, string_id: Uuid) -> Result<ThreadString, EngineError> {
        self.set_flag(string_id, StringFlag::Active, true).await
    }

    pub async fn deactivate_string(
        &mut self,
        string_id: Uuid,
    ) -> Result<ThreadString, EngineError> {
        self.set_flag(string_id, StringFlag::Active, false).await
    }

    pub async fn make_private(&mut self, string_id: Uuid) -> Result<ThreadString, EngineError> {
        self.set_flag(string_id, StringFlag::Private, true).await
    }

    pub async fn make_public(&mut self, string_id: Uuid) -> Result<ThreadString, EngineError> {
        self.set_flag(string_id, StringFlag::Private, false).await
    }

    async fn set_flag(
        &mut self,
        string_id: Uuid,
        flag: StringFlag,
        value: bool,
    ) -> Result<ThreadString, EngineError> {
        let latest = self
            .latest_string(string_id)
            .await?
            .ok_or(EngineError::StringNotFound { string_id })?;

        ensure_unlocked(latest.entity(), latest.state())?;

        let current = match flag {
            StringFlag::Active => latest.active,
            StringFlag::Private => latest.private,
        };
        if current == value {
            let err = match (flag, value) {
                (StringFlag::Active, true) => ReconcileError::AlreadyActive { string_id },
                (StringFlag::Active, false) => ReconcileError::AlreadyInactive { string_id },
                (StringFlag::Private, true) => ReconcileError::AlreadyPrivate { string_id },
                (StringFlag::Private, false) => ReconcileError::AlreadyPublic { string_id },
            };
            return Err(err.into());
        }

        let mut draft = latest.next_version();
        match flag {
            StringFlag::Active => draft.active = value,
            StringFlag::Private => draft.private = value,
        }
        self.save_string(draft).await
    }

    // -----------------------------------------------------------------------
    // Store helpers
    // -----------------------------------------------------------------------

    async fn load_thread(&mut self, thread_id: Uuid) -> Result<Option<Thread>, EngineError> {
        let Some(row) = self.latest_thread(thread_id).await? else {
            return Ok(None);
        };
        let strings = self.load_strings(thread_id).await?;
        Ok(Some(row.with_strings(strings)))
    }

    async fn load_strings(&mut self, thread_id: Uuid) -> Result<Vec<ThreadString>, EngineError> {
        let strings = StringStore::find_all_latest_by_thread_id(&mut *self.store, thread_id).await?;
        Ok(arrange(strings))
    }

    async fn latest_thread(&mut self, thread_id: Uuid) -> Result<Option<Thread>, EngineError> {
        Ok(
            VersionedRecordStore::<Thread>::find_latest_by_logical_id(&mut *self.store, thread_id)
                .await?,
        )
    }

    async fn latest_string(&mut self, string_id: Uuid) -> Result<Option<ThreadString>, EngineError> {
        Ok(VersionedRecordStore::<ThreadString>::find_latest_by_logical_id(
            &mut *self.store,
            string_id,
        )
        .await?)
    }

    async fn save_thread(&mut self, draft: Thread) -> Result<Thread, EngineError> {
        let saved = VersionedRecordStore::<Thread>::save(&mut *self.store, draft.row()).await?;
        debug!(thread_id = %saved.thread_id, version = saved.version, "persisted thread version");
        self.changes.push(Change::Thread {
            thread_id: saved.thread_id,
            version: saved.version,
        });
        Ok(saved)
    }

    async fn save_string(&mut self, draft: ThreadString) -> Result<ThreadString, EngineError> {
        let saved = VersionedRecordStore::<ThreadString>::save(&mut *self.store, draft).await?;
        debug!(
            string_id = %saved.string_id,
            thread_id = %saved.thread_id,
            version = saved.version,
            order = saved.order,
            "persisted string version"
        );
        self.changes.push(Change::String {
            string_id: saved.string_id,
            thread_id: saved.thread_id,
            version: saved.version,
        });
        Ok(saved)
    }
}

fn validate_name(name: &str) -> Result<(), ReconcileError> {
    if name.is_empty() {
        return Err(ReconcileError::MissingName {
            kind: EntityKind::Thread,
        });
    }
    Ok(())
}

/// Default bucket by order, then Archived, then Deleted.
fn arrange(mut strings: Vec<ThreadString>) -> Vec<ThreadString> {
    strings.sort_by_key(|s| match s.state() {
        EntityState::Active => (0, s.order),
        EntityState::Archived => (1, 0),
        EntityState::Deleted => (2, 0),
    });
    strings
}
