use std::collections::{BTreeMap, HashSet};

use strings_schemas::{ClientString, ThreadString, ORDER_UNASSIGNED};
use uuid::Uuid;

use crate::error::{EntityKind, ReconcileError};
use crate::lifecycle::{EntityState, Lifecycle};

/// A thread's latest strings partitioned by lifecycle bucket.
///
/// Only the Default bucket (neither archived nor deleted) carries a
/// meaningful order; after a successful [`StringOrderSet::reconcile`] its
/// orders are exactly `1..=N` in vector order.
///
/// Entries are owned values: an update replaces the entry inside its bucket
/// and nothing else aliases it.
#[derive(Debug, Clone, Default)]
pub struct StringOrderSet {
    default: Vec<ThreadString>,
    archived: Vec<ThreadString>,
    deleted: Vec<ThreadString>,
    /// Logical ids present when the set was built (the server snapshot).
    source_ids: HashSet<Uuid>,
}

impl StringOrderSet {
    /// Build from a server snapshot.
    pub fn new(strings: Vec<ThreadString>) -> Self {
        let mut set = Self::default();
        for s in &strings {
            set.source_ids.insert(s.string_id);
        }
        set.include(strings);
        set
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn default_bucket(&self) -> &[ThreadString] {
        &self.default
    }

    pub fn archived_bucket(&self) -> &[ThreadString] {
        &self.archived
    }

    pub fn deleted_bucket(&self) -> &[ThreadString] {
        &self.deleted
    }

    /// True if `string_id` was part of the snapshot the set was built from.
    pub fn is_source(&self, string_id: &Uuid) -> bool {
        self.source_ids.contains(string_id)
    }

    /// All entries: Default (in order), then Archived, then Deleted.
    pub fn into_strings(self) -> Vec<ThreadString> {
        let mut out = self.default;
        out.extend(self.archived);
        out.extend(self.deleted);
        out
    }

    /// Apply client content to the matching server strings.
    ///
    /// Returns the entries that changed, keyed by logical id. A change
    /// against a locked string fails the whole call with
    /// `StringCannotBeUpdated`; nothing in the set is touched in that case.
    pub fn diff_against(
        &mut self,
        client: &[ClientString],
    ) -> Result<BTreeMap<Uuid, ThreadString>, ReconcileError> {
        Self::validate_client(client)?;

        let mut changes: BTreeMap<Uuid, (String, i32)> = BTreeMap::new();
        for c in client {
            let Some(id) = c.string_id else { continue };
            let Some(server) = self.find(&id) else {
                continue;
            };
            if !server.content_differs(&c.name, c.order) {
                continue;
            }
            if server.locked() {
                return Err(ReconcileError::StringCannotBeUpdated { string_id: id });
            }
            changes.insert(id, (c.name.clone(), c.order));
        }

        let mut updated = BTreeMap::new();
        for entry in self.default.iter_mut() {
            if let Some((name, order)) = changes.remove(&entry.string_id) {
                entry.name = name;
                entry.order = order;
                updated.insert(entry.string_id, entry.clone());
            }
        }
        Ok(updated)
    }

    /// Client strings whose logical id is absent from the server snapshot,
    /// as version-1 drafts owned by `thread_id`. Strings without an id get a
    /// fresh one.
    pub fn new_strings(&self, thread_id: Uuid, client: &[ClientString]) -> Vec<ThreadString> {
        client
            .iter()
            .filter(|c| c.string_id.map_or(true, |id| !self.is_source(&id)))
            .map(|c| {
                let string_id = c.string_id.unwrap_or_else(Uuid::new_v4);
                ThreadString::first_version(thread_id, string_id, c.name.clone(), c.order)
            })
            .collect()
    }

    /// Merge more strings into their buckets (Deleted > Archived > Default).
    pub fn include(&mut self, strings: Vec<ThreadString>) {
        for s in strings {
            match s.state() {
                EntityState::Deleted => self.deleted.push(s),
                EntityState::Archived => self.archived.push(s),
                EntityState::Active => self.default.push(s),
            }
        }
    }

    /// Validate explicit orders in the Default bucket and assign the rest.
    ///
    /// - `order < 0` fails `InvalidOrder`
    /// - `order > N` (N = bucket size, unordered included) fails `OrderOutOfRange`
    /// - explicit orders sorted ascending must read `1..=k`, else `InvalidStringOrder`
    /// - `order == 0` entries are appended as `k+1, k+2, ...` in submission order
    pub fn reconcile(&mut self) -> Result<(), ReconcileError> {
        let max_range = self.default.len() as i32;

        let mut ordered: Vec<ThreadString> = Vec::with_capacity(self.default.len());
        let mut unordered: Vec<ThreadString> = Vec::new();

        for s in &self.default {
            if s.order < 0 {
                return Err(ReconcileError::InvalidOrder {
                    string_id: s.string_id,
                    order: s.order,
                });
            }
            if s.order == ORDER_UNASSIGNED {
                unordered.push(s.clone());
                continue;
            }
            if s.order > max_range {
                return Err(ReconcileError::OrderOutOfRange {
                    string_id: s.string_id,
                    order: s.order,
                    max_range,
                });
            }
            ordered.push(s.clone());
        }

        // Stable: equal orders keep submission order, and then fail below.
        ordered.sort_by_key(|s| s.order);

        for (index, s) in ordered.iter().enumerate() {
            let expected = index as i32 + 1;
            if s.order != expected {
                return Err(ReconcileError::InvalidStringOrder {
                    string_id: s.string_id,
                    order: s.order,
                    expected,
                });
            }
        }

        for mut s in unordered {
            s.order = ordered.len() as i32 + 1;
            ordered.push(s);
        }

        self.default = ordered;
        Ok(())
    }

    /// Reject unnamed strings and duplicate logical ids before anything is applied.
    pub fn validate_client(client: &[ClientString]) -> Result<(), ReconcileError> {
        let mut seen: HashSet<Uuid> = HashSet::with_capacity(client.len());
        for c in client {
            if c.name.is_empty() {
                return Err(ReconcileError::MissingName {
                    kind: EntityKind::String,
                });
            }
            if let Some(id) = c.string_id {
                if !seen.insert(id) {
                    return Err(ReconcileError::DuplicateStringId { string_id: id });
                }
            }
        }
        Ok(())
    }

    fn find(&self, id: &Uuid) -> Option<&ThreadString> {
        self.default
            .iter()
            .chain(self.archived.iter())
            .chain(self.deleted.iter())
            .find(|s| &s.string_id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Transition;

    fn server(thread_id: Uuid, name: &str, order: i32) -> ThreadString {
        ThreadString::first_version(thread_id, Uuid::new_v4(), name, order)
    }

    fn orders(set: &StringOrderSet) -> Vec<i32> {
        set.default_bucket().iter().map(|s| s.order).collect()
    }

    #[test]
    fn unordered_strings_are_appended_in_submission_order() {
        let t = Uuid::new_v4();
        let mut set = StringOrderSet::new(vec![server(t, "x", 1)]);
        let fresh = set.new_strings(t, &[ClientString::new("a", 0), ClientString::new("b", 0)]);
        set.include(fresh);
        set.reconcile().unwrap();

        let names: Vec<&str> = set.default_bucket().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["x", "a", "b"]);
        assert_eq!(orders(&set), [1, 2, 3]);
    }

    #[test]
    fn gap_in_explicit_orders_is_rejected() {
        let t = Uuid::new_v4();
        let mut set = StringOrderSet::new(vec![server(t, "a", 1), server(t, "b", 3), server(t, "c", 0)]);
        let err = set.reconcile().unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidStringOrder { order: 3, expected: 2, .. }));
    }

    #[test]
    fn archived_and_deleted_strings_never_enter_default_bucket() {
        let t = Uuid::new_v4();
        let mut archived = server(t, "arch", -1);
        archived.apply(Transition::Archive).unwrap();
        let mut deleted = server(t, "del", -1);
        deleted.apply(Transition::Archive).unwrap();
        deleted.apply(Transition::Delete).unwrap();

        let mut set = StringOrderSet::new(vec![server(t, "a", 1), archived, deleted]);
        set.reconcile().unwrap();

        assert_eq!(set.default_bucket().len(), 1);
        assert_eq!(set.archived_bucket()[0].name, "arch");
        assert_eq!(set.deleted_bucket()[0].name, "del");
    }

    #[test]
    fn failed_diff_leaves_set_untouched() {
        let t = Uuid::new_v4();
        let a = server(t, "a", 1);
        let mut b = server(t, "b", -1);
        b.apply(Transition::Archive).unwrap();

        let mut set = StringOrderSet::new(vec![a.clone(), b.clone()]);
        let err = set
            .diff_against(&[
                ClientString::existing(a.string_id, "a2", 1),
                ClientString::existing(b.string_id, "b2", -1),
            ])
            .unwrap_err();

        assert_eq!(err, ReconcileError::StringCannotBeUpdated { string_id: b.string_id });
        assert_eq!(set.default_bucket()[0].name, "a");
    }
}
