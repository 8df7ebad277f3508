//! strings-schemas
//!
//! Version rows and client payloads shared by every crate in the workspace.
//!
//! A version row (`Thread`, `ThreadString`) is an immutable snapshot of one
//! logical entity at one `version`. Client payloads (`ClientThread`,
//! `ClientString`) carry only what a caller is allowed to submit; everything
//! else is server-managed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order carried by archived and deleted strings.
pub const ORDER_SENTINEL: i32 = -1;

/// Order value meaning "place me after the explicitly ordered strings".
pub const ORDER_UNASSIGNED: i32 = 0;

// ---------------------------------------------------------------------------
// Thread
// ---------------------------------------------------------------------------

/// One version row of a thread, plus the strings currently attached to it.
///
/// `strings` is not part of the row; it is reconstructed from the latest
/// string versions whose `thread_id` matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub version_id: Uuid,
    pub thread_id: Uuid,
    pub version: i32,
    pub name: String,
    pub archived: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub strings: Vec<ThreadString>,
}

impl Thread {
    /// Version 1 of a brand-new logical thread.
    pub fn first_version(thread_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            version_id: Uuid::new_v4(),
            thread_id,
            version: 1,
            name: name.into(),
            archived: false,
            deleted: false,
            created_at: Utc::now(),
            strings: Vec::new(),
        }
    }

    /// Draft of the next version row: every field copied forward, a fresh
    /// `version_id`, `version + 1`, and no strings attached.
    pub fn next_version(&self) -> Self {
        Self {
            version_id: Uuid::new_v4(),
            version: self.version + 1,
            created_at: Utc::now(),
            strings: Vec::new(),
            ..self.clone()
        }
    }

    /// The row without its attached strings.
    pub fn row(&self) -> Self {
        Self {
            strings: Vec::new(),
            ..self.clone()
        }
    }

    pub fn with_strings(mut self, strings: Vec<ThreadString>) -> Self {
        self.strings = strings;
        self
    }
}

// ---------------------------------------------------------------------------
// ThreadString
// ---------------------------------------------------------------------------

/// One version row of a string owned by a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadString {
    pub version_id: Uuid,
    pub string_id: Uuid,
    /// Logical id of the owning thread. Immutable after creation.
    pub thread_id: Uuid,
    pub version: i32,
    pub name: String,
    /// 1-based position among the thread's non-archived, non-deleted strings.
    pub order: i32,
    pub active: bool,
    pub archived: bool,
    pub deleted: bool,
    pub private: bool,
    pub created_at: DateTime<Utc>,
}

impl ThreadString {
    /// Version 1 of a brand-new logical string. Lifecycle and toggle flags
    /// always start cleared, whatever the client submitted.
    pub fn first_version(
        thread_id: Uuid,
        string_id: Uuid,
        name: impl Into<String>,
        order: i32,
    ) -> Self {
        Self {
            version_id: Uuid::new_v4(),
            string_id,
            thread_id,
            version: 1,
            name: name.into(),
            order,
            active: false,
            archived: false,
            deleted: false,
            private: false,
            created_at: Utc::now(),
        }
    }

    /// Draft of the next version row with every field copied forward.
    pub fn next_version(&self) -> Self {
        Self {
            version_id: Uuid::new_v4(),
            version: self.version + 1,
            created_at: Utc::now(),
            ..self.clone()
        }
    }

    /// True when `name` or `order` differ. Audit fields, flags and ids are ignored.
    pub fn content_differs(&self, name: &str, order: i32) -> bool {
        self.name != name || self.order != order
    }
}

// ---------------------------------------------------------------------------
// Client payloads
// ---------------------------------------------------------------------------

/// A thread snapshot as submitted by a client.
///
/// `thread_id == None` asks for a new thread. An empty `name` on an existing
/// thread keeps the server's name. Unknown fields (a client echoing back
/// `version`, `archived`, ...) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientThread {
    #[serde(default)]
    pub thread_id: Option<Uuid>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub strings: Vec<ClientString>,
}

/// A string as submitted by a client. `order == 0` means "unordered".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientString {
    #[serde(default)]
    pub string_id: Option<Uuid>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub order: i32,
}

impl ClientThread {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            thread_id: None,
            name: name.into(),
            strings: Vec::new(),
        }
    }

    pub fn with_string(mut self, s: ClientString) -> Self {
        self.strings.push(s);
        self
    }
}

impl ClientString {
    /// A new string with no id yet.
    pub fn new(name: impl Into<String>, order: i32) -> Self {
        Self {
            string_id: None,
            name: name.into(),
            order,
        }
    }

    /// A reference to an existing string.
    pub fn existing(string_id: Uuid, name: impl Into<String>, order: i32) -> Self {
        Self {
            string_id: Some(string_id),
            name: name.into(),
            order,
        }
    }
}

/// What a client gets when it echoes a server thread back unchanged.
impl From<&Thread> for ClientThread {
    fn from(t: &Thread) -> Self {
        Self {
            thread_id: Some(t.thread_id),
            name: t.name.clone(),
            strings: t.strings.iter().map(ClientString::from).collect(),
        }
    }
}

impl From<&ThreadString> for ClientString {
    fn from(s: &ThreadString) -> Self {
        Self::existing(s.string_id, s.name.clone(), s.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_version_copies_fields_and_bumps_version() {
        let t = Thread::first_version(Uuid::new_v4(), "T1");
        let n = t.next_version();
        assert_eq!(n.thread_id, t.thread_id);
        assert_eq!(n.name, "T1");
        assert_eq!(n.version, 2);
        assert_ne!(n.version_id, t.version_id);
    }

    #[test]
    fn client_payload_ignores_server_managed_fields() {
        let id = Uuid::new_v4();
        let raw = format!(
            r#"{{"thread_id":"{id}","name":"T","version":7,"archived":true,
                "strings":[{{"name":"a","order":0,"deleted":true}}]}}"#
        );
        let c: ClientThread = serde_json::from_str(&raw).unwrap();
        assert_eq!(c.thread_id, Some(id));
        assert_eq!(c.strings, vec![ClientString::new("a", 0)]);
    }

    #[test]
    fn missing_fields_default_to_new_unordered() {
        let c: ClientThread = serde_json::from_str(r#"{"strings":[{"name":"x"}]}"#).unwrap();
        assert_eq!(c.thread_id, None);
        assert!(c.name.is_empty());
        assert_eq!(c.strings[0].order, ORDER_UNASSIGNED);
        assert_eq!(c.strings[0].string_id, None);
    }
}
