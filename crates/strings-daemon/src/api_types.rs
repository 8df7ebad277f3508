//! Request and response types for strings-daemon HTTP endpoints.
//!
//! Thread and string bodies are the schema types themselves; only the
//! envelopes specific to this surface live here.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
    pub config_hash: Option<String>,
}

// ---------------------------------------------------------------------------
// GET /v1/threads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListThreadsQuery {
    #[serde(default)]
    pub only_ids: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadIdsResponse {
    pub thread_ids: Vec<Uuid>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every non-2xx response produced by an engine error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine-readable code, e.g. "ORDER_OUT_OF_RANGE".
    pub kind: String,
}
