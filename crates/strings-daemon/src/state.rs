//! Shared runtime state for strings-daemon.
//!
//! Handlers receive `State<Arc<AppState<R>>>` from Axum. The repository type
//! is a parameter so tests can run the same router against the in-process
//! backend.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strings_engine::{Change, Repository, StringsService};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat {
        ts_millis: i64,
    },
    ThreadChanged {
        thread_id: Uuid,
        version: i32,
    },
    StringChanged {
        string_id: Uuid,
        thread_id: Uuid,
        version: i32,
    },
}

impl BusMsg {
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::ThreadChanged { .. } => "thread_changed",
            BusMsg::StringChanged { .. } => "string_changed",
        }
    }
}

impl From<Change> for BusMsg {
    fn from(c: Change) -> Self {
        match c {
            Change::Thread { thread_id, version } => BusMsg::ThreadChanged { thread_id, version },
            Change::String {
                string_id,
                thread_id,
                version,
            } => BusMsg::StringChanged {
                string_id,
                thread_id,
                version,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState<R: Repository> {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Static build metadata.
    pub build: BuildInfo,
    /// Transactional engine front door.
    pub service: StringsService<R>,
    /// Hash of the effective config, if one was loaded.
    pub config_hash: Option<String>,
}

impl<R: Repository> AppState<R> {
    pub fn new(repo: R) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        Self {
            bus,
            build: BuildInfo {
                service: "strings-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            service: StringsService::new(repo),
            config_hash: None,
        }
    }

    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Spawn a background task that republishes committed engine writes on the
/// SSE bus. Exits when the service is dropped.
pub fn spawn_change_forwarder<R: Repository>(state: Arc<AppState<R>>) {
    let mut rx = state.service.subscribe();
    let bus = state.bus.clone();
    drop(state);

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(change) => {
                    let _ = bus.send(BusMsg::from(change));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "change forwarder lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
