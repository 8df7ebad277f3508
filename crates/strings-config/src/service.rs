use anyhow::{bail, Result};
use serde_json::Value;

pub const ENV_DAEMON_ADDR: &str = "STRINGS_DAEMON_ADDR";
pub const DEFAULT_DAEMON_ADDR: &str = "127.0.0.1:8080";

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_LOG_FILTER: &str = "info";

/// Typed view of the keys the daemon and CLI read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub daemon_addr: String,
    pub db_max_connections: u32,
    pub db_run_migrations: bool,
    pub log_filter: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            daemon_addr: DEFAULT_DAEMON_ADDR.to_string(),
            db_max_connections: DEFAULT_MAX_CONNECTIONS,
            db_run_migrations: true,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Missing keys fall back to defaults; present keys of the wrong type fail.
    pub fn from_json(v: &Value) -> Result<Self> {
        let d = Self::default();

        let daemon_addr = match v.pointer("/daemon/addr") {
            None | Some(Value::Null) => d.daemon_addr,
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(other) => bail!("CONFIG_INVALID /daemon/addr: expected non-empty string, got {other}"),
        };

        let db_max_connections = match v.pointer("/db/max_connections") {
            None | Some(Value::Null) => d.db_max_connections,
            Some(n) => match n.as_u64().and_then(|n| u32::try_from(n).ok()) {
                Some(n) if n > 0 => n,
                _ => bail!("CONFIG_INVALID /db/max_connections: expected positive integer, got {n}"),
            },
        };

        let db_run_migrations = match v.pointer("/db/run_migrations") {
            None | Some(Value::Null) => d.db_run_migrations,
            Some(Value::Bool(b)) => *b,
            Some(other) => bail!("CONFIG_INVALID /db/run_migrations: expected bool, got {other}"),
        };

        let log_filter = match v.pointer("/log/filter") {
            None | Some(Value::Null) => d.log_filter,
            Some(Value::String(s)) => s.clone(),
            Some(other) => bail!("CONFIG_INVALID /log/filter: expected string, got {other}"),
        };

        Ok(Self {
            daemon_addr,
            db_max_connections,
            db_run_migrations,
            log_filter,
        })
    }

    /// `STRINGS_DAEMON_ADDR` wins over the file value when set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(addr) = std::env::var(ENV_DAEMON_ADDR) {
            if !addr.trim().is_empty() {
                self.daemon_addr = addr.trim().to_string();
            }
        }
        self
    }
}
