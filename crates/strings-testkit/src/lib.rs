use anyhow::{Context, Result};
use std::fs;
use strings_engine::{MemoryRepository, StringsService};
use strings_schemas::{ClientString, ClientThread, Thread, ThreadString};
use uuid::Uuid;

/// A service over a fresh in-memory repository.
pub fn memory_service() -> StringsService<MemoryRepository> {
    StringsService::new(MemoryRepository::new())
}

/// New-thread payload from `(name, order)` pairs, in submission order.
pub fn thread_payload(name: &str, strings: &[(&str, i32)]) -> ClientThread {
    strings
        .iter()
        .fold(ClientThread::new(name), |t, (n, order)| {
            t.with_string(ClientString::new(*n, *order))
        })
}

/// The payload a client sends when it echoes `thread` back unchanged.
pub fn resubmit(thread: &Thread) -> ClientThread {
    ClientThread::from(thread)
}

pub fn load_client_thread_json(path: &str) -> Result<ClientThread> {
    let s = fs::read_to_string(path).with_context(|| format!("read thread payload: {path}"))?;
    let t: ClientThread = serde_json::from_str(&s).context("parse thread payload json")?;
    Ok(t)
}

pub fn find_string<'t>(thread: &'t Thread, name: &str) -> Result<&'t ThreadString> {
    thread
        .strings
        .iter()
        .find(|s| s.name == name)
        .with_context(|| format!("no string named {name:?} in thread {}", thread.thread_id))
}

pub fn string_id(thread: &Thread, name: &str) -> Result<Uuid> {
    find_string(thread, name).map(|s| s.string_id)
}

/// `(name, order)` of the Default bucket, in returned order.
pub fn default_orders(thread: &Thread) -> Vec<(String, i32)> {
    thread
        .strings
        .iter()
        .filter(|s| !s.archived && !s.deleted)
        .map(|s| (s.name.clone(), s.order))
        .collect()
}

/// Default-bucket orders read exactly `1..=N`.
pub fn is_contiguous(thread: &Thread) -> bool {
    default_orders(thread)
        .iter()
        .enumerate()
        .all(|(i, (_, order))| *order == i as i32 + 1)
}
