//! Durable storage capability for learned state
//!
//! Payloads are keyed by agent identity and data kind. Loading is tolerant:
//! absent or corrupted payloads come back as the empty default so an agent
//! always starts, possibly with nothing learned.

pub mod file;

pub use file::FileStore;

use crate::core::error::{MindError, Result};
use crate::core::types::AgentId;
use ahash::AHashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Mutex;

/// Kinds of per-agent data that survive restarts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Skills,
    SpatialKnowledge,
    SemanticMemory,
}

impl DataKind {
    pub fn file_stem(&self) -> &'static str {
        match self {
            DataKind::Skills => "skills",
            DataKind::SpatialKnowledge => "spatial",
            DataKind::SemanticMemory => "semantic_memory",
        }
    }
}

/// Storage backend
pub trait Persistence: Send + Sync {
    fn save(&self, agent: AgentId, kind: DataKind, payload: &str) -> Result<()>;

    /// Raw payload, or `None` when absent or unreadable
    fn load(&self, agent: AgentId, kind: DataKind) -> Option<String>;
}

/// Serialize `value` as JSON and save it
pub fn save_json<T: Serialize>(
    store: &dyn Persistence,
    agent: AgentId,
    kind: DataKind,
    value: &T,
) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)?;
    store.save(agent, kind, &payload)
}

/// Load and parse a JSON payload, falling back to `T::default()`
pub fn load_json<T: DeserializeOwned + Default>(
    store: &dyn Persistence,
    agent: AgentId,
    kind: DataKind,
) -> T {
    let Some(payload) = store.load(agent, kind) else {
        return T::default();
    };
    match serde_json::from_str(&payload) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(%agent, ?kind, error = %e, "Corrupted payload treated as absent");
            T::default()
        }
    }
}

/// In-process store for tests and for running without a data directory
#[derive(Debug, Default)]
pub struct VolatileStore {
    payloads: Mutex<AHashMap<(AgentId, DataKind), String>>,
}

impl VolatileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a payload directly (used to simulate corruption)
    pub fn put_raw(&self, agent: AgentId, kind: DataKind, payload: impl Into<String>) {
        if let Ok(mut payloads) = self.payloads.lock() {
            payloads.insert((agent, kind), payload.into());
        }
    }
}

impl Persistence for VolatileStore {
    fn save(&self, agent: AgentId, kind: DataKind, payload: &str) -> Result<()> {
        let mut payloads = self
            .payloads
            .lock()
            .map_err(|_| MindError::Persistence("volatile store lock poisoned".into()))?;
        payloads.insert((agent, kind), payload.to_string());
        Ok(())
    }

    fn load(&self, agent: AgentId, kind: DataKind) -> Option<String> {
        self.payloads.lock().ok()?.get(&(agent, kind)).cloned()
    }
}
