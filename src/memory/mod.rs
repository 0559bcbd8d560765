//! Tiered agent memory: working, episodic and semantic

pub mod item;
pub mod store;

pub use item::{content_similarity, MemoryItem, MemoryKind, MemoryTier};
pub use store::{MemoryStore, Recall};
