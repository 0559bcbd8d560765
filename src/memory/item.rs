//! Memory items and their tiers

use crate::core::types::Tick;
use ahash::AHashSet;
use serde::{Deserialize, Serialize};

/// Storage tier of a memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryTier {
    /// Fixed-capacity recency buffer
    Working,
    /// Append-only event log with importance-weighted retention
    Episodic,
    /// Durable facts and strategies
    Semantic,
}

impl MemoryTier {
    /// Priority of the tier for factual recall (semantic > episodic > working)
    pub fn recall_priority(&self) -> f32 {
        match self {
            MemoryTier::Semantic => 1.0,
            MemoryTier::Episodic => 0.6,
            MemoryTier::Working => 0.3,
        }
    }
}

/// What a memory is about; decides its tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryKind {
    /// Something perceived just now
    Observation,
    /// Something that happened (goal finished, took damage, ...)
    Event,
    /// A durable fact about the world
    Fact,
    /// A durable lesson about how to act
    Strategy,
}

impl MemoryKind {
    pub fn tier(&self) -> MemoryTier {
        match self {
            MemoryKind::Observation => MemoryTier::Working,
            MemoryKind::Event => MemoryTier::Episodic,
            MemoryKind::Fact | MemoryKind::Strategy => MemoryTier::Semantic,
        }
    }
}

/// A single remembered thing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: u64,
    pub kind: MemoryKind,
    pub tier: MemoryTier,
    pub content: String,
    /// 0.0 = forgettable, 1.0 = vital
    pub importance: f32,
    /// Tick the memory was formed (or last reinforced)
    pub timestamp: Tick,
    /// Importance lost per tick; `None` uses the tier default
    pub decay_rate: Option<f32>,
    /// Tick decay was last applied up to
    pub last_decayed: Tick,
}

impl MemoryItem {
    pub fn new(kind: MemoryKind, content: impl Into<String>, importance: f32, tick: Tick) -> Self {
        Self {
            id: 0,
            kind,
            tier: kind.tier(),
            content: content.into(),
            importance: importance.clamp(0.0, 1.0),
            timestamp: tick,
            decay_rate: None,
            last_decayed: tick,
        }
    }

    pub fn with_decay_rate(mut self, rate: f32) -> Self {
        self.decay_rate = Some(rate.max(0.0));
        self
    }

    /// Lower-cased word set of the content
    pub fn terms(&self) -> AHashSet<String> {
        terms(&self.content)
    }
}

pub(crate) fn terms(text: &str) -> AHashSet<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Jaccard similarity of two texts' word sets (0.0 - 1.0)
pub fn content_similarity(a: &str, b: &str) -> f32 {
    let a = terms(a);
    let b = terms(b);
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared = a.intersection(&b).count() as f32;
    let union = a.union(&b).count() as f32;
    shared / union
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_decides_tier() {
        assert_eq!(MemoryKind::Observation.tier(), MemoryTier::Working);
        assert_eq!(MemoryKind::Event.tier(), MemoryTier::Episodic);
        assert_eq!(MemoryKind::Strategy.tier(), MemoryTier::Semantic);
    }

    #[test]
    fn test_importance_clamped() {
        let item = MemoryItem::new(MemoryKind::Event, "x", 3.0, 0);
        assert_eq!(item.importance, 1.0);
        let item = MemoryItem::new(MemoryKind::Event, "x", -1.0, 0);
        assert_eq!(item.importance, 0.0);
    }

    #[test]
    fn test_similarity() {
        assert!((content_similarity("iron ore at the cave", "iron ore at the cave") - 1.0).abs() < 0.001);
        assert!(content_similarity("Iron ore near cave", "iron ore near the cave") > 0.7);
        assert_eq!(content_similarity("zombies burn", "wheat grows"), 0.0);
    }
}
