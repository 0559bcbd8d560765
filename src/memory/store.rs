//! Three-tier memory store
//!
//! Working memory is a ring that forgets its oldest entry when full.
//! Episodic memory is an event log; its important entries are promoted to
//! semantic facts during consolidation. Every tier loses importance over
//! time at its own rate, and cleanup purges what falls below the floor.

use crate::core::config::MemoryConfig;
use crate::core::error::Result;
use crate::core::types::{AgentId, Tick};
use crate::memory::item::{content_similarity, terms, MemoryItem, MemoryKind, MemoryTier};
use crate::persistence::{self, DataKind, Persistence};
use std::collections::VecDeque;

pub struct MemoryStore {
    config: MemoryConfig,
    working: VecDeque<MemoryItem>,
    episodic: Vec<MemoryItem>,
    semantic: Vec<MemoryItem>,
    next_id: u64,
}

impl MemoryStore {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            working: VecDeque::with_capacity(config.working_capacity),
            episodic: Vec::new(),
            semantic: Vec::new(),
            next_id: 1,
            config,
        }
    }

    pub fn set_config(&mut self, config: MemoryConfig) {
        self.config = config;
        while self.working.len() > self.config.working_capacity {
            self.working.pop_front();
        }
    }

    /// Insert into the tier implied by the item's kind, returning its id
    ///
    /// A semantic item similar to an existing fact reinforces that fact
    /// instead of duplicating it, and the existing id is returned.
    pub fn store(&mut self, mut item: MemoryItem) -> u64 {
        item.tier = item.kind.tier();
        item.importance = item.importance.clamp(0.0, 1.0);

        if item.tier == MemoryTier::Semantic {
            if let Some(existing) = self.find_similar_fact_mut(&item.content) {
                existing.importance = existing.importance.max(item.importance);
                existing.timestamp = existing.timestamp.max(item.timestamp);
                return existing.id;
            }
        }

        item.id = self.next_id;
        self.next_id += 1;
        let id = item.id;

        match item.tier {
            MemoryTier::Working => {
                self.working.push_back(item);
                while self.working.len() > self.config.working_capacity {
                    self.working.pop_front();
                }
            }
            MemoryTier::Episodic => self.episodic.push(item),
            MemoryTier::Semantic => self.semantic.push(item),
        }
        id
    }

    /// Shorthand for building and storing an item
    pub fn remember(&mut self, kind: MemoryKind, content: impl Into<String>, importance: f32, tick: Tick) -> u64 {
        self.store(MemoryItem::new(kind, content, importance, tick))
    }

    /// Relevance-ranked memories matching `query` across all tiers
    ///
    /// An empty query matches everything. The returned sequence is finite
    /// and can be restarted.
    pub fn recall(&self, query: &str, now: Tick) -> Recall<'_> {
        let query_terms = terms(query);
        let mut ranked: Vec<(f32, &MemoryItem)> = self
            .iter()
            .filter_map(|item| {
                let relevance = if query_terms.is_empty() {
                    1.0
                } else {
                    let item_terms = item.terms();
                    let hits = query_terms.iter().filter(|t| item_terms.contains(*t)).count();
                    hits as f32 / query_terms.len() as f32
                };
                if relevance <= 0.0 {
                    return None;
                }
                Some((relevance * self.base_score(item, now), item))
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| b.1.timestamp.cmp(&a.1.timestamp))
                .then_with(|| a.1.id.cmp(&b.1.id))
        });

        Recall { ranked, cursor: 0 }
    }

    fn base_score(&self, item: &MemoryItem, now: Tick) -> f32 {
        let age = now.saturating_sub(item.timestamp) as f32;
        let half_life = self.config.recency_half_life.max(1.0);
        let recency = half_life / (half_life + age);

        item.importance * self.config.importance_weight
            + recency * self.config.recency_weight
            + item.tier.recall_priority() * self.config.tier_weight
    }

    /// Most recent working and episodic memories, newest first
    pub fn recent(&self, limit: usize) -> Vec<&MemoryItem> {
        let mut items: Vec<&MemoryItem> = self.working.iter().chain(self.episodic.iter()).collect();
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        items.truncate(limit);
        items
    }

    /// Promote important episodic memories into semantic facts
    ///
    /// Returns the number of episodic items promoted (merged or new).
    pub fn consolidate(&mut self, now: Tick) -> usize {
        let threshold = self.config.consolidation_threshold;
        let (promoted, kept): (Vec<MemoryItem>, Vec<MemoryItem>) = std::mem::take(&mut self.episodic)
            .into_iter()
            .partition(|item| item.importance >= threshold);
        self.episodic = kept;

        let count = promoted.len();
        for item in promoted {
            let mut fact = MemoryItem::new(MemoryKind::Fact, item.content, item.importance, item.timestamp);
            fact.last_decayed = now;
            self.store(fact);
        }

        if count > 0 {
            tracing::debug!(promoted = count, "Consolidated episodic memories");
        }
        count
    }

    /// Decay every item by elapsed time and purge those below the floor
    ///
    /// Returns the number of purged items. Running it twice on the same
    /// tick changes nothing the second time.
    pub fn cleanup(&mut self, now: Tick) -> usize {
        let floor = self.config.retention_floor;
        let rates = [
            (MemoryTier::Working, self.config.working_decay_rate),
            (MemoryTier::Episodic, self.config.episodic_decay_rate),
            (MemoryTier::Semantic, self.config.semantic_decay_rate),
        ];
        let tier_rate = |tier: MemoryTier| {
            rates.iter().find(|(t, _)| *t == tier).map(|(_, r)| *r).unwrap_or(0.0)
        };

        let decay = |item: &mut MemoryItem| {
            let elapsed = now.saturating_sub(item.last_decayed);
            if elapsed > 0 {
                let rate = item.decay_rate.unwrap_or_else(|| tier_rate(item.tier));
                item.importance = (item.importance - rate * elapsed as f32).clamp(0.0, 1.0);
                item.last_decayed = now;
            }
        };

        let before = self.len();
        self.working.iter_mut().for_each(&decay);
        self.episodic.iter_mut().for_each(&decay);
        self.semantic.iter_mut().for_each(&decay);

        self.working.retain(|m| m.importance >= floor);
        self.episodic.retain(|m| m.importance >= floor);
        self.semantic.retain(|m| m.importance >= floor);

        before - self.len()
    }

    pub fn len(&self) -> usize {
        self.working.len() + self.episodic.len() + self.semantic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tier_len(&self, tier: MemoryTier) -> usize {
        match tier {
            MemoryTier::Working => self.working.len(),
            MemoryTier::Episodic => self.episodic.len(),
            MemoryTier::Semantic => self.semantic.len(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemoryItem> {
        self.semantic.iter().chain(self.episodic.iter()).chain(self.working.iter())
    }

    pub fn semantic_facts(&self) -> &[MemoryItem] {
        &self.semantic
    }

    fn find_similar_fact_mut(&mut self, content: &str) -> Option<&mut MemoryItem> {
        let threshold = self.config.similarity_threshold;
        self.semantic
            .iter_mut()
            .find(|fact| content_similarity(&fact.content, content) >= threshold)
    }

    /// Persist the semantic tier
    pub fn save(&self, store: &dyn Persistence, agent: AgentId) -> Result<()> {
        persistence::save_json(store, agent, DataKind::SemanticMemory, &self.semantic)
    }

    /// Hydrate the semantic tier from storage (absent/corrupted = empty)
    pub fn load(&mut self, store: &dyn Persistence, agent: AgentId, now: Tick) {
        let facts: Vec<MemoryItem> = persistence::load_json(store, agent, DataKind::SemanticMemory);
        for mut fact in facts {
            fact.kind = match fact.kind {
                MemoryKind::Strategy => MemoryKind::Strategy,
                _ => MemoryKind::Fact,
            };
            fact.last_decayed = now;
            fact.timestamp = fact.timestamp.min(now);
            self.store(fact);
        }
    }
}

/// Ranked recall result
#[derive(Debug, Clone)]
pub struct Recall<'a> {
    ranked: Vec<(f32, &'a MemoryItem)>,
    cursor: usize,
}

impl<'a> Recall<'a> {
    /// Rewind to the best match
    pub fn restart(&mut self) {
        self.cursor = 0;
    }

    /// Score of each remaining item, best first
    pub fn scores(&self) -> impl Iterator<Item = f32> + '_ {
        self.ranked[self.cursor..].iter().map(|(s, _)| *s)
    }
}

impl<'a> Iterator for Recall<'a> {
    type Item = &'a MemoryItem;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.ranked.get(self.cursor).map(|(_, item)| *item);
        if item.is_some() {
            self.cursor += 1;
        }
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.ranked.len() - self.cursor;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Recall<'_> {}
