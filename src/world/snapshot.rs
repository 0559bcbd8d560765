//! Read-only per-tick view of the world around one agent
//!
//! The host captures a snapshot each tick; the brain never mutates it.

use crate::core::types::{Tick, Vec3};
use serde::{Deserialize, Serialize};

/// Everything the brain may know about the world this tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Tick the snapshot was captured on
    pub tick: Tick,
    /// Monotonic version, bumped by the host on every capture
    pub version: u64,
    pub agent: AgentVitals,
    pub nearby: Vec<NearbyEntity>,
    pub terrain: TerrainSample,
}

/// The agent's own body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentVitals {
    pub position: Vec3,
    /// Unit vector the agent is facing
    pub facing: Vec3,
    pub health: f32,
    pub max_health: f32,
    /// (item, count) pairs
    pub inventory: Vec<(String, u32)>,
}

impl Default for AgentVitals {
    fn default() -> Self {
        Self {
            position: Vec3::default(),
            facing: Vec3::new(1.0, 0.0, 0.0),
            health: 20.0,
            max_health: 20.0,
            inventory: Vec::new(),
        }
    }
}

/// Another entity within perception range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyEntity {
    pub id: String,
    pub kind: String,
    pub position: Vec3,
    pub hostile: bool,
}

/// Bounded block/terrain sample around the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainSample {
    /// Whether there is supporting ground one step ahead
    pub ground_ahead: bool,
    /// Named hazards directly ahead (lava, water, drop)
    pub hazards: Vec<String>,
    /// Notable blocks (ores, logs, ...) in the sample
    pub blocks: Vec<BlockSample>,
}

impl Default for TerrainSample {
    fn default() -> Self {
        Self {
            ground_ahead: true,
            hazards: Vec::new(),
            blocks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSample {
    pub kind: String,
    pub position: Vec3,
}

impl WorldSnapshot {
    /// Health as a fraction of maximum (0.0 - 1.0)
    pub fn health_fraction(&self) -> f32 {
        if self.agent.max_health <= 0.0 {
            return 0.0;
        }
        (self.agent.health / self.agent.max_health).clamp(0.0, 1.0)
    }

    /// Closest hostile entity within `range`
    pub fn nearest_hostile(&self, range: f32) -> Option<&NearbyEntity> {
        let here = self.agent.position;
        self.nearby
            .iter()
            .filter(|e| e.hostile)
            .map(|e| (e.position.distance(&here), e))
            .filter(|(d, _)| *d <= range)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, e)| e)
    }

    /// No supporting ground or a named hazard one step ahead
    pub fn hazard_ahead(&self) -> bool {
        !self.terrain.ground_ahead || !self.terrain.hazards.is_empty()
    }

    pub fn has_item(&self, item: &str) -> bool {
        self.agent.inventory.iter().any(|(name, count)| name == item && *count > 0)
    }
}
