//! Brain configuration with documented constants
//!
//! All tuning values are collected here with explanations of their purpose
//! and how they interact with each other. Intervals are expressed in host
//! ticks; the defaults assume a 20 ticks-per-second host clock.

use crate::core::error::{MindError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration shared by every agent brain
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MindConfig {
    pub tiers: TierIntervals,
    pub urgency: UrgencyPolicy,
    pub planner: PlannerConfig,
    pub memory: MemoryConfig,
    pub skills: SkillConfig,
    pub coordination: CoordinationConfig,
    pub registry: RegistryConfig,
}

/// Update intervals for each scheduler tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierIntervals {
    /// Perception refresh and hazard bookkeeping
    ///
    /// At 2 ticks (100ms) the agent's picture of its surroundings is never
    /// more than one decision behind.
    pub reactive: u32,

    /// "Should I change what I'm doing right now?"
    ///
    /// At 4 ticks (200ms) a creeper fuse or a cliff edge is noticed before
    /// it hurts. The urgency policy can shorten this further.
    pub decision: u32,

    /// Strategic replanning through the reasoning service
    ///
    /// At 100 ticks (5s) the expensive, high-latency call stays rare.
    pub planning: u32,

    /// Flush skills, spatial knowledge and semantic memory to storage
    pub persistence: u32,

    /// Memory decay/purge, consolidation and stale-experience pruning
    pub cleanup: u32,
}

impl Default for TierIntervals {
    fn default() -> Self {
        Self {
            reactive: 2,
            decision: 4,
            planning: 100,
            persistence: 6000,
            cleanup: 1200,
        }
    }
}

/// When the decision tier runs faster than its configured interval
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UrgencyPolicy {
    /// Health below this fraction of maximum is urgent
    pub low_health_fraction: f32,

    /// Hostiles within this distance are urgent (world units)
    pub hostile_range: f32,

    /// Losing at least this fraction of max health between two snapshots is urgent
    pub sharp_drop_fraction: f32,

    /// Decision interval used while the situation is urgent
    pub urgent_decision_interval: u32,
}

impl Default for UrgencyPolicy {
    fn default() -> Self {
        Self {
            low_health_fraction: 0.5,
            hostile_range: 16.0,
            sharp_drop_fraction: 0.25,
            urgent_decision_interval: 1,
        }
    }
}

/// Goal planner tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// An active goal at or above this progress is not displaced by preemption
    ///
    /// The higher-priority goal waits in the queue until the nearly finished
    /// one resolves. Set above 1.0 to always preempt.
    pub near_completion_threshold: f32,

    /// Ticks a reasoning request may stay outstanding before it is abandoned
    pub reasoning_timeout_ticks: u64,

    /// Priority given to goals requested by external actors
    pub requested_goal_priority: i32,

    /// Spawn a low-priority exploration goal when the queue runs dry
    pub idle_exploration: bool,

    /// Priority of the idle exploration goal
    pub idle_priority: i32,

    /// Number of recent memories included in a replanning context
    pub context_memories: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            near_completion_threshold: 0.9,
            reasoning_timeout_ticks: 200,
            requested_goal_priority: 10,
            idle_exploration: true,
            idle_priority: 1,
            context_memories: 8,
        }
    }
}

/// Memory store tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Capacity of the working-memory ring
    pub working_capacity: usize,

    /// Items whose importance falls below this are purged on cleanup
    pub retention_floor: f32,

    /// Episodic items at or above this importance are promoted to semantic
    pub consolidation_threshold: f32,

    /// Word-overlap similarity above which two facts are the same fact
    pub similarity_threshold: f32,

    /// Importance lost per tick by working items
    ///
    /// At 0.002, a 0.5-importance observation is purged after ~200 ticks (10s).
    pub working_decay_rate: f32,

    /// Importance lost per tick by episodic items
    ///
    /// At 0.0005, a 0.5-importance event lasts ~800 ticks (40s).
    pub episodic_decay_rate: f32,

    /// Importance lost per tick by semantic items (0 = durable)
    pub semantic_decay_rate: f32,

    /// Recall weight of importance
    pub importance_weight: f32,

    /// Recall weight of recency
    pub recency_weight: f32,

    /// Recall weight of tier priority
    pub tier_weight: f32,

    /// Age in ticks at which the recency score halves
    pub recency_half_life: f32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            working_capacity: 20,
            retention_floor: 0.1,
            consolidation_threshold: 0.7,
            similarity_threshold: 0.6,
            working_decay_rate: 0.002,
            episodic_decay_rate: 0.0005,
            semantic_decay_rate: 0.0,
            importance_weight: 0.4,
            recency_weight: 0.3,
            tier_weight: 0.3,
            recency_half_life: 1200.0,
        }
    }
}

/// Skill library and experience learner tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillConfig {
    /// Pseudo-uses pulling a skill's quality toward 0.5
    ///
    /// A skill with few uses sits near 0.5; its observed success rate takes
    /// over as uses accumulate past this number.
    pub confidence_prior: f32,

    /// Failure rate above which a refinement is requested
    pub refinement_failure_rate: f32,

    /// Uses required before the failure rate is trusted
    pub min_uses_for_refinement: u32,

    /// Action-sequence similarity at which a trace matches a skill
    pub match_threshold: f32,

    /// Raw traces older than this are discarded (milliseconds)
    pub experience_max_age_ms: u64,
}

impl Default for SkillConfig {
    fn default() -> Self {
        Self {
            confidence_prior: 4.0,
            refinement_failure_rate: 0.5,
            min_uses_for_refinement: 3,
            match_threshold: 0.6,
            experience_max_age_ms: 10 * 60 * 1000,
        }
    }
}

/// Team formation tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinationConfig {
    /// Participants (leader included) needed before tasks are assigned
    pub quorum: usize,

    /// Ticks a team may stay in formation before it disbands
    pub formation_timeout_ticks: u64,

    /// Agents whose active goal is below this priority may volunteer
    pub helper_priority_ceiling: i32,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            quorum: 2,
            formation_timeout_ticks: 200,
            helper_priority_ceiling: 5,
        }
    }
}

/// Agent registry tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Minimum agent count before ticking agents in parallel
    ///
    /// Below this threshold, thread overhead exceeds benefits.
    pub parallel_threshold: usize,

    /// Host ticks per real second (converts millisecond ages to ticks)
    pub ticks_per_second: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: 64,
            ticks_per_second: 20,
        }
    }
}

impl RegistryConfig {
    /// Convert a millisecond duration into whole ticks
    pub fn ms_to_ticks(&self, ms: u64) -> u64 {
        ms * self.ticks_per_second as u64 / 1000
    }
}

impl MindConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: MindConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let tiers = &self.tiers;
        for (name, interval) in [
            ("reactive", tiers.reactive),
            ("decision", tiers.decision),
            ("planning", tiers.planning),
            ("persistence", tiers.persistence),
            ("cleanup", tiers.cleanup),
        ] {
            if interval == 0 {
                return Err(MindError::Config(format!("tier interval '{}' must be at least 1", name)));
            }
        }

        // Urgency can only shorten the decision interval
        if self.urgency.urgent_decision_interval == 0
            || self.urgency.urgent_decision_interval > tiers.decision
        {
            return Err(MindError::Config(format!(
                "urgent_decision_interval ({}) must be in 1..={}",
                self.urgency.urgent_decision_interval, tiers.decision
            )));
        }

        let memory = &self.memory;
        if !(0.0..=1.0).contains(&memory.retention_floor)
            || !(0.0..=1.0).contains(&memory.consolidation_threshold)
        {
            return Err(MindError::Config("memory thresholds must lie in [0, 1]".into()));
        }
        if memory.consolidation_threshold <= memory.retention_floor {
            return Err(MindError::Config(format!(
                "consolidation_threshold ({}) should be > retention_floor ({})",
                memory.consolidation_threshold, memory.retention_floor
            )));
        }
        if memory.working_capacity == 0 {
            return Err(MindError::Config("working_capacity must be at least 1".into()));
        }

        if self.skills.confidence_prior < 0.0 {
            return Err(MindError::Config("confidence_prior must not be negative".into()));
        }

        if self.coordination.quorum == 0 {
            return Err(MindError::Config("quorum must be at least 1".into()));
        }

        if self.registry.ticks_per_second == 0 {
            return Err(MindError::Config("ticks_per_second must be at least 1".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(MindConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MindConfig::from_toml_str(
            r#"
            [tiers]
            decision = 6

            [coordination]
            quorum = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.tiers.decision, 6);
        assert_eq!(config.tiers.planning, 100);
        assert_eq!(config.coordination.quorum, 3);
        assert_eq!(config.memory.working_capacity, 20);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = MindConfig::from_toml_str("[tiers]\nplanning = 0\n");
        assert!(matches!(result, Err(MindError::Config(_))));
    }

    #[test]
    fn test_urgent_interval_cannot_exceed_decision() {
        let mut config = MindConfig::default();
        config.urgency.urgent_decision_interval = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ms_to_ticks() {
        let registry = RegistryConfig::default();
        assert_eq!(registry.ms_to_ticks(1000), 20);
        assert_eq!(registry.ms_to_ticks(60_000), 1200);
    }
}
