//! Tier counters and the urgency policy
//!
//! Every tier has its own counter. A counter advances once per tick and
//! fires when it reaches the tier's interval, then resets. The decision
//! tier's effective interval shrinks while the situation is urgent.

use crate::core::config::{TierIntervals, UrgencyPolicy};
use crate::world::WorldSnapshot;
use serde::Serialize;

/// Tiers driven by the scheduler's own counters
///
/// The planning tier counts inside the goal planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Tier {
    Reactive,
    Decision,
    Persistence,
    Cleanup,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Reactive, Tier::Decision, Tier::Persistence, Tier::Cleanup];

    fn index(self) -> usize {
        match self {
            Tier::Reactive => 0,
            Tier::Decision => 1,
            Tier::Persistence => 2,
            Tier::Cleanup => 3,
        }
    }

    fn interval(self, intervals: &TierIntervals) -> u32 {
        match self {
            Tier::Reactive => intervals.reactive,
            Tier::Decision => intervals.decision,
            Tier::Persistence => intervals.persistence,
            Tier::Cleanup => intervals.cleanup,
        }
    }
}

/// Why the decision tier is running early
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UrgencyReason {
    LowHealth,
    HostileNearby,
    HazardAhead,
    SharpHealthDrop,
}

/// Check the urgency policy against the current snapshot
///
/// `previous_health` is the health seen on the previous tick, if any.
pub fn assess_urgency(
    snapshot: &WorldSnapshot,
    previous_health: Option<f32>,
    policy: &UrgencyPolicy,
) -> Option<UrgencyReason> {
    if snapshot.hazard_ahead() {
        return Some(UrgencyReason::HazardAhead);
    }
    if snapshot.nearest_hostile(policy.hostile_range).is_some() {
        return Some(UrgencyReason::HostileNearby);
    }
    if snapshot.health_fraction() < policy.low_health_fraction {
        return Some(UrgencyReason::LowHealth);
    }
    let max_health = snapshot.agent.max_health;
    if let Some(previous) = previous_health {
        if max_health > 0.0 && (previous - snapshot.agent.health) / max_health >= policy.sharp_drop_fraction {
            return Some(UrgencyReason::SharpHealthDrop);
        }
    }
    None
}

/// Tiers due on one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DueTiers {
    pub reactive: bool,
    pub decision: bool,
    pub persistence: bool,
    pub cleanup: bool,
}

#[derive(Debug, Clone)]
pub struct TierCounters {
    intervals: TierIntervals,
    urgent_interval: u32,
    counters: [u32; 4],
}

impl TierCounters {
    pub fn new(intervals: TierIntervals, urgent_interval: u32) -> Self {
        Self {
            intervals,
            urgent_interval: urgent_interval.max(1),
            counters: [0; 4],
        }
    }

    /// New intervals take effect on the next tick; counts carry over
    pub fn set_intervals(&mut self, intervals: TierIntervals, urgent_interval: u32) {
        self.intervals = intervals;
        self.urgent_interval = urgent_interval.max(1);
    }

    /// Effective interval for `tier` given the current urgency
    pub fn interval(&self, tier: Tier, urgent: bool) -> u32 {
        let configured = tier.interval(&self.intervals).max(1);
        if tier == Tier::Decision && urgent {
            configured.min(self.urgent_interval)
        } else {
            configured
        }
    }

    /// Advance every counter by one tick and report which tiers fire
    pub fn advance(&mut self, urgent: bool) -> DueTiers {
        let mut due = DueTiers::default();
        for tier in Tier::ALL {
            let interval = self.interval(tier, urgent);
            let counter = &mut self.counters[tier.index()];
            *counter += 1;
            if *counter >= interval {
                *counter = 0;
                match tier {
                    Tier::Reactive => due.reactive = true,
                    Tier::Decision => due.decision = true,
                    Tier::Persistence => due.persistence = true,
                    Tier::Cleanup => due.cleanup = true,
                }
            }
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;
    use crate::world::NearbyEntity;

    fn intervals() -> TierIntervals {
        TierIntervals {
            reactive: 2,
            decision: 4,
            planning: 100,
            persistence: 50,
            cleanup: 20,
        }
    }

    #[test]
    fn test_decision_fires_every_interval() {
        let mut counters = TierCounters::new(intervals(), 1);
        let fired: Vec<u32> = (1..=12).filter(|_| counters.advance(false).decision).collect();
        assert_eq!(fired.len(), 3);
    }

    #[test]
    fn test_urgency_fires_immediately() {
        let mut counters = TierCounters::new(intervals(), 1);
        assert!(!counters.advance(false).decision);
        assert!(counters.advance(true).decision);
        assert!(counters.advance(true).decision);
    }

    #[test]
    fn test_slow_tiers() {
        let mut counters = TierCounters::new(intervals(), 1);
        let mut persistence = 0;
        let mut cleanup = 0;
        for _ in 0..100 {
            let due = counters.advance(false);
            persistence += due.persistence as u32;
            cleanup += due.cleanup as u32;
        }
        assert_eq!(persistence, 2);
        assert_eq!(cleanup, 5);
    }

    #[test]
    fn test_urgency_reasons() {
        let policy = UrgencyPolicy::default();
        let mut snapshot = WorldSnapshot::default();
        assert_eq!(assess_urgency(&snapshot, None, &policy), None);

        snapshot.agent.health = 15.0;
        assert_eq!(
            assess_urgency(&snapshot, Some(20.0), &policy),
            Some(UrgencyReason::SharpHealthDrop)
        );

        snapshot.agent.health = 8.0;
        assert_eq!(assess_urgency(&snapshot, Some(8.0), &policy), Some(UrgencyReason::LowHealth));

        snapshot.nearby.push(NearbyEntity {
            id: "z".into(),
            kind: "zombie".into(),
            position: Vec3::new(4.0, 0.0, 0.0),
            hostile: true,
        });
        assert_eq!(assess_urgency(&snapshot, None, &policy), Some(UrgencyReason::HostileNearby));

        snapshot.terrain.ground_ahead = false;
        assert_eq!(assess_urgency(&snapshot, None, &policy), Some(UrgencyReason::HazardAhead));
    }
}
