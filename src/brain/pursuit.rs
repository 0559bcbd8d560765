//! Turning the situation and the active goal into one concrete intent
//!
//! Reactions come first and never touch goals. Otherwise the active goal's
//! next plan step is resolved against the snapshot and spatial knowledge.

use crate::actions::{ActionTemplate, ActionVerb, Intent};
use crate::core::config::UrgencyPolicy;
use crate::core::types::Vec3;
use crate::goals::{Goal, GoalKind};
use crate::spatial::{PlaceKind, SpatialKnowledge};
use crate::world::WorldSnapshot;
use serde::Serialize;

/// How far ahead the `ahead` target points (world units)
const SCOUT_DISTANCE: f32 = 16.0;

/// Immediate response that overrides goal pursuit for one decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Reaction {
    AvoidHazard,
    Flee { from: String },
    Fight { target: String },
}

/// Decision-tier reaction to the snapshot, if any
///
/// No ground or a named hazard ahead stops the agent. A hostile in range is
/// fled from while health is low and attacked otherwise.
pub fn react(snapshot: &WorldSnapshot, policy: &UrgencyPolicy) -> Option<(Reaction, Intent)> {
    if snapshot.hazard_ahead() {
        return Some((Reaction::AvoidHazard, Intent::Stop));
    }

    let hostile = snapshot.nearest_hostile(policy.hostile_range)?;
    if snapshot.health_fraction() < policy.low_health_fraction {
        let here = snapshot.agent.position;
        let position = flee_point(here, hostile.position, policy.hostile_range);
        return Some((Reaction::Flee { from: hostile.id.clone() }, Intent::MoveTo { position }));
    }

    Some((
        Reaction::Fight { target: hostile.id.clone() },
        Intent::Attack { target: hostile.id.clone() },
    ))
}

fn flee_point(here: Vec3, threat: Vec3, distance: f32) -> Vec3 {
    let away = (here - threat).normalize();
    if away.length() == 0.0 {
        return here + Vec3::new(distance, 0.0, 0.0);
    }
    here + away * distance
}

/// Deterministic plan used when no skill applies
pub fn fallback_plan(kind: GoalKind, has_target: bool) -> Vec<ActionTemplate> {
    use ActionVerb::*;
    match (kind, has_target) {
        (GoalKind::Survival, _) => vec![ActionTemplate::new(MoveTo, "away"), ActionTemplate::bare(Stop)],
        (GoalKind::ResourceGathering, true) => vec![
            ActionTemplate::new(MoveTo, "nearest:$target"),
            ActionTemplate::new(UseItem, "$target"),
        ],
        (GoalKind::ResourceGathering, false) | (GoalKind::Exploration, _) => {
            vec![ActionTemplate::new(MoveTo, "ahead")]
        }
        (GoalKind::Combat, _) => vec![ActionTemplate::new(MoveTo, "hostile"), ActionTemplate::new(Attack, "hostile")],
        (GoalKind::Build, true) => vec![
            ActionTemplate::new(MoveTo, "$target"),
            ActionTemplate::new(UseItem, "$target"),
        ],
        (GoalKind::Build, false) => vec![ActionTemplate::new(UseItem, "planks")],
        (GoalKind::Social, true) => vec![ActionTemplate::new(MoveTo, "$target")],
        (GoalKind::Social, false) => vec![ActionTemplate::bare(Stop)],
    }
}

/// Resolve one plan step into an intent; `None` when the target is unknown
pub fn resolve(
    template: &ActionTemplate,
    goal: &Goal,
    snapshot: &WorldSnapshot,
    spatial: &SpatialKnowledge,
) -> Option<Intent> {
    let target = match &template.target {
        Some(raw) if raw.contains("$target") => Some(raw.replace("$target", goal.target.as_deref()?)),
        other => other.clone(),
    };

    match template.verb {
        ActionVerb::Stop => Some(Intent::Stop),
        ActionVerb::UseItem => {
            let item = target.filter(|t| !t.is_empty())?;
            Some(Intent::UseItem { item })
        }
        ActionVerb::Attack => {
            let target = target.unwrap_or_else(|| "hostile".into());
            resolve_entity(&target, snapshot).map(|target| Intent::Attack { target })
        }
        ActionVerb::MoveTo => {
            let target = target?;
            resolve_position(&target, snapshot, spatial).map(|position| Intent::MoveTo { position })
        }
    }
}

fn resolve_entity(target: &str, snapshot: &WorldSnapshot) -> Option<String> {
    if target == "hostile" {
        return snapshot.nearest_hostile(f32::INFINITY).map(|e| e.id.clone());
    }
    snapshot
        .nearby
        .iter()
        .find(|e| e.id == target)
        .or_else(|| snapshot.nearby.iter().find(|e| e.kind == target))
        .map(|e| e.id.clone())
}

fn resolve_position(target: &str, snapshot: &WorldSnapshot, spatial: &SpatialKnowledge) -> Option<Vec3> {
    let here = snapshot.agent.position;
    match target {
        "hostile" => snapshot.nearest_hostile(f32::INFINITY).map(|e| e.position),
        "away" => Some(match snapshot.nearest_hostile(f32::INFINITY) {
            Some(hostile) => flee_point(here, hostile.position, SCOUT_DISTANCE),
            None => here,
        }),
        "ahead" => Some(here + snapshot.agent.facing.normalize() * SCOUT_DISTANCE),
        _ => {
            if let Some(resource) = target.strip_prefix("nearest:") {
                return spatial
                    .find_nearest(here, PlaceKind::Resource, Some(resource))
                    .map(|p| p.position)
                    .or_else(|| {
                        snapshot
                            .terrain
                            .blocks
                            .iter()
                            .filter(|b| b.kind == resource)
                            .min_by(|a, b| a.position.distance(&here).total_cmp(&b.position.distance(&here)))
                            .map(|b| b.position)
                    });
            }
            spatial
                .find_landmark(target)
                .map(|p| p.position)
                .or_else(|| {
                    snapshot
                        .nearby
                        .iter()
                        .find(|e| e.id == target || e.kind == target)
                        .map(|e| e.position)
                })
                .or_else(|| spatial.find_nearest(here, PlaceKind::Resource, Some(target)).map(|p| p.position))
        }
    }
}
