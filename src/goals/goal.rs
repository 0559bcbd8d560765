//! Goals and their lifecycle

use crate::actions::{ActionOutcome, ActionRecord, ActionTemplate};
use crate::core::types::{GoalId, SharedGoalId, Tick};
use serde::{Deserialize, Serialize};

/// What a goal is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalKind {
    Survival,
    ResourceGathering,
    Exploration,
    Combat,
    Build,
    Social,
}

impl GoalKind {
    pub const ALL: [GoalKind; 6] = [
        GoalKind::Survival,
        GoalKind::ResourceGathering,
        GoalKind::Exploration,
        GoalKind::Combat,
        GoalKind::Build,
        GoalKind::Social,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoalStatus {
    Pending,
    Active,
    Succeeded,
    Failed,
    Cancelled,
}

impl GoalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GoalStatus::Succeeded | GoalStatus::Failed | GoalStatus::Cancelled)
    }
}

/// Who asked for a goal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalOrigin {
    SelfGenerated,
    /// An external actor (player, another agent) by id
    RequestedBy(String),
    /// Task `task` of a team's shared goal
    Team { team: SharedGoalId, task: usize },
}

/// Everything needed to create a goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalSpec {
    pub kind: GoalKind,
    pub priority: i32,
    pub description: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(skip, default = "self_generated")]
    pub origin: GoalOrigin,
}

fn self_generated() -> GoalOrigin {
    GoalOrigin::SelfGenerated
}

impl GoalSpec {
    pub fn new(kind: GoalKind, priority: i32, description: impl Into<String>) -> Self {
        Self {
            kind,
            priority,
            description: description.into(),
            target: None,
            origin: GoalOrigin::SelfGenerated,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_origin(mut self, origin: GoalOrigin) -> Self {
        self.origin = origin;
        self
    }
}

/// A prioritized unit of intent, owned by the goal planner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    pub kind: GoalKind,
    pub priority: i32,
    pub status: GoalStatus,
    pub origin: GoalOrigin,
    pub created_tick: Tick,
    pub description: String,
    pub target: Option<String>,
    /// Steps bound when the goal is first pursued
    pub plan: Vec<ActionTemplate>,
    /// Index of the next step in `plan`
    pub cursor: usize,
    /// Skill the plan was taken from, if any
    pub skill: Option<String>,
    /// Every executed step with its outcome
    pub trace: Vec<ActionRecord>,
}

impl Goal {
    pub fn new(id: GoalId, spec: GoalSpec, tick: Tick) -> Self {
        Self {
            id,
            kind: spec.kind,
            priority: spec.priority,
            status: GoalStatus::Pending,
            origin: spec.origin,
            created_tick: tick,
            description: spec.description,
            target: spec.target,
            plan: Vec::new(),
            cursor: 0,
            skill: None,
            trace: Vec::new(),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.status, GoalStatus::Pending | GoalStatus::Active)
    }

    pub fn has_plan(&self) -> bool {
        !self.plan.is_empty()
    }

    /// Bind the step sequence to follow
    pub fn bind_plan(&mut self, skill: Option<String>, plan: Vec<ActionTemplate>) {
        self.skill = skill;
        self.plan = plan;
        self.cursor = 0;
    }

    pub fn next_step(&self) -> Option<&ActionTemplate> {
        self.plan.get(self.cursor)
    }

    /// Record an executed step; success advances the cursor
    pub fn record_step(&mut self, record: ActionRecord) {
        if record.outcome == ActionOutcome::Succeeded {
            self.cursor += 1;
        }
        self.trace.push(record);
    }

    pub fn plan_complete(&self) -> bool {
        self.has_plan() && self.cursor >= self.plan.len()
    }

    /// Completed steps / plan length (0.0 before a plan is bound)
    pub fn progress(&self) -> f32 {
        if self.plan.is_empty() {
            return 0.0;
        }
        (self.cursor as f32 / self.plan.len() as f32).min(1.0)
    }

    /// Context used to match skills against this goal
    pub fn context(&self) -> GoalContext {
        GoalContext {
            kind: self.kind,
            description: self.description.clone(),
            target: self.target.clone(),
        }
    }
}

/// The parts of a goal a skill precondition is matched against
#[derive(Debug, Clone, PartialEq)]
pub struct GoalContext {
    pub kind: GoalKind,
    pub description: String,
    pub target: Option<String>,
}

impl GoalContext {
    /// Description and target as one searchable string
    pub fn text(&self) -> String {
        match &self.target {
            Some(target) => format!("{} {}", self.description, target),
            None => self.description.clone(),
        }
    }
}

/// A goal that reached a terminal status, handed to the learner
#[derive(Debug, Clone)]
pub struct GoalOutcome {
    pub goal: Goal,
    pub tick: Tick,
}

impl GoalOutcome {
    pub fn succeeded(&self) -> bool {
        self.goal.status == GoalStatus::Succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionVerb, Intent};

    fn record(outcome: ActionOutcome) -> ActionRecord {
        ActionRecord {
            tick: 1,
            template: ActionTemplate::bare(ActionVerb::Stop),
            intent: Intent::Stop,
            outcome,
        }
    }

    #[test]
    fn test_progress_follows_cursor() {
        let mut goal = Goal::new(GoalId(1), GoalSpec::new(GoalKind::Build, 3, "build a hut"), 0);
        assert_eq!(goal.progress(), 0.0);

        goal.bind_plan(None, vec![ActionTemplate::bare(ActionVerb::Stop); 4]);
        goal.record_step(record(ActionOutcome::Succeeded));
        goal.record_step(record(ActionOutcome::Failed));
        assert!((goal.progress() - 0.25).abs() < 0.001);
        assert_eq!(goal.trace.len(), 2);
        assert!(!goal.plan_complete());
    }

    #[test]
    fn test_goal_kind_wire_names() {
        let json = serde_json::to_string(&GoalKind::ResourceGathering).unwrap();
        assert_eq!(json, "\"RESOURCE_GATHERING\"");
    }

    #[test]
    fn test_spec_deserializes_as_self_generated() {
        let spec: GoalSpec =
            serde_json::from_str(r#"{"kind": "COMBAT", "priority": 6, "description": "clear the cave"}"#).unwrap();
        assert_eq!(spec.origin, GoalOrigin::SelfGenerated);
        assert_eq!(spec.target, None);
    }
}
