//! What one brain tick did
//!
//! Returned by `Brain::on_tick` for the console log and for tests. Nothing
//! in the brain depends on these after they are produced.

use crate::actions::{ActionOutcome, Intent};
use crate::brain::pursuit::Reaction;
use crate::brain::scheduler::UrgencyReason;
use crate::coordination::TeamNotice;
use crate::core::types::{AgentId, GoalId, SharedGoalId, Tick, Vec3};
use crate::goals::{GoalKind, GoalStatus, ReplanOutcome};
use crate::persistence::DataKind;
use crate::skills::LearningEvent;
use crate::spatial::PlaceKind;
use serde::Serialize;

/// Events generated during one brain tick
#[derive(Debug, Clone)]
pub enum BrainEvent {
    /// The decision tier ran
    DecisionEvaluated {
        tick: Tick,
        /// Set when urgency made the decision run early
        urgent: Option<UrgencyReason>,
    },
    /// A reaction took over the current intent
    ReactionTriggered { reaction: Reaction, intent: Intent },
    /// A goal step was handed to the executor
    IntentIssued { goal: Option<GoalId>, intent: Intent },
    /// The executor reported a terminal result
    ActionFinished {
        goal: Option<GoalId>,
        intent: Intent,
        outcome: ActionOutcome,
    },
    /// A goal got its step sequence
    PlanBound {
        goal: GoalId,
        /// `None` for the built-in fallback plan
        skill: Option<String>,
        steps: usize,
    },
    GoalFinished {
        goal: GoalId,
        kind: GoalKind,
        status: GoalStatus,
    },
    Replan(ReplanOutcome),
    Learning(LearningEvent),
    Team(TeamNotice),
    /// Volunteered for an open team
    TeamJoined { team: SharedGoalId },
    /// A new place entered spatial knowledge
    Discovered {
        kind: PlaceKind,
        category: String,
        position: Vec3,
    },
    Saved,
    PersistenceFailed { kind: DataKind, error: String },
    MemoryCleaned { purged: usize, consolidated: usize },
    ExperiencesPruned { removed: usize },
}

/// The active goal as shown in a status report
#[derive(Debug, Clone, Serialize)]
pub struct ActiveGoalStatus {
    pub id: GoalId,
    pub kind: GoalKind,
    pub description: String,
    pub progress: f32,
    pub skill: Option<String>,
}

/// Point-in-time report on one agent
#[derive(Debug, Clone, Serialize)]
pub struct BrainStatus {
    pub id: AgentId,
    pub name: String,
    pub tick: Tick,
    pub health: f32,
    pub active_goal: Option<ActiveGoalStatus>,
    pub goals: usize,
    pub memories: usize,
    pub skills: usize,
    pub known_places: usize,
    pub current_intent: Option<Intent>,
    pub pending_replan: bool,
    pub pending_learning: bool,
    pub team: Option<SharedGoalId>,
}
