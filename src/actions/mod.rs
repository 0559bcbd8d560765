//! Intents handed to the action executor and the templates skills are made of

pub mod executor;

pub use executor::{ActionExecutor, ScriptHandle, ScriptedExecutor};

use crate::core::types::{Tick, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The single "current intent" the executor works on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Intent {
    MoveTo { position: Vec3 },
    Attack { target: String },
    UseItem { item: String },
    Stop,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::MoveTo { position } => write!(f, "move to {}", position),
            Intent::Attack { target } => write!(f, "attack {}", target),
            Intent::UseItem { item } => write!(f, "use {}", item),
            Intent::Stop => write!(f, "stop"),
        }
    }
}

/// Executor progress report for the current intent
#[derive(Debug, Clone, PartialEq)]
pub enum ActionStatus {
    /// Nothing issued, or the last result was already reported
    Idle,
    InProgress,
    Succeeded,
    Failed(String),
}

/// Verb of an action template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionVerb {
    MoveTo,
    Attack,
    UseItem,
    Stop,
}

/// One step of a skill, with a symbolic target resolved at execution time
///
/// Target forms:
/// - `$target` - the goal's own target reference
/// - `nearest:<resource>` - closest known resource of that type
/// - `hostile` - closest hostile in the snapshot
/// - `away` - a point directly away from the closest hostile
/// - `ahead` - a point a short scouting distance along the facing direction
/// - anything else - a landmark name, an entity id or an item name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionTemplate {
    pub verb: ActionVerb,
    #[serde(default)]
    pub target: Option<String>,
}

impl ActionTemplate {
    pub fn new(verb: ActionVerb, target: impl Into<String>) -> Self {
        Self { verb, target: Some(target.into()) }
    }

    pub fn bare(verb: ActionVerb) -> Self {
        Self { verb, target: None }
    }
}

impl fmt::Display for ActionTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(target) => write!(f, "{:?}({})", self.verb, target),
            None => write!(f, "{:?}", self.verb),
        }
    }
}

/// Final result of one executed step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutcome {
    Succeeded,
    Failed,
}

/// One executed step of a goal, kept for learning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub tick: Tick,
    pub template: ActionTemplate,
    pub intent: Intent,
    pub outcome: ActionOutcome,
}
