//! Goals and the per-agent goal planner

pub mod goal;
pub mod planner;

pub use goal::{Goal, GoalContext, GoalKind, GoalOrigin, GoalOutcome, GoalSpec, GoalStatus};
pub use planner::{GoalPlanner, ReplanOutcome};
