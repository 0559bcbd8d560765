//! Multi-agent shared goals and team formation

pub mod board;
pub mod team;

pub use board::{CoordinationBoard, TeamSummary};
pub use team::{task_origin, SharedGoal, TeamNotice, TeamState, TeamTask};
