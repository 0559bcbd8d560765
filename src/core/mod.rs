pub mod config;
pub mod error;
pub mod types;

pub use config::MindConfig;
pub use error::{MindError, Result};
pub use types::{AgentId, GoalId, SharedGoalId, Tick, Vec3};
