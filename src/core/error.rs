use crate::core::types::{AgentId, GoalId, SharedGoalId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MindError {
    #[error("Agent not found: {0}")]
    AgentNotFound(AgentId),

    #[error("Agent already exists: {0}")]
    AgentExists(String),

    #[error("Goal not found: {0}")]
    GoalNotFound(GoalId),

    #[error("Priority of active {0} is locked; cancel and recreate it instead")]
    GoalPriorityLocked(GoalId),

    #[error("Shared goal not found: {0}")]
    SharedGoalNotFound(SharedGoalId),

    #[error("Shared goal {0} is already formed")]
    AlreadyFormed(SharedGoalId),

    #[error("Invalid team transition for {id}: {reason}")]
    InvalidTransition { id: SharedGoalId, reason: String },

    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("Skill not found: {0}")]
    SkillNotFound(String),

    #[error("Skill {0} has no actions")]
    EmptySkill(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Reasoning request timed out")]
    ReasoningTimeout,

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, MindError>;
