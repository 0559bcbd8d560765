//! External reasoning: HTTP model client, prompt context, reply parsing and
//! the non-blocking request capability the brain talks to

pub mod client;
pub mod context;
pub mod parser;
pub mod reasoning;

pub use client::{ApiFormat, LlmClient, LlmSettings};
pub use context::PlanningContext;
pub use parser::{GoalProposal, ProposalDecision, SkillProposal};
pub use reasoning::{
    LlmReasoner, ManualReasoner, OfflineReasoner, PendingPoll, PendingReasoning, ReasoningPurpose,
    ReasoningReply, ReasoningRequest, ReasoningService, ReasoningSlot, Resolved,
};
