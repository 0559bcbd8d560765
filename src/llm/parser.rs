//! Turn reasoning-model text into structured proposals
//!
//! The model is asked for JSON, but replies often wrap it in prose. The
//! first `{` to the last `}` is parsed; anything unparseable is kept as
//! plain text and never applied.

use crate::actions::ActionTemplate;
use crate::core::error::{MindError, Result};
use crate::goals::{GoalKind, GoalSpec};
use crate::llm::reasoning::{ReasoningPurpose, ReasoningReply};
use serde::{Deserialize, Serialize};

/// Whether the current goal should stand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalDecision {
    Affirm,
    Replace,
}

/// Replanning answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProposal {
    pub decision: ProposalDecision,
    /// Replacement goal (required for REPLACE)
    #[serde(default)]
    pub goal: Option<GoalSpec>,
    #[serde(default)]
    pub reason: String,
}

impl GoalProposal {
    pub fn affirm() -> Self {
        Self {
            decision: ProposalDecision::Affirm,
            goal: None,
            reason: String::new(),
        }
    }

    pub fn replace(goal: GoalSpec) -> Self {
        Self {
            decision: ProposalDecision::Replace,
            goal: Some(goal),
            reason: String::new(),
        }
    }
}

/// Skill definition produced for generation or refinement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillProposal {
    pub name: String,
    #[serde(default)]
    pub precondition: String,
    #[serde(default)]
    pub applies_to: Vec<GoalKind>,
    #[serde(default)]
    pub required_terms: Vec<String>,
    pub actions: Vec<ActionTemplate>,
}

/// Extract the JSON object from a reply (handles surrounding text)
pub fn extract_json(response: &str) -> Result<&str> {
    let start = response
        .find('{')
        .ok_or_else(|| MindError::LlmError("No JSON found in response".into()))?;
    let end = response
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| MindError::LlmError("No closing brace found in response".into()))?;
    Ok(&response[start..=end])
}

pub fn parse_goal_proposal(response: &str) -> Result<GoalProposal> {
    let proposal: GoalProposal = serde_json::from_str(extract_json(response)?)
        .map_err(|e| MindError::LlmError(format!("Failed to parse goal proposal: {}", e)))?;
    if proposal.decision == ProposalDecision::Replace && proposal.goal.is_none() {
        return Err(MindError::LlmError("REPLACE proposal without a goal".into()));
    }
    Ok(proposal)
}

pub fn parse_skill_proposal(response: &str) -> Result<SkillProposal> {
    let proposal: SkillProposal = serde_json::from_str(extract_json(response)?)
        .map_err(|e| MindError::LlmError(format!("Failed to parse skill: {}", e)))?;
    if proposal.name.trim().is_empty() || proposal.actions.is_empty() {
        return Err(MindError::LlmError("Skill needs a name and at least one action".into()));
    }
    Ok(proposal)
}

/// Interpret raw model text for the given purpose
pub fn interpret_reply(purpose: &ReasoningPurpose, text: &str) -> ReasoningReply {
    let parsed = match purpose {
        ReasoningPurpose::Replan => parse_goal_proposal(text).map(ReasoningReply::Goal),
        ReasoningPurpose::GenerateSkill | ReasoningPurpose::RefineSkill { .. } => {
            parse_skill_proposal(text).map(ReasoningReply::Skill)
        }
    };
    parsed.unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Reply kept as plain text");
        ReasoningReply::Text(text.to_string())
    })
}

/// System prompt for each kind of request
pub fn system_prompt(purpose: &ReasoningPurpose) -> &'static str {
    match purpose {
        ReasoningPurpose::Replan => REPLAN_SYSTEM_PROMPT,
        ReasoningPurpose::GenerateSkill => SKILL_SYSTEM_PROMPT,
        ReasoningPurpose::RefineSkill { .. } => REFINE_SYSTEM_PROMPT,
    }
}

const REPLAN_SYSTEM_PROMPT: &str = r#"You are the strategic planner of an autonomous agent in a block-based survival world.
Given the agent's state, goals, memories and known places, decide whether the current goal should stand.

GOAL KINDS: SURVIVAL, RESOURCE_GATHERING, EXPLORATION, COMBAT, BUILD, SOCIAL

OUTPUT FORMAT (JSON only, no explanation):
{
  "decision": "AFFIRM|REPLACE",
  "goal": {"kind": "GOAL_KIND", "priority": 1-9, "description": "short imperative", "target": "resource/landmark/entity or null"},
  "reason": "one sentence"
}

Use AFFIRM with "goal": null when the current goal is still the right thing to do.
"#;

const SKILL_SYSTEM_PROMPT: &str = r#"You turn a successful sequence of agent actions into a reusable skill.

ACTION VERBS: MOVE_TO, ATTACK, USE_ITEM, STOP
TARGETS: "$target" (the goal's target), "nearest:<resource>", "hostile", "away", a landmark name, an item name

OUTPUT FORMAT (JSON only, no explanation):
{
  "name": "snake_case_name",
  "precondition": "when this skill applies",
  "applies_to": ["GOAL_KIND"],
  "required_terms": ["words the goal must mention"],
  "actions": [{"verb": "MOVE_TO", "target": "nearest:oak_log"}, {"verb": "USE_ITEM", "target": "axe"}]
}
"#;

const REFINE_SYSTEM_PROMPT: &str = r#"A reusable agent skill keeps failing. Revise its action sequence so it succeeds more often.
Keep the same name. Use the same JSON format as the original skill definition:
{"name": "...", "precondition": "...", "applies_to": [...], "required_terms": [...], "actions": [{"verb": "...", "target": "..."}]}
Output JSON only.
"#;
