//! Inbound task requests - converts what an external actor asked for into a goal
//!
//! Natural-language requests are classified by keyword; anything more
//! elaborate is left to the planner's next replan.

use crate::goals::{GoalKind, GoalOrigin, GoalSpec};

/// A task submitted by someone other than the agent itself
#[derive(Debug, Clone, PartialEq)]
pub enum TaskRequest {
    NaturalLanguage(String),
    Structured(GoalSpec),
}

/// Keyword table checked in order; the first hit decides the goal kind
const KEYWORDS: &[(GoalKind, &[&str])] = &[
    (GoalKind::Survival, &["eat", "heal", "flee", "hide", "survive", "rest"]),
    (GoalKind::Combat, &["attack", "fight", "kill", "defend", "guard"]),
    (GoalKind::Build, &["build", "craft", "construct", "place"]),
    (GoalKind::ResourceGathering, &["gather", "collect", "mine", "chop", "harvest", "get", "fetch"]),
    (GoalKind::Social, &["visit", "meet", "follow", "help", "come", "go"]),
    (GoalKind::Exploration, &["explore", "scout", "search", "wander", "look"]),
];

/// Words skipped when picking a target after a verb
const FILLER: &[&str] = &["a", "an", "the", "some", "me", "to", "at", "for", "more", "of", "us"];

impl TaskRequest {
    /// Turn the request into a goal owned by `actor` at `priority`
    ///
    /// Structured requests keep their own kind, description and target but
    /// always take the request priority and origin.
    pub fn into_goal_spec(self, actor: &str, priority: i32) -> GoalSpec {
        let origin = GoalOrigin::RequestedBy(actor.to_string());
        match self {
            TaskRequest::Structured(mut spec) => {
                spec.priority = priority;
                spec.with_origin(origin)
            }
            TaskRequest::NaturalLanguage(text) => {
                let (kind, target) = classify(&text);
                let mut spec = GoalSpec::new(kind, priority, text.trim()).with_origin(origin);
                spec.target = target;
                spec
            }
        }
    }
}

/// Goal kind and optional target for a free-text request
pub fn classify(text: &str) -> (GoalKind, Option<String>) {
    let words: Vec<String> = text
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();

    for (kind, verbs) in KEYWORDS {
        if let Some(at) = words.iter().position(|w| verbs.contains(&w.as_str())) {
            let target = match kind {
                GoalKind::ResourceGathering | GoalKind::Social => words[at + 1..]
                    .iter()
                    .find(|w| !FILLER.contains(&w.as_str()))
                    .cloned(),
                _ => None,
            };
            return (*kind, target);
        }
    }
    (GoalKind::Exploration, None)
}
