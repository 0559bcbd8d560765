//! Gather agent context for reasoning prompts
//!
//! Builds the plain-text summaries sent as the user message: the agent's
//! vitals and threats, its goal queue, recent memories, nearby known places
//! and durable facts. Traces and failing skills get their own summaries for
//! skill generation and refinement.

use crate::core::types::{GoalId, Tick, Vec3};
use crate::goals::Goal;
use crate::memory::MemoryStore;
use crate::skills::Skill;
use crate::spatial::SpatialKnowledge;
use crate::world::WorldSnapshot;

/// Number of known places listed in a planning context
const PLACE_LINES: usize = 8;

/// Number of semantic facts listed in a planning context
const FACT_LINES: usize = 5;

/// Agent context for a replanning request
#[derive(Debug, Clone, Default)]
pub struct PlanningContext {
    pub tick: Tick,
    pub position: Vec3,
    pub health: f32,
    pub max_health: f32,
    /// "item x count" entries
    pub inventory: Vec<String>,
    /// Hostiles currently in view
    pub threats: Vec<String>,
    /// One line per live goal, active first
    pub goals: Vec<String>,
    pub recent_memories: Vec<String>,
    pub known_places: Vec<String>,
    pub facts: Vec<String>,
}

impl PlanningContext {
    /// Vitals and threats from the current snapshot
    pub fn from_snapshot(snapshot: &WorldSnapshot) -> Self {
        let inventory = snapshot
            .agent
            .inventory
            .iter()
            .map(|(item, count)| format!("{} x{}", item, count))
            .collect();

        let here = snapshot.agent.position;
        let threats = snapshot
            .nearby
            .iter()
            .filter(|e| e.hostile)
            .map(|e| format!("{} ({}) {:.0} away", e.kind, e.id, e.position.distance(&here)))
            .collect();

        Self {
            tick: snapshot.tick,
            position: here,
            health: snapshot.agent.health,
            max_health: snapshot.agent.max_health,
            inventory,
            threats,
            ..Default::default()
        }
    }

    /// Add the live goals, the active one first
    pub fn with_goals<'a>(mut self, goals: impl IntoIterator<Item = &'a Goal>, active: Option<GoalId>) -> Self {
        let mut lines: Vec<(bool, String)> = goals
            .into_iter()
            .filter(|g| g.is_live())
            .map(|g| (Some(g.id) == active, goal_line(g)))
            .collect();
        lines.sort_by_key(|(is_active, _)| !*is_active);
        self.goals = lines.into_iter().map(|(_, line)| line).collect();
        self
    }

    pub fn with_memories(mut self, memory: &MemoryStore, limit: usize) -> Self {
        self.recent_memories = memory.recent(limit).into_iter().map(|m| m.content.clone()).collect();
        self.facts = memory
            .semantic_facts()
            .iter()
            .take(FACT_LINES)
            .map(|f| f.content.clone())
            .collect();
        self
    }

    pub fn with_places(mut self, spatial: &SpatialKnowledge) -> Self {
        self.known_places = spatial.summary(self.position, PLACE_LINES);
        self
    }

    pub fn has_threats(&self) -> bool {
        !self.threats.is_empty()
    }

    /// Generate the text summary sent to the model
    pub fn summary(&self) -> String {
        let mut s = String::new();

        s.push_str(&format!("Time: Tick {}\n", self.tick));
        s.push_str(&format!("Position: {}\n", self.position));
        s.push_str(&format!("Health: {:.0}/{:.0}\n", self.health, self.max_health));

        if !self.inventory.is_empty() {
            s.push_str(&format!("Inventory: {}\n", self.inventory.join(", ")));
        }

        if !self.threats.is_empty() {
            s.push_str(&format!("\nThreats: {}\n", self.threats.join(", ")));
        }

        s.push_str("\nGoals:\n");
        if self.goals.is_empty() {
            s.push_str("- none\n");
        }
        for goal in &self.goals {
            s.push_str(&format!("- {}\n", goal));
        }

        if !self.recent_memories.is_empty() {
            s.push_str("\nRecent Memories:\n");
            for memory in &self.recent_memories {
                s.push_str(&format!("- {}\n", memory));
            }
        }

        if !self.known_places.is_empty() {
            s.push_str("\nKnown Places:\n");
            for place in &self.known_places {
                s.push_str(&format!("- {}\n", place));
            }
        }

        if !self.facts.is_empty() {
            s.push_str("\nKnown Facts:\n");
            for fact in &self.facts {
                s.push_str(&format!("- {}\n", fact));
            }
        }

        s
    }
}

fn goal_line(goal: &Goal) -> String {
    let mut line = format!(
        "{} [{:?}] {:?} p{}: {}",
        goal.id, goal.status, goal.kind, goal.priority, goal.description
    );
    if let Some(target) = &goal.target {
        line.push_str(&format!(" (target {})", target));
    }
    if goal.has_plan() {
        line.push_str(&format!(" {:.0}% done", goal.progress() * 100.0));
    }
    line
}

/// Summary of a finished goal's trace, for skill generation
pub fn describe_trace(goal: &Goal) -> String {
    let mut s = format!("Goal: {}\n", goal_line(goal));
    s.push_str(&format!("Outcome: {:?}\n", goal.status));
    s.push_str("Steps:\n");
    for record in &goal.trace {
        s.push_str(&format!(
            "- tick {}: {} -> {} ({:?})\n",
            record.tick, record.template, record.intent, record.outcome
        ));
    }
    s
}

/// Summary of a skill that keeps failing, for refinement
pub fn describe_skill(skill: &Skill, failures: &[&Goal]) -> String {
    let mut s = format!("Skill: {}\n", skill.name);
    s.push_str(&format!("Precondition: {}\n", skill.precondition));
    s.push_str(&format!(
        "Record: {} successes, {} failures (quality {:.2})\n",
        skill.success_count(),
        skill.failure_count(),
        skill.quality()
    ));
    s.push_str("Actions:\n");
    for action in &skill.actions {
        s.push_str(&format!("- {}\n", action));
    }
    for goal in failures {
        s.push_str("\nFailed attempt:\n");
        s.push_str(&describe_trace(goal));
    }
    s
}
