//! Per-agent skill catalog
//!
//! Skills are keyed by name. They are never dropped for being bad: a
//! failing skill sinks in the applicability ranking and may be refined,
//! but its history stays.

use crate::actions::{ActionTemplate, ActionVerb};
use crate::core::config::SkillConfig;
use crate::core::error::{MindError, Result};
use crate::core::types::{AgentId, Tick};
use crate::goals::{GoalContext, GoalKind};
use crate::persistence::{self, DataKind, Persistence};
use crate::skills::skill::{Skill, SkillSource};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct SkillLibrary {
    skills: BTreeMap<String, Skill>,
    confidence_prior: f32,
}

impl SkillLibrary {
    pub fn new(confidence_prior: f32) -> Self {
        Self {
            skills: BTreeMap::new(),
            confidence_prior,
        }
    }

    /// Library seeded with the authored starter skills
    pub fn with_defaults(confidence_prior: f32, tick: Tick) -> Self {
        let mut library = Self::new(confidence_prior);
        for skill in default_skills(tick) {
            library.add(skill);
        }
        library
    }

    pub fn set_confidence_prior(&mut self, prior: f32) {
        self.confidence_prior = prior;
        for skill in self.skills.values_mut() {
            skill.recompute(prior);
        }
    }

    pub fn confidence_prior(&self) -> f32 {
        self.confidence_prior
    }

    /// Insert a new skill; false if the name is taken or it has no actions
    pub fn add(&mut self, mut skill: Skill) -> bool {
        if self.skills.contains_key(&skill.name) {
            return false;
        }
        if skill.actions.is_empty() {
            tracing::warn!(skill = %skill.name, "Skill without actions rejected");
            return false;
        }
        skill.recompute(self.confidence_prior);
        tracing::info!(skill = %skill.name, source = ?skill.source, steps = skill.actions.len(), "Skill added");
        self.skills.insert(skill.name.clone(), skill);
        true
    }

    /// First free name of the form `base`, `base_2`, `base_3`, ...
    pub fn unique_name(&self, base: &str) -> String {
        if !self.skills.contains_key(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{}_{}", base, n))
            .find(|name| !self.skills.contains_key(name))
            .unwrap_or_else(|| base.to_string())
    }

    pub fn get(&self, name: &str) -> Option<&Skill> {
        self.skills.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.skills.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Skill> {
        self.skills.values()
    }

    /// Skills whose precondition matches, best quality first
    pub fn find_applicable(&self, context: &GoalContext) -> Vec<&Skill> {
        let mut applicable: Vec<&Skill> = self.skills.values().filter(|s| s.matches(context)).collect();
        applicable.sort_by(|a, b| {
            b.quality()
                .total_cmp(&a.quality())
                .then_with(|| b.uses().cmp(&a.uses()))
                .then_with(|| a.name.cmp(&b.name))
        });
        applicable
    }

    pub fn record_success(&mut self, name: &str, tick: Tick) -> Result<f32> {
        self.record(name, true, tick)
    }

    pub fn record_failure(&mut self, name: &str, tick: Tick) -> Result<f32> {
        self.record(name, false, tick)
    }

    fn record(&mut self, name: &str, success: bool, tick: Tick) -> Result<f32> {
        let prior = self.confidence_prior;
        let skill = self
            .skills
            .get_mut(name)
            .ok_or_else(|| MindError::SkillNotFound(name.to_string()))?;
        skill.record(success, tick, prior);
        tracing::debug!(skill = name, success, quality = skill.quality(), "Skill use recorded");
        Ok(skill.quality())
    }

    /// Failure rate is past the threshold and backed by enough uses
    pub fn needs_refinement(&self, name: &str, config: &SkillConfig) -> bool {
        self.skills.get(name).map_or(false, |s| {
            s.uses() >= config.min_uses_for_refinement && s.failure_rate() > config.refinement_failure_rate
        })
    }

    /// Replace a skill's action sequence, keeping its history
    pub fn refine(&mut self, name: &str, actions: Vec<ActionTemplate>, precondition: Option<String>) -> Result<u32> {
        if actions.is_empty() {
            return Err(MindError::EmptySkill(name.to_string()));
        }
        let skill = self
            .skills
            .get_mut(name)
            .ok_or_else(|| MindError::SkillNotFound(name.to_string()))?;
        skill.actions = actions;
        if let Some(precondition) = precondition.filter(|p| !p.trim().is_empty()) {
            skill.precondition = precondition;
        }
        skill.revision += 1;
        tracing::info!(skill = name, revision = skill.revision, "Skill refined");
        Ok(skill.revision)
    }

    /// Build a skill that runs existing skills back to back
    pub fn compose(&mut self, name: &str, parts: &[&str], tick: Tick) -> Result<&Skill> {
        let mut actions = Vec::new();
        let mut applies_to: Vec<GoalKind> = Vec::new();
        for part in parts {
            let skill = self
                .skills
                .get(*part)
                .ok_or_else(|| MindError::SkillNotFound(part.to_string()))?;
            actions.extend(skill.actions.iter().cloned());
            for kind in &skill.applies_to {
                if !applies_to.contains(kind) {
                    applies_to.push(*kind);
                }
            }
        }
        if actions.is_empty() {
            return Err(MindError::EmptySkill(name.to_string()));
        }

        let name = self.unique_name(name);
        let precondition = format!("composed of {}", parts.join(" + "));
        let skill = Skill::new(name.clone(), precondition, actions, SkillSource::Composed, tick).for_kinds(&applies_to);
        self.add(skill);
        self.skills
            .get(&name)
            .ok_or_else(|| MindError::SkillNotFound(name.clone()))
    }

    pub fn save(&self, store: &dyn Persistence, agent: AgentId) -> Result<()> {
        let skills: Vec<&Skill> = self.skills.values().collect();
        persistence::save_json(store, agent, DataKind::Skills, &skills)
    }

    /// Hydrate from storage; absent or corrupted data yields the defaults
    pub fn load(store: &dyn Persistence, agent: AgentId, confidence_prior: f32, tick: Tick) -> Self {
        let mut skills: Vec<Skill> = persistence::load_json(store, agent, DataKind::Skills);
        let stored = skills.len();
        skills.retain(|s| !s.actions.is_empty());
        if skills.len() < stored {
            tracing::warn!(%agent, dropped = stored - skills.len(), "Stored skills without actions dropped");
        }
        if skills.is_empty() {
            return Self::with_defaults(confidence_prior, tick);
        }

        let mut library = Self::new(confidence_prior);
        for mut skill in skills {
            skill.recompute(confidence_prior);
            library.skills.insert(skill.name.clone(), skill);
        }
        tracing::info!(%agent, skills = library.len(), "Skills loaded");
        library
    }
}

/// Authored starter skills
fn default_skills(tick: Tick) -> Vec<Skill> {
    use ActionVerb::*;
    vec![
        Skill::new(
            "gather_resource",
            "a known resource of the target type",
            vec![
                ActionTemplate::new(MoveTo, "nearest:$target"),
                ActionTemplate::new(UseItem, "$target"),
            ],
            SkillSource::Authored,
            tick,
        )
        .for_kinds(&[GoalKind::ResourceGathering]),
        Skill::new(
            "fight_hostile",
            "a hostile in view",
            vec![ActionTemplate::new(MoveTo, "hostile"), ActionTemplate::new(Attack, "hostile")],
            SkillSource::Authored,
            tick,
        )
        .for_kinds(&[GoalKind::Combat]),
        Skill::new(
            "retreat_and_eat",
            "food in the inventory",
            vec![ActionTemplate::new(MoveTo, "away"), ActionTemplate::new(UseItem, "bread")],
            SkillSource::Authored,
            tick,
        )
        .for_kinds(&[GoalKind::Survival])
        .requiring(&["eat"]),
        Skill::new(
            "scout_ahead",
            "open ground ahead",
            vec![ActionTemplate::new(MoveTo, "ahead"), ActionTemplate::new(MoveTo, "ahead")],
            SkillSource::Authored,
            tick,
        )
        .for_kinds(&[GoalKind::Exploration]),
        Skill::new(
            "visit_landmark",
            "the target is a known landmark",
            vec![ActionTemplate::new(MoveTo, "$target")],
            SkillSource::Authored,
            tick,
        )
        .for_kinds(&[GoalKind::Social, GoalKind::Exploration])
        .requiring(&["visit"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::VolatileStore;

    fn context(kind: GoalKind, description: &str) -> GoalContext {
        GoalContext {
            kind,
            description: description.into(),
            target: None,
        }
    }

    fn stop_skill(name: &str) -> Skill {
        Skill::new(name, "", vec![ActionTemplate::bare(ActionVerb::Stop)], SkillSource::Authored, 0)
            .for_kinds(&[GoalKind::Build])
    }

    #[test]
    fn test_applicable_sorted_by_quality() {
        let mut library = SkillLibrary::new(4.0);
        library.add(stop_skill("good"));
        library.add(stop_skill("bad"));
        for tick in 0..5 {
            library.record_success("good", tick).unwrap();
            library.record_failure("bad", tick).unwrap();
        }

        let names: Vec<&str> = library
            .find_applicable(&context(GoalKind::Build, "build"))
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["good", "bad"]);
    }

    #[test]
    fn test_failing_skill_kept() {
        let mut library = SkillLibrary::new(4.0);
        library.add(stop_skill("bad"));
        for tick in 0..20 {
            library.record_failure("bad", tick).unwrap();
        }
        assert!(library.contains("bad"));
        assert!(library.needs_refinement("bad", &SkillConfig::default()));
    }

    #[test]
    fn test_refinement_needs_enough_uses() {
        let mut library = SkillLibrary::new(4.0);
        library.add(stop_skill("new"));
        library.record_failure("new", 0).unwrap();
        assert!(!library.needs_refinement("new", &SkillConfig::default()));
    }

    #[test]
    fn test_refine_keeps_history() {
        let mut library = SkillLibrary::new(4.0);
        library.add(stop_skill("x"));
        library.record_failure("x", 1).unwrap();

        let revision = library
            .refine("x", vec![ActionTemplate::new(ActionVerb::UseItem, "planks")], None)
            .unwrap();
        let skill = library.get("x").unwrap();
        assert_eq!(revision, 1);
        assert_eq!(skill.failure_count(), 1);
        assert_eq!(skill.actions[0].verb, ActionVerb::UseItem);
    }

    #[test]
    fn test_add_does_not_overwrite() {
        let mut library = SkillLibrary::new(4.0);
        assert!(library.add(stop_skill("x")));
        assert!(!library.add(stop_skill("x")));
        assert_eq!(library.unique_name("x"), "x_2");
    }

    #[test]
    fn test_compose() {
        let mut library = SkillLibrary::with_defaults(4.0, 0);
        let composed = library.compose("gather_then_fight", &["gather_resource", "fight_hostile"], 7).unwrap();
        assert_eq!(composed.actions.len(), 4);
        assert_eq!(composed.source, SkillSource::Composed);
        assert!(composed.applies_to.contains(&GoalKind::Combat));

        assert!(matches!(
            library.compose("broken", &["missing"], 8),
            Err(MindError::SkillNotFound(_))
        ));
        assert!(matches!(library.compose("nothing", &[], 9), Err(MindError::EmptySkill(_))));
        assert!(!library.contains("nothing"));
    }

    #[test]
    fn test_skill_without_actions_rejected() {
        let mut library = SkillLibrary::new(4.0);
        let empty = Skill::new("noop", "", vec![], SkillSource::Authored, 0);
        assert!(!library.add(empty));
        assert!(!library.contains("noop"));

        library.add(stop_skill("x"));
        assert!(matches!(library.refine("x", vec![], None), Err(MindError::EmptySkill(_))));
        assert_eq!(library.get("x").unwrap().actions.len(), 1);
        assert_eq!(library.get("x").unwrap().revision, 0);
    }

    #[test]
    fn test_save_load_round_trip() {
        let store = VolatileStore::new();
        let agent = AgentId::from_name("steve");

        let mut library = SkillLibrary::with_defaults(4.0, 0);
        library.record_success("fight_hostile", 3).unwrap();
        library.save(&store, agent).unwrap();

        let restored = SkillLibrary::load(&store, agent, 4.0, 10);
        assert_eq!(restored.len(), library.len());
        assert_eq!(restored.get("fight_hostile").unwrap().success_count(), 1);
    }

    #[test]
    fn test_corrupted_skills_load_defaults() {
        let store = VolatileStore::new();
        let agent = AgentId::from_name("steve");
        store.put_raw(agent, DataKind::Skills, "[{\"name\": 5}]");

        let library = SkillLibrary::load(&store, agent, 4.0, 0);
        assert!(library.contains("gather_resource"));
    }

    #[test]
    fn test_load_drops_skills_without_actions() {
        let store = VolatileStore::new();
        let agent = AgentId::from_name("steve");
        let stored = vec![stop_skill("halt"), Skill::new("noop", "", vec![], SkillSource::Authored, 0)];
        store.put_raw(agent, DataKind::Skills, &serde_json::to_string(&stored).unwrap());

        let library = SkillLibrary::load(&store, agent, 4.0, 0);
        assert!(library.contains("halt"));
        assert!(!library.contains("noop"));

        let only_empty = vec![Skill::new("noop", "", vec![], SkillSource::Authored, 0)];
        store.put_raw(agent, DataKind::Skills, &serde_json::to_string(&only_empty).unwrap());
        let library = SkillLibrary::load(&store, agent, 4.0, 0);
        assert!(library.contains("gather_resource"));
        assert!(!library.contains("noop"));
    }
}
