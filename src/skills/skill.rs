//! Reusable behavior templates and their quality score

use crate::actions::ActionTemplate;
use crate::core::types::Tick;
use crate::goals::{GoalContext, GoalKind};
use serde::{Deserialize, Serialize};

/// Where a skill came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillSource {
    Authored,
    Generated,
    LearnedFromObservation,
    Composed,
}

/// Quality from cumulative outcomes
///
/// Laplace-style estimate: `prior` pseudo-uses at a 50% success rate are
/// blended with the observed counts, so few uses stay near 0.5 and many
/// uses converge on the observed rate. Non-decreasing in `successes`,
/// non-increasing in `failures`.
pub fn quality_score(successes: u32, failures: u32, prior: f32) -> f32 {
    let s = successes as f32;
    let total = s + failures as f32 + prior;
    if total <= 0.0 {
        return 0.5;
    }
    (s + prior * 0.5) / total
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub precondition: String,
    /// Goal kinds the skill serves (empty = any)
    #[serde(default)]
    pub applies_to: Vec<GoalKind>,
    /// Words that must appear in the goal's description or target
    #[serde(default)]
    pub required_terms: Vec<String>,
    pub actions: Vec<ActionTemplate>,
    pub source: SkillSource,
    pub created_tick: Tick,
    #[serde(default)]
    pub last_used_tick: Option<Tick>,
    /// Bumped on every refinement
    #[serde(default)]
    pub revision: u32,
    success_count: u32,
    failure_count: u32,
    #[serde(default)]
    quality: f32,
}

impl Skill {
    pub fn new(
        name: impl Into<String>,
        precondition: impl Into<String>,
        actions: Vec<ActionTemplate>,
        source: SkillSource,
        tick: Tick,
    ) -> Self {
        Self {
            name: name.into(),
            precondition: precondition.into(),
            applies_to: Vec::new(),
            required_terms: Vec::new(),
            actions,
            source,
            created_tick: tick,
            last_used_tick: None,
            revision: 0,
            success_count: 0,
            failure_count: 0,
            quality: 0.5,
        }
    }

    pub fn for_kinds(mut self, kinds: &[GoalKind]) -> Self {
        self.applies_to = kinds.to_vec();
        self
    }

    pub fn requiring(mut self, terms: &[&str]) -> Self {
        self.required_terms = terms.iter().map(|t| t.to_lowercase()).collect();
        self
    }

    pub fn success_count(&self) -> u32 {
        self.success_count
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn uses(&self) -> u32 {
        self.success_count + self.failure_count
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    pub fn failure_rate(&self) -> f32 {
        if self.uses() == 0 {
            return 0.0;
        }
        self.failure_count as f32 / self.uses() as f32
    }

    /// Record one use and recompute quality
    pub fn record(&mut self, success: bool, tick: Tick, prior: f32) {
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.last_used_tick = Some(tick);
        self.recompute(prior);
    }

    pub(crate) fn seed_counts(&mut self, successes: u32, failures: u32, prior: f32) {
        self.success_count = successes;
        self.failure_count = failures;
        self.recompute(prior);
    }

    pub(crate) fn recompute(&mut self, prior: f32) {
        self.quality = quality_score(self.success_count, self.failure_count, prior);
    }

    /// Kind matches and every required term appears in the goal text
    pub fn matches(&self, context: &GoalContext) -> bool {
        if !self.applies_to.is_empty() && !self.applies_to.contains(&context.kind) {
            return false;
        }
        let text = context.text().to_lowercase();
        self.required_terms.iter().all(|term| text.contains(term.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionVerb;

    fn context(kind: GoalKind, description: &str, target: Option<&str>) -> GoalContext {
        GoalContext {
            kind,
            description: description.into(),
            target: target.map(Into::into),
        }
    }

    #[test]
    fn test_quality_starts_neutral() {
        assert_eq!(quality_score(0, 0, 4.0), 0.5);
        assert_eq!(quality_score(0, 0, 0.0), 0.5);
    }

    #[test]
    fn test_more_uses_more_confidence() {
        // Same 80% rate, more evidence
        assert!(quality_score(8, 2, 4.0) > quality_score(4, 1, 4.0));
        assert!(quality_score(80, 20, 4.0) > quality_score(8, 2, 4.0));
    }

    #[test]
    fn test_record_recomputes() {
        let mut skill = Skill::new("x", "", vec![ActionTemplate::bare(ActionVerb::Stop)], SkillSource::Authored, 0);
        skill.record(true, 5, 4.0);
        skill.record(false, 6, 4.0);
        assert_eq!(skill.uses(), 2);
        assert_eq!(skill.last_used_tick, Some(6));
        assert_eq!(skill.quality(), quality_score(1, 1, 4.0));
        assert_eq!(skill.failure_rate(), 0.5);
    }

    #[test]
    fn test_matching_by_kind_and_terms() {
        let skill = Skill::new("chop", "", vec![], SkillSource::Authored, 0)
            .for_kinds(&[GoalKind::ResourceGathering])
            .requiring(&["log"]);

        assert!(skill.matches(&context(GoalKind::ResourceGathering, "collect wood", Some("oak_log"))));
        assert!(!skill.matches(&context(GoalKind::ResourceGathering, "collect stone", None)));
        assert!(!skill.matches(&context(GoalKind::Combat, "collect logs", None)));
    }
}
