//! Learning from goal outcomes
//!
//! Finished goals arrive with their full action trace. A trace that
//! matches a known skill updates that skill's record; a successful trace
//! that matches nothing becomes a skill, either through the reasoning
//! service or, when that fails, distilled directly from the trace. Skills
//! that keep failing are sent back for refinement.

use crate::actions::{ActionOutcome, ActionTemplate};
use crate::core::config::SkillConfig;
use crate::core::types::{GoalId, Tick};
use crate::goals::{Goal, GoalOutcome, GoalStatus};
use crate::llm::context::{describe_skill, describe_trace};
use crate::llm::reasoning::{
    ReasoningPurpose, ReasoningReply, ReasoningRequest, ReasoningService, ReasoningSlot, Resolved,
};
use crate::memory::{MemoryKind, MemoryStore};
use crate::skills::library::SkillLibrary;
use crate::skills::skill::{Skill, SkillSource};
use std::collections::VecDeque;

/// Importance of the provenance facts written when skills change
const PROVENANCE_IMPORTANCE: f32 = 0.8;

/// A raw trace kept as working material
#[derive(Debug, Clone)]
pub struct Experience {
    pub goal: Goal,
    pub recorded_tick: Tick,
    /// Skill the trace was credited to
    pub skill: Option<String>,
}

impl Experience {
    pub fn succeeded(&self) -> bool {
        self.goal.status == GoalStatus::Succeeded
    }
}

/// Work waiting for the reasoning service
#[derive(Debug, Clone)]
pub enum LearningTask {
    Generate(Experience),
    Refine(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LearningEvent {
    SkillUsed { skill: String, success: bool, quality: f32 },
    SkillCreated { skill: String, source: SkillSource },
    SkillRefined { skill: String, revision: u32 },
    GenerationRequested { goal: GoalId },
    RefinementRequested { skill: String },
    RequestFailed { reason: String },
}

pub struct ExperienceLearner {
    config: SkillConfig,
    timeout_ticks: u64,
    experiences: Vec<Experience>,
    queue: VecDeque<LearningTask>,
    pending: ReasoningSlot<LearningTask>,
}

impl ExperienceLearner {
    pub fn new(config: SkillConfig, timeout_ticks: u64) -> Self {
        Self {
            config,
            timeout_ticks,
            experiences: Vec::new(),
            queue: VecDeque::new(),
            pending: ReasoningSlot::new(),
        }
    }

    pub fn set_config(&mut self, config: SkillConfig, timeout_ticks: u64) {
        self.config = config;
        self.timeout_ticks = timeout_ticks;
    }

    pub fn experience_count(&self) -> usize {
        self.experiences.len()
    }

    pub fn queued_tasks(&self) -> usize {
        self.queue.len()
    }

    pub fn has_pending_request(&self) -> bool {
        self.pending.is_outstanding()
    }

    /// Credit a finished goal to a skill, or queue skill generation
    ///
    /// Cancelled goals teach nothing. A goal that failed before its first
    /// step is still charged to the skill it was bound to.
    pub fn observe(&mut self, outcome: &GoalOutcome, library: &mut SkillLibrary) -> Vec<LearningEvent> {
        let goal = &outcome.goal;
        let mut events = Vec::new();
        if goal.status == GoalStatus::Cancelled {
            return events;
        }

        let success = outcome.succeeded();
        let matched = self.match_skill(goal, library);
        if matched.is_none() && goal.trace.is_empty() {
            return events;
        }

        match &matched {
            Some(name) => {
                let recorded = if success {
                    library.record_success(name, outcome.tick)
                } else {
                    library.record_failure(name, outcome.tick)
                };
                match recorded {
                    Ok(quality) => events.push(LearningEvent::SkillUsed {
                        skill: name.clone(),
                        success,
                        quality,
                    }),
                    Err(e) => tracing::warn!(error = %e, "Could not record skill use"),
                }

                if !success && library.needs_refinement(name, &self.config) && !self.refinement_queued(name) {
                    self.queue.push_back(LearningTask::Refine(name.clone()));
                }
            }
            None if success => {
                let experience = Experience {
                    goal: goal.clone(),
                    recorded_tick: outcome.tick,
                    skill: None,
                };
                self.queue.push_back(LearningTask::Generate(experience));
            }
            None => {}
        }

        self.experiences.push(Experience {
            goal: goal.clone(),
            recorded_tick: outcome.tick,
            skill: matched,
        });
        events
    }

    /// Apply a resolved request, then issue the next queued one
    pub fn update(
        &mut self,
        tick: Tick,
        library: &mut SkillLibrary,
        memory: &mut MemoryStore,
        reasoner: &dyn ReasoningService,
    ) -> Vec<LearningEvent> {
        let mut events = Vec::new();

        if let Some(resolved) = self.pending.poll(tick, self.timeout_ticks) {
            self.apply(resolved, tick, library, memory, &mut events);
        }

        if self.pending.is_outstanding() {
            return events;
        }

        while let Some(task) = self.queue.pop_front() {
            let request = match &task {
                LearningTask::Generate(experience) => {
                    // A skill created meanwhile may already cover it
                    if self.match_skill(&experience.goal, library).is_some() {
                        continue;
                    }
                    events.push(LearningEvent::GenerationRequested { goal: experience.goal.id });
                    ReasoningRequest::new(ReasoningPurpose::GenerateSkill, describe_trace(&experience.goal))
                }
                LearningTask::Refine(name) => {
                    let Some(skill) = library.get(name) else {
                        continue;
                    };
                    let failures: Vec<&Goal> = self
                        .experiences
                        .iter()
                        .filter(|e| !e.succeeded() && e.skill.as_deref() == Some(name.as_str()))
                        .rev()
                        .take(3)
                        .map(|e| &e.goal)
                        .collect();
                    events.push(LearningEvent::RefinementRequested { skill: name.clone() });
                    ReasoningRequest::new(
                        ReasoningPurpose::RefineSkill { skill: name.clone() },
                        describe_skill(skill, &failures),
                    )
                }
            };
            self.pending.issue(reasoner, request, tick, task);
            break;
        }

        events
    }

    fn apply(
        &mut self,
        resolved: Resolved<LearningTask>,
        tick: Tick,
        library: &mut SkillLibrary,
        memory: &mut MemoryStore,
        events: &mut Vec<LearningEvent>,
    ) {
        match (resolved.context, resolved.result) {
            (LearningTask::Generate(experience), Ok(ReasoningReply::Skill(proposal))) if !proposal.actions.is_empty() => {
                let name = library.unique_name(&proposal.name);
                let mut skill = Skill::new(
                    name.clone(),
                    proposal.precondition,
                    proposal.actions,
                    SkillSource::Generated,
                    tick,
                );
                skill.applies_to = if proposal.applies_to.is_empty() {
                    vec![experience.goal.kind]
                } else {
                    proposal.applies_to
                };
                skill.required_terms = proposal.required_terms.iter().map(|t| t.to_lowercase()).collect();
                skill.seed_counts(1, 0, library.confidence_prior());
                self.create(skill, &experience, tick, library, memory, events);
            }
            (LearningTask::Generate(experience), other) => {
                let reason = failure_reason(other);
                tracing::warn!(goal = %experience.goal.id, %reason, "Skill generation failed; learning from observation");
                events.push(LearningEvent::RequestFailed { reason });
                if let Some(skill) = distill(&experience, library, tick) {
                    self.create(skill, &experience, tick, library, memory, events);
                }
            }
            (LearningTask::Refine(name), Ok(ReasoningReply::Skill(proposal))) => {
                let precondition = Some(proposal.precondition);
                match library.refine(&name, proposal.actions, precondition) {
                    Ok(revision) => {
                        memory.remember(
                            MemoryKind::Strategy,
                            format!("revised skill {} (revision {})", name, revision),
                            PROVENANCE_IMPORTANCE,
                            tick,
                        );
                        events.push(LearningEvent::SkillRefined { skill: name, revision });
                    }
                    Err(e) => events.push(LearningEvent::RequestFailed { reason: e.to_string() }),
                }
            }
            (LearningTask::Refine(name), other) => {
                let reason = failure_reason(other);
                tracing::warn!(skill = %name, %reason, "Skill refinement failed");
                events.push(LearningEvent::RequestFailed { reason });
            }
        }
    }

    fn create(
        &mut self,
        skill: Skill,
        experience: &Experience,
        tick: Tick,
        library: &mut SkillLibrary,
        memory: &mut MemoryStore,
        events: &mut Vec<LearningEvent>,
    ) {
        let name = skill.name.clone();
        let source = skill.source;
        if !library.add(skill) {
            return;
        }
        memory.remember(
            MemoryKind::Strategy,
            format!("learned skill {} from {}", name, experience.goal.description),
            PROVENANCE_IMPORTANCE,
            tick,
        );
        for stored in self.experiences.iter_mut().filter(|e| e.goal.id == experience.goal.id) {
            stored.skill = Some(name.clone());
        }
        events.push(LearningEvent::SkillCreated { skill: name, source });
    }

    /// Discard raw traces older than `max_age_ms`; skills are untouched
    pub fn cleanup_old_experiences(&mut self, max_age_ms: u64, ticks_per_second: u32, now: Tick) -> usize {
        let max_age_ticks = max_age_ms * ticks_per_second as u64 / 1000;
        let before = self.experiences.len();
        self.experiences
            .retain(|e| now.saturating_sub(e.recorded_tick) <= max_age_ticks);
        let removed = before - self.experiences.len();
        if removed > 0 {
            tracing::debug!(removed, "Old experiences pruned");
        }
        removed
    }

    /// Skill the goal ran, else the closest applicable skill by trace similarity
    fn match_skill(&self, goal: &Goal, library: &SkillLibrary) -> Option<String> {
        if let Some(name) = goal.skill.as_ref().filter(|n| library.contains(n)) {
            return Some(name.clone());
        }

        let trace = step_sequence(goal, false);
        if trace.is_empty() {
            return None;
        }
        let context = goal.context();
        library
            .iter()
            .filter(|s| s.applies_to.is_empty() || s.applies_to.contains(&context.kind))
            .map(|s| (sequence_similarity(&trace, &s.actions), s))
            .filter(|(similarity, _)| *similarity >= self.config.match_threshold)
            .max_by(|a, b| a.0.total_cmp(&b.0).then_with(|| b.1.name.cmp(&a.1.name)))
            .map(|(_, s)| s.name.clone())
    }

    fn refinement_queued(&self, name: &str) -> bool {
        let is_refine = |task: &LearningTask| matches!(task, LearningTask::Refine(n) if n == name);
        self.queue.iter().any(is_refine) || self.pending.pending().map_or(false, |p| is_refine(p.context()))
    }
}

fn failure_reason(result: crate::core::error::Result<ReasoningReply>) -> String {
    match result {
        Ok(ReasoningReply::Text(_)) => "unstructured reply".into(),
        Ok(ReasoningReply::Goal(_)) => "goal proposal in reply to a skill request".into(),
        Ok(ReasoningReply::Skill(proposal)) if proposal.actions.is_empty() => "skill without actions".into(),
        Ok(ReasoningReply::Skill(_)) => "unexpected skill".into(),
        Err(e) => e.to_string(),
    }
}

/// Templates of the trace with consecutive repeats collapsed
fn step_sequence(goal: &Goal, successful_only: bool) -> Vec<ActionTemplate> {
    let mut steps: Vec<ActionTemplate> = Vec::new();
    for record in &goal.trace {
        if successful_only && record.outcome != ActionOutcome::Succeeded {
            continue;
        }
        if steps.last() != Some(&record.template) {
            steps.push(record.template.clone());
        }
    }
    steps
}

/// Longest common subsequence length over the longer sequence's length
pub fn sequence_similarity(a: &[ActionTemplate], b: &[ActionTemplate]) -> f32 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 0.0;
    }

    let mut table = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            table[i][j] = if a[i - 1] == b[j - 1] {
                table[i - 1][j - 1] + 1
            } else {
                table[i - 1][j].max(table[i][j - 1])
            };
        }
    }
    table[a.len()][b.len()] as f32 / longest as f32
}

/// Build a skill straight from a successful trace
fn distill(experience: &Experience, library: &SkillLibrary, tick: Tick) -> Option<Skill> {
    let actions = step_sequence(&experience.goal, true);
    if actions.is_empty() {
        return None;
    }
    let goal = &experience.goal;
    let base = format!("learned_{}", format!("{:?}", goal.kind).to_lowercase());
    let mut skill = Skill::new(
        library.unique_name(&base),
        format!("observed while pursuing: {}", goal.description),
        actions,
        SkillSource::LearnedFromObservation,
        tick,
    )
    .for_kinds(&[goal.kind]);
    skill.seed_counts(1, 0, library.confidence_prior());
    Some(skill)
}
