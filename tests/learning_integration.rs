//! Integration tests for skills learned from experience

use arc_mind::actions::{ActionTemplate, ActionVerb, ScriptedExecutor};
use arc_mind::brain::{Brain, BrainEvent};
use arc_mind::core::config::MindConfig;
use arc_mind::core::types::Tick;
use arc_mind::goals::{GoalKind, GoalSpec, GoalStatus};
use arc_mind::llm::{ManualReasoner, ReasoningPurpose, ReasoningReply, SkillProposal};
use arc_mind::skills::{LearningEvent, SkillSource};
use arc_mind::world::WorldSnapshot;
use std::sync::Arc;

fn brain(reasoner: Arc<ManualReasoner>) -> Brain {
    let mut config = MindConfig::default();
    config.tiers.reactive = 1;
    config.tiers.decision = 1;
    config.planner.idle_exploration = false;
    Brain::builder("alex", Arc::new(config))
        .executor(Box::new(ScriptedExecutor::new(0)))
        .reasoner(reasoner)
        .build(0)
}

fn run(brain: &mut Brain, ticks: std::ops::RangeInclusive<Tick>) -> Vec<BrainEvent> {
    ticks
        .flat_map(|tick| brain.on_tick(&WorldSnapshot { tick, ..Default::default() }))
        .collect()
}

#[test]
fn test_uncovered_success_generates_skill_used_next_time() {
    let reasoner = Arc::new(ManualReasoner::new());
    let mut brain = brain(Arc::clone(&reasoner));
    let first = brain.add_goal(GoalSpec::new(GoalKind::Build, 4, "build a hut"), 0);

    let events = run(&mut brain, 1..=5);
    assert!(events.iter().any(|e| matches!(
        e,
        BrainEvent::GoalFinished { goal, status: GoalStatus::Succeeded, .. } if *goal == first
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        BrainEvent::Learning(LearningEvent::GenerationRequested { goal }) if *goal == first
    )));
    assert_eq!(reasoner.requests()[0].purpose, ReasoningPurpose::GenerateSkill);

    assert!(reasoner.respond_next(ReasoningReply::Skill(SkillProposal {
        name: "build_with_planks".into(),
        precondition: "planks in the inventory".into(),
        applies_to: Vec::new(),
        required_terms: Vec::new(),
        actions: vec![ActionTemplate::new(ActionVerb::UseItem, "planks")],
    })));
    let events = run(&mut brain, 6..=6);
    assert!(events.iter().any(|e| matches!(
        e,
        BrainEvent::Learning(LearningEvent::SkillCreated { skill, source: SkillSource::Generated })
            if skill == "build_with_planks"
    )));

    let learned = brain.skills().get("build_with_planks").unwrap();
    assert_eq!(learned.applies_to, vec![GoalKind::Build]);
    assert_eq!(learned.success_count(), 1);

    let second = brain.add_goal(GoalSpec::new(GoalKind::Build, 4, "build a shed"), 7);
    let events = run(&mut brain, 7..=12);
    assert!(events.iter().any(|e| matches!(
        e,
        BrainEvent::PlanBound { goal, skill: Some(skill), .. } if *goal == second && skill == "build_with_planks"
    )));
    assert_eq!(brain.skills().get("build_with_planks").unwrap().success_count(), 2);
    assert_eq!(reasoner.pending_count(), 0);
}

/// A failed generation request still yields a skill distilled from the trace
#[test]
fn test_failed_generation_learns_from_observation() {
    let reasoner = Arc::new(ManualReasoner::new());
    let mut brain = brain(Arc::clone(&reasoner));
    brain.add_goal(GoalSpec::new(GoalKind::Build, 4, "build a hut"), 0);
    run(&mut brain, 1..=5);

    assert!(reasoner.fail_next("model unavailable"));
    let events = run(&mut brain, 6..=6);

    let created: Vec<(&String, &SkillSource)> = events
        .iter()
        .filter_map(|e| match e {
            BrainEvent::Learning(LearningEvent::SkillCreated { skill, source }) => Some((skill, source)),
            _ => None,
        })
        .collect();
    assert_eq!(created.len(), 1);
    assert_eq!(*created[0].1, SkillSource::LearnedFromObservation);
    assert!(brain.skills().get(created[0].0).is_some());
}
