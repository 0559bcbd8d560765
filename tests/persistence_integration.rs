//! Integration tests for learned state surviving a restart

use arc_mind::actions::ScriptedExecutor;
use arc_mind::brain::{Brain, BrainEvent};
use arc_mind::core::config::MindConfig;
use arc_mind::core::error::{MindError, Result};
use arc_mind::core::types::{AgentId, Vec3};
use arc_mind::goals::{GoalKind, GoalSpec};
use arc_mind::llm::ManualReasoner;
use arc_mind::persistence::{DataKind, FileStore, Persistence};
use arc_mind::spatial::PlaceKind;
use arc_mind::world::WorldSnapshot;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn config() -> Arc<MindConfig> {
    let mut config = MindConfig::default();
    config.tiers.reactive = 1;
    config.tiers.decision = 1;
    config.planner.idle_exploration = false;
    Arc::new(config)
}

fn brain(store: &Arc<FileStore>) -> Brain {
    let persistence: Arc<dyn Persistence> = store.clone();
    Brain::builder("steve", config())
        .executor(Box::new(ScriptedExecutor::new(0)))
        .reasoner(Arc::new(ManualReasoner::new()))
        .persistence(persistence)
        .build(0)
}

#[test]
fn test_knowledge_and_skills_survive_rebuild() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileStore::new(dir.path()));

    let mut first = brain(&store);
    first.spatial_mut().add_landmark("home", "base", Vec3::new(10.0, 64.0, -3.0), 0);
    let home_visits = first.spatial_mut().add_landmark("home", "base", Vec3::new(10.0, 64.0, -3.0), 2);
    first.spatial_mut().add_resource("iron_ore", Vec3::new(4.0, 12.0, 8.0), 0);
    first.add_goal(GoalSpec::new(GoalKind::Exploration, 3, "look around"), 0);
    for tick in 1..=10 {
        first.on_tick(&WorldSnapshot { tick, ..Default::default() });
    }
    let scout_successes = first.skills().get("scout_ahead").unwrap().success_count();
    assert!(scout_successes > 0);
    first.force_save().unwrap();
    drop(first);

    let second = brain(&store);
    let home = second.spatial().find_landmark("home").unwrap();
    assert_eq!(home.position, Vec3::new(10.0, 64.0, -3.0));
    assert_eq!(home.category, "base");
    assert_eq!(home.visits, home_visits);
    assert_eq!(second.spatial().count(PlaceKind::Resource), 1);
    assert_eq!(second.skills().get("scout_ahead").unwrap().success_count(), scout_successes);
}

#[test]
fn test_corrupted_files_fall_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let agent_dir = dir.path().join(AgentId::from_name("steve").to_string());
    fs::create_dir_all(&agent_dir).unwrap();
    fs::write(agent_dir.join("spatial.json"), "{ not json").unwrap();
    fs::write(agent_dir.join("skills.json"), "[[[").unwrap();
    fs::write(agent_dir.join("semantic_memory.json"), "null?").unwrap();

    let store = Arc::new(FileStore::new(dir.path()));
    let brain = brain(&store);

    assert!(brain.spatial().is_empty());
    assert!(brain.skills().contains("scout_ahead"));
    assert!(brain.memory().is_empty());
}

#[test]
fn test_shutdown_writes_every_kind() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileStore::new(dir.path()));

    let mut brain = brain(&store);
    brain.shutdown(1).unwrap();

    let agent_dir = dir.path().join(AgentId::from_name("steve").to_string());
    for stem in ["skills", "spatial", "semantic_memory"] {
        assert!(agent_dir.join(format!("{}.json", stem)).exists(), "{} missing", stem);
    }
}

/// Store whose disk is always full
#[derive(Default)]
struct FullDisk {
    attempts: AtomicUsize,
}

impl Persistence for FullDisk {
    fn save(&self, _agent: AgentId, _kind: DataKind, _payload: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(MindError::Persistence("disk full".into()))
    }

    fn load(&self, _agent: AgentId, _kind: DataKind) -> Option<String> {
        None
    }
}

#[test]
fn test_save_failure_reported_and_ticking_continues() {
    let mut config = MindConfig::default();
    config.tiers.reactive = 1;
    config.tiers.decision = 1;
    config.tiers.persistence = 5;
    config.planner.idle_exploration = false;

    let store = Arc::new(FullDisk::default());
    let persistence: Arc<dyn Persistence> = store.clone();
    let mut brain = Brain::builder("steve", Arc::new(config))
        .executor(Box::new(ScriptedExecutor::new(0)))
        .reasoner(Arc::new(ManualReasoner::new()))
        .persistence(persistence)
        .build(0);
    brain.add_goal(GoalSpec::new(GoalKind::Exploration, 3, "look around"), 0);

    let mut failed_ticks = Vec::new();
    let mut decision_ticks = Vec::new();
    for tick in 1..=12 {
        for event in brain.on_tick(&WorldSnapshot { tick, ..Default::default() }) {
            match event {
                BrainEvent::PersistenceFailed { error, .. } => {
                    assert!(error.contains("disk full"));
                    failed_ticks.push(tick);
                }
                BrainEvent::Saved => panic!("nothing can be saved at tick {}", tick),
                BrainEvent::DecisionEvaluated { .. } => decision_ticks.push(tick),
                _ => {}
            }
        }
    }

    // Three kinds fail on each of ticks 5 and 10
    assert_eq!(failed_ticks, vec![5, 5, 5, 10, 10, 10]);
    assert_eq!(store.attempts.load(Ordering::SeqCst), 6);
    assert_eq!(decision_ticks, (1..=12).collect::<Vec<_>>());
    assert!(brain.skills().get("scout_ahead").unwrap().success_count() > 0);
}
