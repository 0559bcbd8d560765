//! Integration tests for team formation on the shared board

use arc_mind::actions::ScriptedExecutor;
use arc_mind::brain::BrainEvent;
use arc_mind::coordination::{CoordinationBoard, TeamNotice, TeamState};
use arc_mind::core::config::{CoordinationConfig, MindConfig};
use arc_mind::core::error::MindError;
use arc_mind::core::types::{AgentId, Tick};
use arc_mind::goals::{GoalKind, GoalSpec, ReplanOutcome};
use arc_mind::llm::OfflineReasoner;
use arc_mind::persistence::VolatileStore;
use arc_mind::registry::AgentRegistry;
use arc_mind::world::WorldSnapshot;
use ahash::AHashMap;
use std::sync::{Arc, Barrier};

fn wall() -> GoalSpec {
    GoalSpec::new(GoalKind::Build, 8, "build a wall")
}

/// Two agents claim the same proposal at once; exactly one leads
#[test]
fn test_leadership_race_has_one_winner() {
    let board = CoordinationBoard::new();
    let proposer = AgentId::from_name("alex");
    let team = board.propose(proposer, wall(), Vec::new(), 0).unwrap();

    let contenders = [AgentId::from_name("steve"), AgentId::from_name("sam")];
    let barrier = Barrier::new(contenders.len());
    let results: Vec<(AgentId, Result<(), MindError>)> = std::thread::scope(|scope| {
        let handles: Vec<_> = contenders
            .iter()
            .map(|agent| {
                let board = &board;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    (*agent, board.claim_leadership(team, *agent))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners: Vec<AgentId> = results.iter().filter(|(_, r)| r.is_ok()).map(|(a, _)| *a).collect();
    assert_eq!(winners.len(), 1);
    let (loser, lost) = results.iter().find(|(_, r)| r.is_err()).unwrap();
    assert!(matches!(lost, Err(MindError::AlreadyFormed(id)) if *id == team));

    board.join(team, *loser).unwrap();
    let summary = board.summary(team).unwrap();
    assert_eq!(summary.leader, Some(winners[0]));
    assert_eq!(summary.members, 2);
    assert_eq!(summary.state, TeamState::Forming);
}

#[test]
fn test_board_activates_on_quorum() {
    let board = CoordinationBoard::new();
    let alex = AgentId::from_name("alex");
    let sam = AgentId::from_name("sam");
    let tasks = vec![
        GoalSpec::new(GoalKind::Build, 8, "lay stones"),
        GoalSpec::new(GoalKind::Build, 8, "carry stones"),
    ];
    let team = board.propose(alex, wall(), tasks, 0).unwrap();
    board.claim_leadership(team, alex).unwrap();

    let config = CoordinationConfig::default();
    board.advance(1, &config).unwrap();
    assert_eq!(board.state(team), Some(TeamState::Forming));

    board.join(team, sam).unwrap();
    board.advance(2, &config).unwrap();
    assert_eq!(board.state(team), Some(TeamState::Active));

    for agent in [alex, sam] {
        let notices = board.take_notices(agent);
        assert_eq!(notices.len(), 1);
        assert!(matches!(notices[0], TeamNotice::Assigned { team: t, .. } if t == team));
    }
    assert!(matches!(board.join(team, AgentId::from_name("late")), Err(MindError::InvalidTransition { .. })));
}

/// Without quorum the team disbands after the formation timeout and members are released
#[test]
fn test_formation_timeout_disbands_team() {
    let mut config = MindConfig::default();
    config.tiers.reactive = 1;
    config.tiers.decision = 1;
    config.planner.idle_exploration = false;
    config.coordination.quorum = 3;
    config.coordination.formation_timeout_ticks = 10;
    let mut registry =
        AgentRegistry::new(config, Arc::new(OfflineReasoner), Arc::new(VolatileStore::new())).unwrap();

    let alex = registry.spawn("alex", Box::new(ScriptedExecutor::new(0))).unwrap();
    let sam = registry.spawn("sam", Box::new(ScriptedExecutor::new(0))).unwrap();
    let team = registry.propose_team(alex, wall(), Vec::new()).unwrap();

    let snapshots = |tick: Tick| -> AHashMap<AgentId, WorldSnapshot> {
        [alex, sam]
            .into_iter()
            .map(|id| (id, WorldSnapshot { tick, ..Default::default() }))
            .collect()
    };

    for tick in 1..10 {
        registry.tick_all(tick, &snapshots(tick));
        assert_eq!(registry.board().state(team), Some(TeamState::Forming));
    }
    assert_eq!(registry.get(sam).unwrap().team(), Some(team));

    registry.tick_all(10, &snapshots(10));
    assert_eq!(registry.board().state(team), Some(TeamState::Disbanded));

    let events = registry.tick_all(11, &snapshots(11));
    let cancelled = events
        .iter()
        .filter(|(_, evs)| {
            evs.iter()
                .any(|e| matches!(e, BrainEvent::Team(TeamNotice::Cancelled { team: t }) if *t == team))
        })
        .count();
    assert_eq!(cancelled, 2);
    assert_eq!(registry.get(alex).unwrap().team(), None);
    assert_eq!(registry.get(sam).unwrap().team(), None);

    // Released members replan on the next tick instead of waiting out the interval
    let events = registry.tick_all(12, &snapshots(12));
    for agent in [alex, sam] {
        let (_, evs) = events.iter().find(|(id, _)| *id == agent).unwrap();
        assert!(evs.iter().any(|e| matches!(e, BrainEvent::Replan(ReplanOutcome::Requested))));
    }
}
