//! Decision scheduler - one agent's tick loop
//!
//! Each host tick runs, in order:
//! executor poll -> perception (reactive tier) -> decision tier ->
//! planning tier (inside the planner) -> learning -> team notices ->
//! persistence tier -> cleanup tier
//!
//! Only the decision tier issues intents, and at most one per tick.
//! Nothing here blocks: reasoning replies are picked up by the planner and
//! the learner on whichever tick they arrive.

pub mod events;
pub mod pursuit;
pub mod scheduler;

pub use events::{ActiveGoalStatus, BrainEvent, BrainStatus};
pub use pursuit::Reaction;
pub use scheduler::{assess_urgency, DueTiers, Tier, TierCounters, UrgencyReason};

use crate::actions::{ActionExecutor, ActionOutcome, ActionRecord, ActionStatus, ActionTemplate, Intent, ScriptedExecutor};
use crate::command::TaskRequest;
use crate::coordination::{task_origin, CoordinationBoard, TeamNotice};
use crate::core::config::MindConfig;
use crate::core::error::{MindError, Result};
use crate::core::types::{AgentId, GoalId, SharedGoalId, Tick};
use crate::goals::{GoalOrigin, GoalPlanner, GoalSpec, GoalStatus};
use crate::llm::{OfflineReasoner, ReasoningService};
use crate::memory::{MemoryKind, MemoryStore};
use crate::persistence::{DataKind, Persistence, VolatileStore};
use crate::skills::{ExperienceLearner, SkillLibrary};
use crate::spatial::{PlaceKind, SpatialKnowledge};
use crate::world::WorldSnapshot;
use ahash::AHashSet;
use std::sync::Arc;

/// Importance of a goal-outcome event in episodic memory
const SUCCESS_IMPORTANCE: f32 = 0.5;
const FAILURE_IMPORTANCE: f32 = 0.75;
const HOSTILE_SIGHTING_IMPORTANCE: f32 = 0.6;
const RESOURCE_SIGHTING_IMPORTANCE: f32 = 0.4;
const TEAM_EVENT_IMPORTANCE: f32 = 0.7;

/// Who the current intent belongs to
#[derive(Debug, Clone)]
enum ActionSource {
    Reaction(Reaction),
    Goal { goal: GoalId, template: ActionTemplate },
}

#[derive(Debug, Clone)]
struct CurrentAction {
    intent: Intent,
    source: ActionSource,
    issued_tick: Tick,
}

pub struct Brain {
    id: AgentId,
    name: String,
    config: Arc<MindConfig>,
    counters: TierCounters,
    planner: GoalPlanner,
    memory: MemoryStore,
    spatial: SpatialKnowledge,
    skills: SkillLibrary,
    learner: ExperienceLearner,
    executor: Box<dyn ActionExecutor>,
    reasoner: Arc<dyn ReasoningService>,
    persistence: Arc<dyn Persistence>,
    board: Option<Arc<CoordinationBoard>>,
    current: Option<CurrentAction>,
    last_health: Option<f32>,
    last_tick: Tick,
    team: Option<SharedGoalId>,
    /// Hostile ids seen by the last perception pass
    visible_hostiles: AHashSet<String>,
}

/// Wires a brain to its collaborators and hydrates persisted state
pub struct BrainBuilder {
    name: String,
    config: Arc<MindConfig>,
    executor: Option<Box<dyn ActionExecutor>>,
    reasoner: Option<Arc<dyn ReasoningService>>,
    persistence: Option<Arc<dyn Persistence>>,
    board: Option<Arc<CoordinationBoard>>,
}

impl BrainBuilder {
    pub fn new(name: impl Into<String>, config: Arc<MindConfig>) -> Self {
        Self {
            name: name.into(),
            config,
            executor: None,
            reasoner: None,
            persistence: None,
            board: None,
        }
    }

    pub fn executor(mut self, executor: Box<dyn ActionExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn reasoner(mut self, reasoner: Arc<dyn ReasoningService>) -> Self {
        self.reasoner = Some(reasoner);
        self
    }

    pub fn persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn board(mut self, board: Arc<CoordinationBoard>) -> Self {
        self.board = Some(board);
        self
    }

    /// Build the brain, loading skills, spatial knowledge and semantic memory
    ///
    /// Missing collaborators default to an instant scripted executor, an
    /// offline reasoner and a volatile store.
    pub fn build(self, tick: Tick) -> Brain {
        let id = AgentId::from_name(&self.name);
        let config = self.config;
        let persistence: Arc<dyn Persistence> = self.persistence.unwrap_or_else(|| Arc::new(VolatileStore::new()));

        let skills = SkillLibrary::load(persistence.as_ref(), id, config.skills.confidence_prior, tick);
        let spatial = SpatialKnowledge::load(persistence.as_ref(), id);
        let mut memory = MemoryStore::new(config.memory.clone());
        memory.load(persistence.as_ref(), id, tick);

        tracing::info!(
            agent = %id,
            name = %self.name,
            skills = skills.len(),
            places = spatial.len(),
            facts = memory.semantic_facts().len(),
            "Brain ready"
        );

        Brain {
            id,
            name: self.name,
            counters: TierCounters::new(config.tiers.clone(), config.urgency.urgent_decision_interval),
            planner: GoalPlanner::new(config.planner.clone(), config.tiers.planning),
            learner: ExperienceLearner::new(config.skills.clone(), config.planner.reasoning_timeout_ticks),
            memory,
            spatial,
            skills,
            executor: self.executor.unwrap_or_else(|| Box::new(ScriptedExecutor::new(0))),
            reasoner: self.reasoner.unwrap_or_else(|| Arc::new(OfflineReasoner)),
            persistence,
            board: self.board,
            config,
            current: None,
            last_health: None,
            last_tick: tick,
            team: None,
            visible_hostiles: AHashSet::new(),
        }
    }
}

impl Brain {
    pub fn builder(name: impl Into<String>, config: Arc<MindConfig>) -> BrainBuilder {
        BrainBuilder::new(name, config)
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &MindConfig {
        &self.config
    }

    pub fn planner(&self) -> &GoalPlanner {
        &self.planner
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn spatial(&self) -> &SpatialKnowledge {
        &self.spatial
    }

    pub fn spatial_mut(&mut self) -> &mut SpatialKnowledge {
        &mut self.spatial
    }

    pub fn skills(&self) -> &SkillLibrary {
        &self.skills
    }

    pub fn learner(&self) -> &ExperienceLearner {
        &self.learner
    }

    pub fn team(&self) -> Option<SharedGoalId> {
        self.team
    }

    pub fn current_intent(&self) -> Option<&Intent> {
        self.current.as_ref().map(|c| &c.intent)
    }

    pub fn status(&self) -> BrainStatus {
        BrainStatus {
            id: self.id,
            name: self.name.clone(),
            tick: self.last_tick,
            health: self.last_health.unwrap_or_default(),
            active_goal: self.planner.active_goal().map(|g| ActiveGoalStatus {
                id: g.id,
                kind: g.kind,
                description: g.description.clone(),
                progress: g.progress(),
                skill: g.skill.clone(),
            }),
            goals: self.planner.len(),
            memories: self.memory.len(),
            skills: self.skills.len(),
            known_places: self.spatial.len(),
            current_intent: self.current.as_ref().map(|c| c.intent.clone()),
            pending_replan: self.planner.has_pending_request(),
            pending_learning: self.learner.has_pending_request(),
            team: self.team,
        }
    }

    /// Advance the agent by one host tick
    pub fn on_tick(&mut self, snapshot: &WorldSnapshot) -> Vec<BrainEvent> {
        let tick = snapshot.tick;
        let mut events = Vec::new();

        let urgency = assess_urgency(snapshot, self.last_health, &self.config.urgency);
        let due = self.counters.advance(urgency.is_some());
        self.last_health = Some(snapshot.agent.health);
        self.last_tick = tick;

        self.poll_executor(tick, &mut events);

        if due.reactive {
            self.perceive(snapshot, &mut events);
        }

        if due.decision {
            tracing::debug!(agent = %self.id, tick, ?urgency, "Decision tier");
            events.push(BrainEvent::DecisionEvaluated { tick, urgent: urgency });
            self.decide(snapshot, &mut events);
        }

        // Planning always runs after the decision tier of the same tick
        let replans = self
            .planner
            .update(snapshot, &self.memory, &self.spatial, self.reasoner.as_ref());
        events.extend(replans.into_iter().map(BrainEvent::Replan));

        self.settle_finished(tick, &mut events);

        let learned = self
            .learner
            .update(tick, &mut self.skills, &mut self.memory, self.reasoner.as_ref());
        events.extend(learned.into_iter().map(BrainEvent::Learning));

        self.coordinate(tick, due.decision, &mut events);

        if due.persistence {
            self.persist(&mut events);
        }

        if due.cleanup {
            self.cleanup(tick, &mut events);
        }

        events
    }

    /// Queue a goal directly
    pub fn add_goal(&mut self, spec: GoalSpec, tick: Tick) -> GoalId {
        self.planner.add_goal(spec, tick)
    }

    /// Cancel every goal and stop at once
    ///
    /// Any outstanding replan is marked stale in the same call.
    pub fn clear_goals(&mut self, tick: Tick) -> usize {
        let cleared = self.planner.clear_goals(tick);
        self.executor.issue(Intent::Stop);
        self.current = None;
        cleared
    }

    /// Accept a task from an external actor as a requested goal
    pub fn submit_request(&mut self, actor: &str, request: TaskRequest, tick: Tick) -> GoalId {
        let spec = request.into_goal_spec(actor, self.config.planner.requested_goal_priority);
        tracing::info!(agent = %self.id, actor, kind = ?spec.kind, description = %spec.description, "Request received");
        self.planner.add_goal(spec, tick)
    }

    /// Publish a shared goal and lead it
    pub fn propose_team(&mut self, goal: GoalSpec, tasks: Vec<GoalSpec>, tick: Tick) -> Result<SharedGoalId> {
        let board = self
            .board
            .clone()
            .ok_or_else(|| MindError::Config("agent is not attached to a coordination board".into()))?;
        let team = board.propose(self.id, goal, tasks, tick)?;
        board.claim_leadership(team, self.id)?;
        self.team = Some(team);
        Ok(team)
    }

    /// Flush persistent state now; the first failure is returned
    pub fn force_save(&mut self) -> Result<()> {
        let mut first_error = None;
        for (kind, result) in self.save_all() {
            if let Err(e) = result {
                tracing::warn!(agent = %self.id, ?kind, error = %e, "Save failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::info!(agent = %self.id, "State saved");
                Ok(())
            }
        }
    }

    /// Swap in a new configuration; counters and queues carry over
    pub fn reload(&mut self, config: Arc<MindConfig>) {
        self.counters
            .set_intervals(config.tiers.clone(), config.urgency.urgent_decision_interval);
        self.planner.set_config(config.planner.clone(), config.tiers.planning);
        self.memory.set_config(config.memory.clone());
        self.skills.set_confidence_prior(config.skills.confidence_prior);
        self.learner
            .set_config(config.skills.clone(), config.planner.reasoning_timeout_ticks);
        self.config = config;
        tracing::info!(agent = %self.id, "Configuration reloaded");
    }

    /// Leave any team and flush state before the agent is dropped
    pub fn shutdown(&mut self, tick: Tick) -> Result<()> {
        if let (Some(team), Some(board)) = (self.team.take(), self.board.clone()) {
            if let Err(e) = board.leave(team, self.id, tick) {
                tracing::debug!(agent = %self.id, %team, error = %e, "Leave on shutdown ignored");
            }
        }
        self.executor.issue(Intent::Stop);
        self.current = None;
        self.force_save()
    }

    fn save_all(&self) -> [(DataKind, Result<()>); 3] {
        let store = self.persistence.as_ref();
        [
            (DataKind::Skills, self.skills.save(store, self.id)),
            (DataKind::SpatialKnowledge, self.spatial.save(store, self.id)),
            (DataKind::SemanticMemory, self.memory.save(store, self.id)),
        ]
    }

    fn issue(&mut self, intent: Intent, source: ActionSource, tick: Tick) {
        self.executor.issue(intent.clone());
        self.current = Some(CurrentAction { intent, source, issued_tick: tick });
    }

    /// Collect the executor's verdict on the current intent
    fn poll_executor(&mut self, tick: Tick, events: &mut Vec<BrainEvent>) {
        let outcome = match self.executor.poll() {
            ActionStatus::InProgress => return,
            ActionStatus::Idle => {
                self.current = None;
                return;
            }
            ActionStatus::Succeeded => ActionOutcome::Succeeded,
            ActionStatus::Failed(reason) => {
                tracing::info!(agent = %self.id, %reason, "Action failed");
                ActionOutcome::Failed
            }
        };

        let Some(current) = self.current.take() else {
            return;
        };

        let goal = match &current.source {
            ActionSource::Goal { goal, .. } => Some(*goal),
            ActionSource::Reaction(_) => None,
        };
        events.push(BrainEvent::ActionFinished {
            goal,
            intent: current.intent.clone(),
            outcome,
        });

        let ActionSource::Goal { goal: goal_id, template } = current.source else {
            return;
        };
        let Some(goal) = self.planner.goal_mut(goal_id) else {
            return;
        };
        goal.record_step(ActionRecord {
            tick,
            template,
            intent: current.intent,
            outcome,
        });
        tracing::debug!(
            agent = %self.id,
            goal = %goal_id,
            issued = current.issued_tick,
            ?outcome,
            progress = goal.progress(),
            "Step finished"
        );

        let status = match outcome {
            ActionOutcome::Failed => GoalStatus::Failed,
            ActionOutcome::Succeeded if goal.plan_complete() => GoalStatus::Succeeded,
            ActionOutcome::Succeeded => return,
        };
        if let Err(e) = self.planner.finish_goal(goal_id, status, tick) {
            tracing::warn!(agent = %self.id, goal = %goal_id, error = %e, "Could not finish goal");
        }
    }

    /// Reactive tier: record what the snapshot shows
    fn perceive(&mut self, snapshot: &WorldSnapshot, events: &mut Vec<BrainEvent>) {
        let tick = snapshot.tick;

        let mut visible = AHashSet::new();
        for entity in snapshot.nearby.iter().filter(|e| e.hostile) {
            visible.insert(entity.id.clone());
            if self.visible_hostiles.contains(&entity.id) {
                continue;
            }
            let encounters = self.spatial.add_danger(&entity.kind, entity.position, tick);
            self.memory.remember(
                MemoryKind::Observation,
                format!("{} spotted at {}", entity.kind, entity.position),
                HOSTILE_SIGHTING_IMPORTANCE,
                tick,
            );
            if encounters == 1 {
                events.push(BrainEvent::Discovered {
                    kind: PlaceKind::Danger,
                    category: entity.kind.clone(),
                    position: entity.position,
                });
            }
        }
        self.visible_hostiles = visible;

        for block in &snapshot.terrain.blocks {
            if self.spatial.knows_resource(&block.kind, block.position) {
                continue;
            }
            self.spatial.add_resource(&block.kind, block.position, tick);
            self.memory.remember(
                MemoryKind::Observation,
                format!("found {} at {}", block.kind, block.position),
                RESOURCE_SIGHTING_IMPORTANCE,
                tick,
            );
            events.push(BrainEvent::Discovered {
                kind: PlaceKind::Resource,
                category: block.kind.clone(),
                position: block.position,
            });
        }
    }

    /// Decision tier: react, or pursue the active goal's next step
    fn decide(&mut self, snapshot: &WorldSnapshot, events: &mut Vec<BrainEvent>) {
        let tick = snapshot.tick;

        if let Some((reaction, intent)) = pursuit::react(snapshot, &self.config.urgency) {
            let unchanged = self.current.as_ref().map_or(false, |c| c.intent == intent);
            if !unchanged {
                tracing::debug!(agent = %self.id, ?reaction, %intent, "Reaction");
                events.push(BrainEvent::ReactionTriggered {
                    reaction: reaction.clone(),
                    intent: intent.clone(),
                });
                self.issue(intent, ActionSource::Reaction(reaction), tick);
            }
            return;
        }

        // The threat is gone; goal pursuit takes the executor back
        if matches!(&self.current, Some(CurrentAction { source: ActionSource::Reaction(_), .. })) {
            self.current = None;
        }

        if self.planner.active_goal().is_none() {
            self.planner.ensure_idle_goal(tick);
        }
        let Some(goal_id) = self.planner.active_goal().map(|g| g.id) else {
            return;
        };

        let busy = matches!(
            &self.current,
            Some(CurrentAction { source: ActionSource::Goal { goal, .. }, .. }) if *goal == goal_id
        );
        if busy {
            return;
        }

        if let Some(bound) = self.bind_plan(goal_id) {
            events.push(bound);
        }

        let Some(goal) = self.planner.goal(goal_id) else {
            return;
        };
        if goal.plan_complete() {
            if let Err(e) = self.planner.finish_goal(goal_id, GoalStatus::Succeeded, tick) {
                tracing::warn!(agent = %self.id, goal = %goal_id, error = %e, "Could not finish goal");
            }
            return;
        }
        let Some(template) = goal.next_step().cloned() else {
            return;
        };

        match pursuit::resolve(&template, goal, snapshot, &self.spatial) {
            Some(intent) => {
                tracing::debug!(agent = %self.id, goal = %goal_id, step = %template, %intent, "Intent issued");
                events.push(BrainEvent::IntentIssued {
                    goal: Some(goal_id),
                    intent: intent.clone(),
                });
                self.issue(intent, ActionSource::Goal { goal: goal_id, template }, tick);
            }
            None => {
                tracing::info!(agent = %self.id, goal = %goal_id, step = %template, "Step target unresolved");
                if let Err(e) = self.planner.finish_goal(goal_id, GoalStatus::Failed, tick) {
                    tracing::warn!(agent = %self.id, goal = %goal_id, error = %e, "Could not fail goal");
                }
            }
        }
    }

    /// Give a goal its step sequence the first time it is pursued
    fn bind_plan(&mut self, goal_id: GoalId) -> Option<BrainEvent> {
        let goal = self.planner.goal(goal_id)?;
        if goal.has_plan() {
            return None;
        }

        let context = goal.context();
        let has_target = context.target.is_some();
        let skill = self
            .skills
            .find_applicable(&context)
            .into_iter()
            .find(|s| !s.actions.is_empty() && (has_target || !s.actions.iter().any(needs_goal_target)));
        let (skill, plan) = match skill {
            Some(skill) => (Some(skill.name.clone()), skill.actions.clone()),
            None => (None, pursuit::fallback_plan(context.kind, has_target)),
        };

        tracing::info!(agent = %self.id, goal = %goal_id, skill = ?skill, steps = plan.len(), "Plan bound");
        let steps = plan.len();
        self.planner.goal_mut(goal_id)?.bind_plan(skill.clone(), plan);
        Some(BrainEvent::PlanBound { goal: goal_id, skill, steps })
    }

    /// Hand finished goals to memory, the learner and the team board
    fn settle_finished(&mut self, tick: Tick, events: &mut Vec<BrainEvent>) {
        for outcome in self.planner.take_finished() {
            let goal = &outcome.goal;
            events.push(BrainEvent::GoalFinished {
                goal: goal.id,
                kind: goal.kind,
                status: goal.status,
            });

            if matches!(&self.current, Some(CurrentAction { source: ActionSource::Goal { goal: id, .. }, .. }) if *id == goal.id)
            {
                self.current = None;
            }

            match goal.status {
                GoalStatus::Succeeded => {
                    self.memory.remember(
                        MemoryKind::Event,
                        format!("succeeded: {}", goal.description),
                        SUCCESS_IMPORTANCE,
                        tick,
                    );
                }
                GoalStatus::Failed => {
                    self.memory.remember(
                        MemoryKind::Event,
                        format!("failed: {}", goal.description),
                        FAILURE_IMPORTANCE,
                        tick,
                    );
                }
                _ => {}
            }

            let learned = self.learner.observe(&outcome, &mut self.skills);
            events.extend(learned.into_iter().map(BrainEvent::Learning));

            if let GoalOrigin::Team { team, task } = goal.origin {
                if let Some(board) = &self.board {
                    if let Err(e) = board.report(team, task, self.id, goal.status) {
                        tracing::debug!(agent = %self.id, %team, task, error = %e, "Task report rejected");
                    }
                }
            }
        }
    }

    /// Read team notices and volunteer for open proposals
    fn coordinate(&mut self, tick: Tick, volunteer: bool, events: &mut Vec<BrainEvent>) {
        let Some(board) = self.board.clone() else {
            return;
        };

        for notice in board.take_notices(self.id) {
            match &notice {
                TeamNotice::Assigned { team, task, spec } => {
                    self.team = Some(*team);
                    let spec = spec.clone().with_origin(task_origin(*team, *task));
                    self.planner.add_goal(spec, tick);
                }
                TeamNotice::Cancelled { team } => {
                    let orphaned: Vec<GoalId> = self
                        .planner
                        .goals()
                        .filter(|g| matches!(g.origin, GoalOrigin::Team { team: t, .. } if t == *team))
                        .map(|g| g.id)
                        .collect();
                    for id in orphaned {
                        if let Err(e) = self.planner.cancel_goal(id, tick) {
                            tracing::warn!(agent = %self.id, goal = %id, error = %e, "Could not cancel team goal");
                        }
                    }
                    if self.team == Some(*team) {
                        self.team = None;
                        self.planner.request_early_replan();
                    }
                }
                TeamNotice::PartialFailure { team, tasks } => {
                    self.memory.remember(
                        MemoryKind::Event,
                        format!("{} could not reassign tasks {:?}", team, tasks),
                        TEAM_EVENT_IMPORTANCE,
                        tick,
                    );
                }
                TeamNotice::Completed { team, success } => {
                    let verdict = if *success { "completed" } else { "finished with failures" };
                    self.memory.remember(
                        MemoryKind::Event,
                        format!("{} {}", team, verdict),
                        TEAM_EVENT_IMPORTANCE,
                        tick,
                    );
                    if self.team == Some(*team) {
                        self.team = None;
                    }
                }
            }
            events.push(BrainEvent::Team(notice));
        }

        if !volunteer || self.team.is_some() {
            return;
        }
        let ceiling = self.config.coordination.helper_priority_ceiling;
        if self.planner.active_goal().map_or(false, |g| g.priority >= ceiling) {
            return;
        }
        let Some(open) = board
            .open_proposals()
            .into_iter()
            .find(|t| t.leader != Some(self.id))
        else {
            return;
        };
        match board.join(open.id, self.id) {
            Ok(()) => {
                self.team = Some(open.id);
                events.push(BrainEvent::TeamJoined { team: open.id });
            }
            Err(e) => tracing::debug!(agent = %self.id, team = %open.id, error = %e, "Could not join team"),
        }
    }

    /// Persistence tier; failures are logged and retried next time
    fn persist(&mut self, events: &mut Vec<BrainEvent>) {
        let mut failed = false;
        for (kind, result) in self.save_all() {
            if let Err(e) = result {
                tracing::warn!(agent = %self.id, ?kind, error = %e, "Persistence failed; retrying next cycle");
                events.push(BrainEvent::PersistenceFailed { kind, error: e.to_string() });
                failed = true;
            }
        }
        if !failed {
            tracing::debug!(agent = %self.id, "Persistence tier saved");
            events.push(BrainEvent::Saved);
        }
    }

    /// Cleanup tier: decay, purge, consolidate, prune old traces
    fn cleanup(&mut self, tick: Tick, events: &mut Vec<BrainEvent>) {
        let purged = self.memory.cleanup(tick);
        let consolidated = self.memory.consolidate(tick);
        events.push(BrainEvent::MemoryCleaned { purged, consolidated });

        let removed = self.learner.cleanup_old_experiences(
            self.config.skills.experience_max_age_ms,
            self.config.registry.ticks_per_second,
            tick,
        );
        if removed > 0 {
            events.push(BrainEvent::ExperiencesPruned { removed });
        }
    }
}

fn needs_goal_target(step: &ActionTemplate) -> bool {
    step.target.as_deref().map_or(false, |t| t.contains("$target"))
}

impl std::fmt::Debug for Brain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Brain")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("goals", &self.planner.len())
            .field("team", &self.team)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ScriptHandle;
    use crate::goals::GoalKind;
    use crate::llm::ManualReasoner;
    use crate::skills::{Skill, SkillSource};
    use crate::world::{BlockSample, NearbyEntity};
    use crate::core::types::Vec3;

    fn quiet_config() -> MindConfig {
        let mut config = MindConfig::default();
        config.tiers.decision = 1;
        config.tiers.reactive = 1;
        config.planner.idle_exploration = false;
        config
    }

    fn brain_with(config: MindConfig, duration: u32) -> (Brain, ScriptHandle) {
        let executor = ScriptedExecutor::new(duration);
        let handle = executor.handle();
        let brain = Brain::builder("steve", Arc::new(config))
            .executor(Box::new(executor))
            .reasoner(Arc::new(ManualReasoner::new()))
            .build(0);
        (brain, handle)
    }

    fn snapshot(tick: Tick) -> WorldSnapshot {
        WorldSnapshot { tick, ..Default::default() }
    }

    #[test]
    fn test_goal_runs_to_success_through_fallback_plan() {
        let (mut brain, handle) = brain_with(quiet_config(), 0);
        let id = brain.add_goal(GoalSpec::new(GoalKind::Exploration, 3, "look around"), 0);

        let mut finished = None;
        for tick in 1..=10 {
            for event in brain.on_tick(&snapshot(tick)) {
                if let BrainEvent::GoalFinished { goal, status, .. } = event {
                    finished = Some((goal, status));
                }
            }
        }
        assert_eq!(finished, Some((id, GoalStatus::Succeeded)));
        assert!(!handle.issued().is_empty());
        assert_eq!(brain.memory().recent(1)[0].content, "succeeded: look around");
    }

    #[test]
    fn test_executor_failure_fails_goal() {
        let (mut brain, handle) = brain_with(quiet_config(), 0);
        handle.push_outcome(false);
        brain.add_goal(GoalSpec::new(GoalKind::Exploration, 3, "look around"), 0);

        let statuses: Vec<GoalStatus> = (1..=5)
            .flat_map(|tick| brain.on_tick(&snapshot(tick)))
            .filter_map(|e| match e {
                BrainEvent::GoalFinished { status, .. } => Some(status),
                _ => None,
            })
            .collect();
        assert_eq!(statuses, vec![GoalStatus::Failed]);
    }

    #[test]
    fn test_unresolvable_target_fails_goal() {
        let (mut brain, _) = brain_with(quiet_config(), 0);
        let spec = GoalSpec::new(GoalKind::ResourceGathering, 3, "collect diamonds").with_target("diamond");
        let id = brain.add_goal(spec, 0);

        let events = brain.on_tick(&snapshot(1));
        assert!(events
            .iter()
            .any(|e| matches!(e, BrainEvent::GoalFinished { goal, status: GoalStatus::Failed, .. } if *goal == id)));
        assert_eq!(brain.skills().get("gather_resource").unwrap().failure_count(), 1);
    }

    #[test]
    fn test_stored_skill_without_actions_not_bound() {
        let store = Arc::new(VolatileStore::new());
        let stored = vec![Skill::new("noop", "", vec![], SkillSource::Authored, 0).for_kinds(&[GoalKind::Exploration])];
        store.put_raw(AgentId::from_name("steve"), DataKind::Skills, serde_json::to_string(&stored).unwrap());

        let persistence: Arc<dyn Persistence> = store;
        let mut brain = Brain::builder("steve", Arc::new(quiet_config()))
            .executor(Box::new(ScriptedExecutor::new(0)))
            .reasoner(Arc::new(ManualReasoner::new()))
            .persistence(persistence)
            .build(0);
        let id = brain.add_goal(GoalSpec::new(GoalKind::Exploration, 3, "look around"), 0);

        let events = brain.on_tick(&snapshot(1));
        assert!(!brain.skills().contains("noop"));
        assert!(events
            .iter()
            .any(|e| matches!(e, BrainEvent::IntentIssued { goal: Some(goal), .. } if *goal == id)));
    }

    #[test]
    fn test_hostile_triggers_reaction_without_touching_goals() {
        let (mut brain, handle) = brain_with(quiet_config(), 5);
        brain.add_goal(GoalSpec::new(GoalKind::Exploration, 3, "look around"), 0);

        let mut world = snapshot(1);
        world.nearby.push(NearbyEntity {
            id: "z1".into(),
            kind: "zombie".into(),
            position: Vec3::new(5.0, 0.0, 0.0),
            hostile: true,
        });
        let events = brain.on_tick(&world);

        assert!(events.iter().any(|e| matches!(e, BrainEvent::ReactionTriggered { .. })));
        assert_eq!(handle.issued(), vec![Intent::Attack { target: "z1".into() }]);
        assert_eq!(brain.planner().len(), 1);
        assert_eq!(brain.spatial().count(PlaceKind::Danger), 1);
    }

    #[test]
    fn test_perception_records_resources_once() {
        let (mut brain, _) = brain_with(quiet_config(), 0);
        let mut world = snapshot(1);
        world.terrain.blocks.push(BlockSample {
            kind: "iron_ore".into(),
            position: Vec3::new(3.0, 12.0, 3.0),
        });

        let discovered = |events: &[BrainEvent]| {
            events
                .iter()
                .filter(|e| matches!(e, BrainEvent::Discovered { .. }))
                .count()
        };
        assert_eq!(discovered(&brain.on_tick(&world)), 1);
        world.tick = 2;
        assert_eq!(discovered(&brain.on_tick(&world)), 0);
        assert_eq!(brain.spatial().count(PlaceKind::Resource), 1);
    }

    #[test]
    fn test_clear_goals_stops_immediately() {
        let (mut brain, handle) = brain_with(quiet_config(), 10);
        brain.add_goal(GoalSpec::new(GoalKind::Exploration, 3, "look around"), 0);
        brain.on_tick(&snapshot(1));
        assert!(brain.current_intent().is_some());

        assert_eq!(brain.clear_goals(1), 1);
        assert!(brain.current_intent().is_none());
        assert_eq!(handle.issued().last(), Some(&Intent::Stop));
        assert!(brain.planner().is_empty());
    }

    #[test]
    fn test_request_becomes_requested_goal() {
        let (mut brain, _) = brain_with(quiet_config(), 0);
        let id = brain.submit_request("alex", TaskRequest::NaturalLanguage("explore the cave".into()), 0);
        let goal = brain.planner().goal(id).unwrap();
        assert_eq!(goal.origin, GoalOrigin::RequestedBy("alex".into()));
        assert_eq!(goal.priority, 10);
    }

    #[test]
    fn test_propose_team_requires_board() {
        let (mut brain, _) = brain_with(quiet_config(), 0);
        let result = brain.propose_team(GoalSpec::new(GoalKind::Build, 8, "build a wall"), vec![], 0);
        assert!(matches!(result, Err(MindError::Config(_))));
    }

    #[test]
    fn test_reload_changes_intervals() {
        let (mut brain, _) = brain_with(MindConfig::default(), 0);
        let mut config = quiet_config();
        config.tiers.decision = 2;
        brain.reload(Arc::new(config));

        let decisions = (1..=6)
            .flat_map(|tick| brain.on_tick(&snapshot(tick)))
            .filter(|e| matches!(e, BrainEvent::DecisionEvaluated { .. }))
            .count();
        assert_eq!(decisions, 3);
    }
}
