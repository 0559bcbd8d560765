//! Agent registry - owns every brain and the shared coordination board
//!
//! The administrative surface: spawn, despawn, status, force-save,
//! reload-config and list. `tick_all` drives one host tick for every agent,
//! in parallel once the population reaches the configured threshold.

use crate::actions::ActionExecutor;
use crate::brain::{Brain, BrainEvent, BrainStatus};
use crate::command::TaskRequest;
use crate::coordination::CoordinationBoard;
use crate::core::config::MindConfig;
use crate::core::error::{MindError, Result};
use crate::core::types::{AgentId, GoalId, SharedGoalId, Tick};
use crate::goals::GoalSpec;
use crate::llm::ReasoningService;
use crate::persistence::Persistence;
use crate::world::WorldSnapshot;
use ahash::AHashMap;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

pub struct AgentRegistry {
    agents: BTreeMap<AgentId, Brain>,
    config: Arc<MindConfig>,
    board: Arc<CoordinationBoard>,
    reasoner: Arc<dyn ReasoningService>,
    persistence: Arc<dyn Persistence>,
    tick: Tick,
}

impl AgentRegistry {
    pub fn new(
        config: MindConfig,
        reasoner: Arc<dyn ReasoningService>,
        persistence: Arc<dyn Persistence>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            agents: BTreeMap::new(),
            config: Arc::new(config),
            board: Arc::new(CoordinationBoard::new()),
            reasoner,
            persistence,
            tick: 0,
        })
    }

    pub fn config(&self) -> &MindConfig {
        &self.config
    }

    pub fn board(&self) -> &Arc<CoordinationBoard> {
        &self.board
    }

    /// Last tick driven through `tick_all`
    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Create an agent; its learned state is loaded from storage
    pub fn spawn(&mut self, name: &str, executor: Box<dyn ActionExecutor>) -> Result<AgentId> {
        let id = AgentId::from_name(name);
        if self.agents.contains_key(&id) {
            return Err(MindError::AgentExists(name.to_string()));
        }

        self.board.register(id);
        let brain = Brain::builder(name, Arc::clone(&self.config))
            .executor(executor)
            .reasoner(Arc::clone(&self.reasoner))
            .persistence(Arc::clone(&self.persistence))
            .board(Arc::clone(&self.board))
            .build(self.tick);
        self.agents.insert(id, brain);
        tracing::info!(agent = %id, name, "Agent spawned");
        Ok(id)
    }

    /// Remove an agent after it leaves its team and flushes its state
    ///
    /// The agent is gone even when the final save fails; the error is returned.
    pub fn despawn(&mut self, id: AgentId) -> Result<()> {
        let mut brain = self.agents.remove(&id).ok_or(MindError::AgentNotFound(id))?;
        let saved = brain.shutdown(self.tick);
        self.board.forget(id);
        tracing::info!(agent = %id, name = brain.name(), saved = saved.is_ok(), "Agent despawned");
        saved
    }

    pub fn get(&self, id: AgentId) -> Option<&Brain> {
        self.agents.get(&id)
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Brain> {
        self.agents.get_mut(&id)
    }

    /// Look an agent up by name, ignoring case
    pub fn find(&self, name: &str) -> Option<AgentId> {
        self.agents
            .values()
            .find(|b| b.name().eq_ignore_ascii_case(name))
            .map(Brain::id)
    }

    pub fn status(&self, id: AgentId) -> Result<BrainStatus> {
        self.agents
            .get(&id)
            .map(Brain::status)
            .ok_or(MindError::AgentNotFound(id))
    }

    pub fn list(&self) -> Vec<BrainStatus> {
        self.agents.values().map(Brain::status).collect()
    }

    pub fn force_save(&mut self, id: AgentId) -> Result<()> {
        self.brain_mut(id)?.force_save()
    }

    /// Save every agent; returns how many saved cleanly
    pub fn force_save_all(&mut self) -> usize {
        self.agents
            .values_mut()
            .map(|brain| brain.force_save())
            .filter(|result| result.is_ok())
            .count()
    }

    /// Validate and apply a new configuration to every agent
    pub fn reload_config(&mut self, config: MindConfig) -> Result<()> {
        config.validate()?;
        let config = Arc::new(config);
        for brain in self.agents.values_mut() {
            brain.reload(Arc::clone(&config));
        }
        self.config = config;
        tracing::info!(agents = self.agents.len(), "Configuration reloaded");
        Ok(())
    }

    pub fn reload_config_file(&mut self, path: &Path) -> Result<()> {
        self.reload_config(MindConfig::load(path)?)
    }

    pub fn submit_request(&mut self, id: AgentId, actor: &str, request: TaskRequest) -> Result<GoalId> {
        let tick = self.tick;
        Ok(self.brain_mut(id)?.submit_request(actor, request, tick))
    }

    pub fn clear_goals(&mut self, id: AgentId) -> Result<usize> {
        let tick = self.tick;
        Ok(self.brain_mut(id)?.clear_goals(tick))
    }

    pub fn propose_team(&mut self, id: AgentId, goal: GoalSpec, tasks: Vec<GoalSpec>) -> Result<SharedGoalId> {
        let tick = self.tick;
        self.brain_mut(id)?.propose_team(goal, tasks, tick)
    }

    /// Drive one host tick for every agent that has a snapshot
    ///
    /// Team transitions driven by time (quorum, timeout, completion) run
    /// after all agents, so notices produced here are read next tick.
    pub fn tick_all(
        &mut self,
        tick: Tick,
        snapshots: &AHashMap<AgentId, WorldSnapshot>,
    ) -> Vec<(AgentId, Vec<BrainEvent>)> {
        self.tick = tick;
        let run = |(id, brain): (&AgentId, &mut Brain)| snapshots.get(id).map(|s| (*id, brain.on_tick(s)));

        let events: Vec<(AgentId, Vec<BrainEvent>)> = if self.agents.len() >= self.config.registry.parallel_threshold {
            self.agents.par_iter_mut().filter_map(run).collect()
        } else {
            self.agents.iter_mut().filter_map(run).collect()
        };

        if let Err(e) = self.board.advance(tick, &self.config.coordination) {
            tracing::warn!(tick, error = %e, "Team advance failed");
        }
        let pruned = self.board.prune(tick, self.config.coordination.formation_timeout_ticks);
        if pruned > 0 {
            tracing::debug!(tick, pruned, "Closed teams pruned");
        }
        events
    }

    /// Despawn every agent, saving each one
    pub fn shutdown(&mut self) -> usize {
        let ids: Vec<AgentId> = self.agents.keys().copied().collect();
        ids.into_iter().filter(|id| self.despawn(*id).is_ok()).count()
    }

    fn brain_mut(&mut self, id: AgentId) -> Result<&mut Brain> {
        self.agents.get_mut(&id).ok_or(MindError::AgentNotFound(id))
    }
}
