//! Prioritized goal queue with non-blocking replanning
//!
//! The planner owns every goal of one agent. Selection is a pure rule
//! (highest priority, then earliest creation, then lowest id). Replanning
//! runs on the planning-tier counter: the context is summarised and handed
//! to the reasoning service, and the reply is applied on whichever later
//! tick it arrives, unless the request went stale in the meantime.

use crate::core::config::PlannerConfig;
use crate::core::error::{MindError, Result};
use crate::core::types::{GoalId, Tick};
use crate::goals::goal::{Goal, GoalKind, GoalOrigin, GoalOutcome, GoalSpec, GoalStatus};
use crate::llm::context::PlanningContext;
use crate::llm::parser::ProposalDecision;
use crate::llm::reasoning::{
    ReasoningPurpose, ReasoningReply, ReasoningRequest, ReasoningService, ReasoningSlot, Resolved,
};
use crate::memory::MemoryStore;
use crate::spatial::SpatialKnowledge;
use crate::world::WorldSnapshot;

/// What one planner update did
#[derive(Debug, Clone, PartialEq)]
pub enum ReplanOutcome {
    /// A request was issued this tick
    Requested,
    /// The trigger fired while a request was still outstanding
    Skipped,
    Affirmed,
    Replaced { cancelled: Option<GoalId>, added: GoalId },
    /// The reply arrived after its request was marked stale
    Discarded,
    /// Error, timeout or unusable reply; the current goal stands
    Failed(String),
}

pub struct GoalPlanner {
    config: PlannerConfig,
    replan_interval: u32,
    goals: Vec<Goal>,
    next_id: u64,
    replan_counter: u32,
    early_replan: bool,
    /// Outstanding replan request, tagged with the goal active when issued
    pending: ReasoningSlot<Option<GoalId>>,
    finished: Vec<GoalOutcome>,
}

impl GoalPlanner {
    pub fn new(config: PlannerConfig, replan_interval: u32) -> Self {
        Self {
            config,
            replan_interval: replan_interval.max(1),
            goals: Vec::new(),
            next_id: 1,
            replan_counter: 0,
            early_replan: false,
            pending: ReasoningSlot::new(),
            finished: Vec::new(),
        }
    }

    pub fn set_config(&mut self, config: PlannerConfig, replan_interval: u32) {
        self.config = config;
        self.replan_interval = replan_interval.max(1);
    }

    /// Insert a goal; a strictly higher priority preempts the active goal
    ///
    /// The preempted goal returns to PENDING with its plan cursor and trace
    /// intact, unless its progress has reached the near-completion threshold,
    /// in which case it stays active and the newcomer waits.
    pub fn add_goal(&mut self, spec: GoalSpec, tick: Tick) -> GoalId {
        let id = GoalId(self.next_id);
        self.next_id += 1;

        let goal = Goal::new(id, spec, tick);
        tracing::info!(goal = %id, kind = ?goal.kind, priority = goal.priority, origin = ?goal.origin, "Goal added");
        self.goals.push(goal);
        self.refresh_active();
        id
    }

    /// Highest priority among PENDING/ACTIVE goals; ties go to the earliest created
    pub fn select_active_goal(&self) -> Option<&Goal> {
        self.goals
            .iter()
            .filter(|g| g.is_live())
            .min_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then_with(|| a.created_tick.cmp(&b.created_tick))
                    .then_with(|| a.id.cmp(&b.id))
            })
    }

    pub fn active_goal(&self) -> Option<&Goal> {
        self.goals.iter().find(|g| g.status == GoalStatus::Active)
    }

    pub fn active_goal_mut(&mut self) -> Option<&mut Goal> {
        self.goals.iter_mut().find(|g| g.status == GoalStatus::Active)
    }

    pub fn goal(&self, id: GoalId) -> Option<&Goal> {
        self.goals.iter().find(|g| g.id == id)
    }

    pub fn goal_mut(&mut self, id: GoalId) -> Option<&mut Goal> {
        self.goals.iter_mut().find(|g| g.id == id)
    }

    /// Live goals in insertion order
    pub fn goals(&self) -> impl Iterator<Item = &Goal> {
        self.goals.iter()
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }

    pub fn has_pending_request(&self) -> bool {
        self.pending.is_outstanding()
    }

    /// Cancel every goal; an outstanding replan becomes stale at once
    pub fn clear_goals(&mut self, tick: Tick) -> usize {
        if self.pending.mark_stale_if(|_| true) {
            tracing::debug!("Outstanding replan marked stale by clear");
        }

        let cleared = std::mem::take(&mut self.goals);
        let count = cleared.len();
        for mut goal in cleared {
            goal.status = GoalStatus::Cancelled;
            self.finished.push(GoalOutcome { goal, tick });
        }
        if count > 0 {
            tracing::info!(count, "Goals cleared");
        }
        count
    }

    /// Cancel one goal; a replan issued for it becomes stale
    pub fn cancel_goal(&mut self, id: GoalId, tick: Tick) -> Result<()> {
        self.pending.mark_stale_if(|goal| *goal == Some(id));
        self.finish_goal(id, GoalStatus::Cancelled, tick)
    }

    /// Change the priority of a goal that is not active
    pub fn reprioritize(&mut self, id: GoalId, priority: i32) -> Result<()> {
        let goal = self
            .goals
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or(MindError::GoalNotFound(id))?;
        if goal.status == GoalStatus::Active {
            return Err(MindError::GoalPriorityLocked(id));
        }
        goal.priority = priority;
        self.refresh_active();
        Ok(())
    }

    /// Move a goal to a terminal status and out of the queue
    ///
    /// A failure brings the next replan forward to the next update.
    pub fn finish_goal(&mut self, id: GoalId, status: GoalStatus, tick: Tick) -> Result<()> {
        if !status.is_terminal() {
            return Err(MindError::Config(format!("{:?} is not a terminal goal status", status)));
        }
        let index = self
            .goals
            .iter()
            .position(|g| g.id == id)
            .ok_or(MindError::GoalNotFound(id))?;

        let mut goal = self.goals.remove(index);
        goal.status = status;
        tracing::info!(goal = %id, ?status, steps = goal.trace.len(), "Goal finished");

        if status == GoalStatus::Failed {
            self.early_replan = true;
        }
        self.finished.push(GoalOutcome { goal, tick });
        self.refresh_active();
        Ok(())
    }

    /// Goals that reached a terminal status since the last call
    pub fn take_finished(&mut self) -> Vec<GoalOutcome> {
        std::mem::take(&mut self.finished)
    }

    /// Add the idle exploration goal when nothing else is queued
    pub fn ensure_idle_goal(&mut self, tick: Tick) -> Option<GoalId> {
        if !self.config.idle_exploration || !self.goals.is_empty() {
            return None;
        }
        let spec = GoalSpec::new(GoalKind::Exploration, self.config.idle_priority, "explore the surroundings");
        Some(self.add_goal(spec, tick))
    }

    /// Make the next update trigger a replan regardless of the counter
    pub fn request_early_replan(&mut self) {
        self.early_replan = true;
    }

    /// Apply any resolved replan, then advance the counter and maybe issue one
    pub fn update(
        &mut self,
        snapshot: &WorldSnapshot,
        memory: &MemoryStore,
        spatial: &SpatialKnowledge,
        reasoner: &dyn ReasoningService,
    ) -> Vec<ReplanOutcome> {
        let tick = snapshot.tick;
        let mut outcomes = Vec::new();

        if let Some(resolved) = self.pending.poll(tick, self.config.reasoning_timeout_ticks) {
            outcomes.push(self.apply(resolved, tick));
        }

        self.replan_counter += 1;
        let due = self.replan_counter >= self.replan_interval;
        if !due && !self.early_replan {
            return outcomes;
        }
        if due {
            self.replan_counter = 0;
        }

        if self.pending.is_outstanding() {
            tracing::debug!(tick, "Replan skipped: request outstanding");
            self.early_replan = false;
            outcomes.push(ReplanOutcome::Skipped);
            return outcomes;
        }

        let active = self.active_goal().map(|g| g.id);
        let context = PlanningContext::from_snapshot(snapshot)
            .with_goals(self.goals.iter(), active)
            .with_memories(memory, self.config.context_memories)
            .with_places(spatial)
            .summary();
        let request = ReasoningRequest::new(ReasoningPurpose::Replan, context);

        self.pending.issue(reasoner, request, tick, active);
        self.early_replan = false;
        tracing::debug!(tick, goal = ?active, "Replan requested");
        outcomes.push(ReplanOutcome::Requested);
        outcomes
    }

    fn apply(&mut self, resolved: Resolved<Option<GoalId>>, tick: Tick) -> ReplanOutcome {
        if resolved.stale {
            tracing::debug!(issued = resolved.issued_tick, "Stale replan discarded");
            return ReplanOutcome::Discarded;
        }

        let proposal = match resolved.result {
            Ok(ReasoningReply::Goal(proposal)) => proposal,
            Ok(ReasoningReply::Text(text)) => {
                tracing::info!(reply = %text, "Unstructured replan reply not applied");
                return ReplanOutcome::Failed("unstructured reply".into());
            }
            Ok(ReasoningReply::Skill(_)) => {
                return ReplanOutcome::Failed("skill definition in reply to a replan".into());
            }
            Err(e) => {
                tracing::warn!(error = %e, "Replan failed; keeping current goal");
                return ReplanOutcome::Failed(e.to_string());
            }
        };

        let spec = match (proposal.decision, proposal.goal) {
            (ProposalDecision::Replace, Some(spec)) => spec,
            _ => return ReplanOutcome::Affirmed,
        };

        // Same goal already queued: nothing to replace
        if let Some(existing) = self
            .goals
            .iter()
            .find(|g| g.kind == spec.kind && g.description.eq_ignore_ascii_case(&spec.description))
        {
            tracing::debug!(goal = %existing.id, "Proposed goal already queued");
            return ReplanOutcome::Affirmed;
        }

        // Only self-generated goals are displaced by a proposal
        let cancelled = resolved.context.filter(|id| {
            self.goal(*id)
                .map_or(false, |g| g.is_live() && g.origin == GoalOrigin::SelfGenerated)
        });
        if let Some(id) = cancelled {
            if let Err(e) = self.finish_goal(id, GoalStatus::Cancelled, tick) {
                tracing::warn!(error = %e, "Could not cancel replaced goal");
            }
        }

        tracing::info!(reason = %proposal.reason, "Replan replaced goal");
        let added = self.add_goal(spec.with_origin(GoalOrigin::SelfGenerated), tick);
        ReplanOutcome::Replaced { cancelled, added }
    }

    /// Keep exactly one ACTIVE goal, honouring the preemption policy
    fn refresh_active(&mut self) {
        let Some(best) = self.select_active_goal().map(|g| (g.id, g.priority)) else {
            return;
        };

        let current = self.active_goal().map(|g| (g.id, g.priority, g.progress()));
        match current {
            Some((id, _, _)) if id == best.0 => return,
            Some((_, priority, _)) if best.1 <= priority => return,
            Some((id, _, progress)) if progress >= self.config.near_completion_threshold => {
                tracing::debug!(goal = %id, progress, "Near completion; preemption deferred");
                return;
            }
            Some((id, _, _)) => {
                if let Some(goal) = self.goals.iter_mut().find(|g| g.id == id) {
                    goal.status = GoalStatus::Pending;
                    tracing::info!(goal = %id, by = %best.0, "Goal preempted");
                }
            }
            None => {}
        }

        if let Some(goal) = self.goals.iter_mut().find(|g| g.id == best.0) {
            goal.status = GoalStatus::Active;
            tracing::info!(goal = %goal.id, kind = ?goal.kind, "Goal activated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionOutcome, ActionRecord, ActionTemplate, ActionVerb, Intent};
    use crate::core::config::MemoryConfig;
    use crate::llm::parser::GoalProposal;
    use crate::llm::reasoning::ManualReasoner;

    fn planner() -> GoalPlanner {
        GoalPlanner::new(PlannerConfig::default(), 10)
    }

    fn snapshot(tick: Tick) -> WorldSnapshot {
        WorldSnapshot { tick, ..Default::default() }
    }

    fn step(planner: &mut GoalPlanner, reasoner: &ManualReasoner, tick: Tick) -> Vec<ReplanOutcome> {
        let memory = MemoryStore::new(MemoryConfig::default());
        let spatial = SpatialKnowledge::new();
        planner.update(&snapshot(tick), &memory, &spatial, reasoner)
    }

    #[test]
    fn test_selection_by_priority_then_fifo() {
        let mut planner = planner();
        let a = planner.add_goal(GoalSpec::new(GoalKind::Build, 5, "a"), 10);
        let b = planner.add_goal(GoalSpec::new(GoalKind::Build, 8, "b"), 12);
        assert_eq!(planner.select_active_goal().unwrap().id, b);
        assert_eq!(planner.active_goal().unwrap().id, b);
        assert_eq!(planner.goal(a).unwrap().status, GoalStatus::Pending);

        planner.finish_goal(b, GoalStatus::Succeeded, 20).unwrap();
        assert_eq!(planner.active_goal().unwrap().id, a);
    }

    #[test]
    fn test_equal_priority_does_not_preempt() {
        let mut planner = planner();
        let first = planner.add_goal(GoalSpec::new(GoalKind::Build, 5, "first"), 1);
        planner.add_goal(GoalSpec::new(GoalKind::Build, 5, "second"), 2);
        assert_eq!(planner.active_goal().unwrap().id, first);
    }

    #[test]
    fn test_preempted_goal_resumes_with_progress() {
        let mut planner = planner();
        let slow = planner.add_goal(GoalSpec::new(GoalKind::Build, 3, "build a wall"), 0);
        {
            let goal = planner.active_goal_mut().unwrap();
            goal.bind_plan(None, vec![ActionTemplate::bare(ActionVerb::Stop); 4]);
            goal.record_step(ActionRecord {
                tick: 1,
                template: ActionTemplate::bare(ActionVerb::Stop),
                intent: Intent::Stop,
                outcome: ActionOutcome::Succeeded,
            });
        }

        let urgent = planner.add_goal(GoalSpec::new(GoalKind::Survival, 9, "eat"), 5);
        assert_eq!(planner.goal(slow).unwrap().status, GoalStatus::Pending);

        planner.finish_goal(urgent, GoalStatus::Succeeded, 6).unwrap();
        let resumed = planner.active_goal().unwrap();
        assert_eq!(resumed.id, slow);
        assert_eq!(resumed.cursor, 1);
    }

    #[test]
    fn test_near_completion_defers_preemption() {
        let mut planner = planner();
        let almost = planner.add_goal(GoalSpec::new(GoalKind::Build, 3, "finish roof"), 0);
        {
            let goal = planner.active_goal_mut().unwrap();
            goal.bind_plan(None, vec![ActionTemplate::bare(ActionVerb::Stop); 10]);
            goal.cursor = 9;
        }

        let newcomer = planner.add_goal(GoalSpec::new(GoalKind::Combat, 7, "fight"), 1);
        assert_eq!(planner.active_goal().unwrap().id, almost);

        planner.finish_goal(almost, GoalStatus::Succeeded, 2).unwrap();
        assert_eq!(planner.active_goal().unwrap().id, newcomer);
    }

    #[test]
    fn test_priority_locked_while_active() {
        let mut planner = planner();
        let id = planner.add_goal(GoalSpec::new(GoalKind::Build, 3, "x"), 0);
        assert!(matches!(planner.reprioritize(id, 9), Err(MindError::GoalPriorityLocked(_))));

        let other = planner.add_goal(GoalSpec::new(GoalKind::Build, 1, "y"), 1);
        planner.reprioritize(other, 2).unwrap();
        assert_eq!(planner.goal(other).unwrap().priority, 2);
    }

    #[test]
    fn test_replan_on_interval_and_skip_while_outstanding() {
        let reasoner = ManualReasoner::new();
        let mut planner = planner();

        for tick in 1..10 {
            assert!(step(&mut planner, &reasoner, tick).is_empty());
        }
        assert_eq!(step(&mut planner, &reasoner, 10), vec![ReplanOutcome::Requested]);

        for tick in 11..20 {
            step(&mut planner, &reasoner, tick);
        }
        assert_eq!(step(&mut planner, &reasoner, 20), vec![ReplanOutcome::Skipped]);
        assert_eq!(reasoner.pending_count(), 1);
    }

    #[test]
    fn test_replace_cancels_self_generated_active_goal() {
        let reasoner = ManualReasoner::new();
        let mut planner = GoalPlanner::new(PlannerConfig::default(), 1);
        let wander = planner.add_goal(GoalSpec::new(GoalKind::Exploration, 1, "wander"), 0);

        step(&mut planner, &reasoner, 1);
        reasoner.respond_next(ReasoningReply::Goal(GoalProposal::replace(
            GoalSpec::new(GoalKind::ResourceGathering, 4, "collect oak logs").with_target("oak_log"),
        )));

        let outcomes = step(&mut planner, &reasoner, 2);
        let ReplanOutcome::Replaced { cancelled, added } = outcomes[0].clone() else {
            panic!("expected replacement, got {:?}", outcomes);
        };
        assert_eq!(cancelled, Some(wander));
        assert_eq!(planner.active_goal().unwrap().id, added);
        assert!(planner.take_finished().iter().any(|o| o.goal.id == wander));
    }

    #[test]
    fn test_requested_goal_survives_replacement() {
        let reasoner = ManualReasoner::new();
        let mut planner = GoalPlanner::new(PlannerConfig::default(), 1);
        let asked = planner.add_goal(
            GoalSpec::new(GoalKind::Build, 10, "build a bridge").with_origin(GoalOrigin::RequestedBy("alex".into())),
            0,
        );

        step(&mut planner, &reasoner, 1);
        reasoner.respond_next(ReasoningReply::Goal(GoalProposal::replace(GoalSpec::new(
            GoalKind::Exploration,
            2,
            "look around",
        ))));
        step(&mut planner, &reasoner, 2);

        assert_eq!(planner.active_goal().unwrap().id, asked);
        assert_eq!(planner.len(), 2);
    }

    #[test]
    fn test_failed_goal_triggers_early_replan() {
        let reasoner = ManualReasoner::new();
        let mut planner = planner();
        let id = planner.add_goal(GoalSpec::new(GoalKind::Combat, 5, "fight"), 0);
        planner.finish_goal(id, GoalStatus::Failed, 3).unwrap();

        assert_eq!(step(&mut planner, &reasoner, 4), vec![ReplanOutcome::Requested]);
    }

    #[test]
    fn test_early_replan_skipped_once_while_outstanding() {
        let reasoner = ManualReasoner::new();
        let mut planner = GoalPlanner::new(PlannerConfig::default(), 100);
        planner.request_early_replan();
        assert_eq!(step(&mut planner, &reasoner, 1), vec![ReplanOutcome::Requested]);

        let id = planner.add_goal(GoalSpec::new(GoalKind::Combat, 5, "fight"), 1);
        planner.finish_goal(id, GoalStatus::Failed, 1).unwrap();
        assert_eq!(step(&mut planner, &reasoner, 2), vec![ReplanOutcome::Skipped]);
        for tick in 3..10 {
            assert!(step(&mut planner, &reasoner, tick).is_empty());
        }
        assert_eq!(reasoner.pending_count(), 1);
    }

    #[test]
    fn test_error_keeps_current_goal() {
        let reasoner = ManualReasoner::new();
        let mut planner = GoalPlanner::new(PlannerConfig::default(), 1);
        let id = planner.add_goal(GoalSpec::new(GoalKind::Build, 3, "x"), 0);

        step(&mut planner, &reasoner, 1);
        reasoner.fail_next("rate limited");
        let outcomes = step(&mut planner, &reasoner, 2);

        assert!(matches!(outcomes[0], ReplanOutcome::Failed(_)));
        assert_eq!(planner.active_goal().unwrap().id, id);
    }

    #[test]
    fn test_idle_goal_only_when_empty() {
        let mut planner = planner();
        let idle = planner.ensure_idle_goal(0).unwrap();
        assert_eq!(planner.goal(idle).unwrap().kind, GoalKind::Exploration);
        assert!(planner.ensure_idle_goal(1).is_none());
    }

    #[test]
    fn test_finish_requires_terminal_status() {
        let mut planner = planner();
        let id = planner.add_goal(GoalSpec::new(GoalKind::Build, 3, "x"), 0);
        assert!(planner.finish_goal(id, GoalStatus::Pending, 1).is_err());
        assert!(planner.finish_goal(GoalId(99), GoalStatus::Failed, 1).is_err());
    }
}
