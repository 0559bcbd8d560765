//! Coordination board shared by every agent
//!
//! The only structure more than one agent touches. Each shared goal sits
//! behind its own mutex, so proposing, claiming and joining are serialized
//! per team while different teams proceed independently. Notices are
//! delivered to per-agent mailboxes after the team lock is released.

use crate::coordination::team::{Notices, SharedGoal, TeamNotice, TeamState};
use crate::core::config::CoordinationConfig;
use crate::core::error::{MindError, Result};
use crate::core::types::{AgentId, SharedGoalId, Tick};
use crate::goals::{GoalSpec, GoalStatus};
use ahash::{AHashMap, AHashSet};
use std::sync::{Arc, Mutex, RwLock};

/// Read-only view of a team for listings
#[derive(Debug, Clone)]
pub struct TeamSummary {
    pub id: SharedGoalId,
    pub description: String,
    pub state: TeamState,
    pub leader: Option<AgentId>,
    pub members: usize,
    pub tasks: usize,
}

/// Undelivered notices per agent
#[derive(Debug, Default)]
struct Mailboxes {
    pending: AHashMap<AgentId, Vec<TeamNotice>>,
    /// Agents no longer ticking; notices addressed to them are dropped
    departed: AHashSet<AgentId>,
}

#[derive(Debug, Default)]
pub struct CoordinationBoard {
    teams: RwLock<AHashMap<SharedGoalId, Arc<Mutex<SharedGoal>>>>,
    mailbox: Mutex<Mailboxes>,
}

impl CoordinationBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a proposal; nobody leads it until a claim succeeds
    pub fn propose(&self, proposer: AgentId, goal: GoalSpec, tasks: Vec<GoalSpec>, tick: Tick) -> Result<SharedGoalId> {
        let team = SharedGoal::new(proposer, goal, tasks, tick);
        let id = team.id;
        tracing::info!(team = %id, %proposer, description = %team.goal.description, "Shared goal proposed");
        self.teams
            .write()
            .map_err(|_| MindError::LockPoisoned("coordination teams"))?
            .insert(id, Arc::new(Mutex::new(team)));
        Ok(id)
    }

    /// Become leader; exactly one concurrent claimant succeeds
    pub fn claim_leadership(&self, id: SharedGoalId, agent: AgentId) -> Result<()> {
        self.with_team(id, |team, _| team.claim_leadership(agent))
    }

    pub fn join(&self, id: SharedGoalId, agent: AgentId) -> Result<()> {
        self.with_team(id, |team, _| team.join(agent))
    }

    pub fn report(&self, id: SharedGoalId, task: usize, agent: AgentId, status: GoalStatus) -> Result<()> {
        self.with_team(id, |team, _| team.report(task, agent, status))
    }

    pub fn leave(&self, id: SharedGoalId, agent: AgentId, now: Tick) -> Result<()> {
        self.with_team(id, |team, notices| team.leave(agent, now, notices))
    }

    pub fn cancel(&self, id: SharedGoalId, agent: AgentId, now: Tick) -> Result<()> {
        self.with_team(id, |team, notices| team.cancel(agent, now, notices))
    }

    /// Run time-driven transitions on every team
    pub fn advance(&self, now: Tick, config: &CoordinationConfig) -> Result<()> {
        for team in self.snapshot_teams()? {
            let mut notices = Vec::new();
            {
                let mut team = team.lock().map_err(|_| MindError::LockPoisoned("shared goal"))?;
                team.advance(now, config, &mut notices);
            }
            self.deliver(notices)?;
        }
        Ok(())
    }

    /// Teams still soliciting helpers, oldest first
    pub fn open_proposals(&self) -> Vec<TeamSummary> {
        let mut open: Vec<(Tick, TeamSummary)> = self
            .snapshot_teams()
            .unwrap_or_default()
            .iter()
            .filter_map(|team| {
                let team = team.lock().ok()?;
                matches!(team.state, TeamState::Forming).then(|| (team.proposed_tick, summarize(&team)))
            })
            .collect();
        open.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        open.into_iter().map(|(_, summary)| summary).collect()
    }

    pub fn summary(&self, id: SharedGoalId) -> Option<TeamSummary> {
        let team = self.team(id).ok()?;
        let team = team.lock().ok()?;
        Some(summarize(&team))
    }

    pub fn list(&self) -> Vec<TeamSummary> {
        let mut teams: Vec<TeamSummary> = self
            .snapshot_teams()
            .unwrap_or_default()
            .iter()
            .filter_map(|team| team.lock().ok().map(|t| summarize(&t)))
            .collect();
        teams.sort_by_key(|t| t.id);
        teams
    }

    pub fn state(&self, id: SharedGoalId) -> Option<TeamState> {
        self.summary(id).map(|s| s.state)
    }

    /// Drain an agent's mailbox
    pub fn take_notices(&self, agent: AgentId) -> Vec<TeamNotice> {
        self.mailbox
            .lock()
            .ok()
            .and_then(|mut mailbox| mailbox.pending.remove(&agent))
            .unwrap_or_default()
    }

    /// Accept notices for `agent` again (after a respawn)
    pub fn register(&self, agent: AgentId) {
        if let Ok(mut mailbox) = self.mailbox.lock() {
            mailbox.departed.remove(&agent);
        }
    }

    /// Drop an agent's mailbox and stop collecting notices for it
    pub fn forget(&self, agent: AgentId) {
        if let Ok(mut mailbox) = self.mailbox.lock() {
            let dropped = mailbox.pending.remove(&agent).map_or(0, |n| n.len());
            mailbox.departed.insert(agent);
            if dropped > 0 {
                tracing::debug!(%agent, dropped, "Undelivered notices dropped");
            }
        }
    }

    /// Agents with notices waiting to be read
    pub fn mailbox_count(&self) -> usize {
        self.mailbox.lock().map_or(0, |m| m.pending.len())
    }

    /// Forget closed teams once they have been closed for `retain_ticks`
    pub fn prune(&self, now: Tick, retain_ticks: u64) -> usize {
        let Ok(mut teams) = self.teams.write() else {
            return 0;
        };
        let before = teams.len();
        teams.retain(|_, team| {
            team.lock()
                .ok()
                .and_then(|t| t.closed_tick)
                .map_or(true, |closed| now.saturating_sub(closed) < retain_ticks)
        });
        before - teams.len()
    }

    fn team(&self, id: SharedGoalId) -> Result<Arc<Mutex<SharedGoal>>> {
        self.teams
            .read()
            .map_err(|_| MindError::LockPoisoned("coordination teams"))?
            .get(&id)
            .cloned()
            .ok_or(MindError::SharedGoalNotFound(id))
    }

    fn snapshot_teams(&self) -> Result<Vec<Arc<Mutex<SharedGoal>>>> {
        Ok(self
            .teams
            .read()
            .map_err(|_| MindError::LockPoisoned("coordination teams"))?
            .values()
            .cloned()
            .collect())
    }

    /// Run `f` under the team's lock, then deliver whatever it produced
    fn with_team<T>(&self, id: SharedGoalId, f: impl FnOnce(&mut SharedGoal, &mut Notices) -> Result<T>) -> Result<T> {
        let team = self.team(id)?;
        let mut notices = Vec::new();
        let result = {
            let mut team = team.lock().map_err(|_| MindError::LockPoisoned("shared goal"))?;
            f(&mut team, &mut notices)
        };
        self.deliver(notices)?;
        result
    }

    fn deliver(&self, notices: Notices) -> Result<()> {
        if notices.is_empty() {
            return Ok(());
        }
        let mut mailbox = self
            .mailbox
            .lock()
            .map_err(|_| MindError::LockPoisoned("coordination mailbox"))?;
        for (agent, notice) in notices {
            if mailbox.departed.contains(&agent) {
                continue;
            }
            mailbox.pending.entry(agent).or_default().push(notice);
        }
        Ok(())
    }
}

fn summarize(team: &SharedGoal) -> TeamSummary {
    TeamSummary {
        id: team.id,
        description: team.goal.description.clone(),
        state: team.state,
        leader: team.leader,
        members: team.participants.len(),
        tasks: team.tasks.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goals::GoalKind;

    fn spec() -> GoalSpec {
        GoalSpec::new(GoalKind::Build, 8, "build a wall")
    }

    #[test]
    fn test_notices_reach_mailboxes() {
        let board = CoordinationBoard::new();
        let config = CoordinationConfig::default();
        let alex = AgentId::from_name("alex");
        let sam = AgentId::from_name("sam");

        let id = board.propose(alex, spec(), vec![], 0).unwrap();
        board.claim_leadership(id, alex).unwrap();
        assert_eq!(board.open_proposals().len(), 1);

        board.join(id, sam).unwrap();
        board.advance(1, &config).unwrap();
        assert_eq!(board.state(id), Some(TeamState::Active));
        assert!(board.open_proposals().is_empty());

        let notices = board.take_notices(alex);
        assert!(matches!(notices[0], TeamNotice::Assigned { task: 0, .. }));
        assert!(board.take_notices(alex).is_empty());
        // One task, two members: only the leader gets work
        assert!(board.take_notices(sam).is_empty());
    }

    #[test]
    fn test_forgotten_agent_gets_no_mail() {
        let board = CoordinationBoard::new();
        let alex = AgentId::from_name("alex");
        let sam = AgentId::from_name("sam");
        let id = board.propose(alex, spec(), vec![], 0).unwrap();
        board.claim_leadership(id, alex).unwrap();
        board.join(id, sam).unwrap();

        board.cancel(id, alex, 5).unwrap();
        assert_eq!(board.mailbox_count(), 2);

        board.forget(sam);
        assert_eq!(board.mailbox_count(), 1);

        let other = board.propose(alex, spec(), vec![], 6).unwrap();
        board.claim_leadership(other, alex).unwrap();
        board.join(other, sam).unwrap();
        board.cancel(other, alex, 7).unwrap();
        assert!(board.take_notices(sam).is_empty());
        assert_eq!(board.take_notices(alex).len(), 2);

        board.register(sam);
        let third = board.propose(alex, spec(), vec![], 8).unwrap();
        board.claim_leadership(third, alex).unwrap();
        board.join(third, sam).unwrap();
        board.cancel(third, alex, 9).unwrap();
        assert_eq!(board.take_notices(sam).len(), 1);
    }

    #[test]
    fn test_unknown_team() {
        let board = CoordinationBoard::new();
        let result = board.join(SharedGoalId::new(), AgentId::from_name("x"));
        assert!(matches!(result, Err(MindError::SharedGoalNotFound(_))));
    }

    #[test]
    fn test_prune_keeps_recently_closed() {
        let board = CoordinationBoard::new();
        let alex = AgentId::from_name("alex");
        let id = board.propose(alex, spec(), vec![], 0).unwrap();
        board.cancel(id, alex, 10).unwrap();

        assert_eq!(board.prune(20, 100), 0);
        assert_eq!(board.prune(110, 100), 1);
        assert!(board.summary(id).is_none());
    }
}
