//! Shared goal state machine
//!
//! PROPOSED -> FORMING -> ACTIVE -> RESOLVING -> COMPLETE, with DISBANDED
//! reachable from every non-terminal state. All transitions happen under
//! the owning board's per-team lock; this type itself is plain data.

use crate::core::config::CoordinationConfig;
use crate::core::error::{MindError, Result};
use crate::core::types::{AgentId, SharedGoalId, Tick};
use crate::goals::{GoalOrigin, GoalSpec, GoalStatus};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeamState {
    Proposed,
    Forming,
    Active,
    Resolving,
    Complete,
    Disbanded,
}

impl TeamState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TeamState::Complete | TeamState::Disbanded)
    }
}

/// Message delivered to one agent's mailbox
#[derive(Debug, Clone, PartialEq)]
pub enum TeamNotice {
    /// Pursue `spec` as task `task` of `team`
    Assigned { team: SharedGoalId, task: usize, spec: GoalSpec },
    /// The team disbanded; drop its tasks
    Cancelled { team: SharedGoalId },
    /// Tasks nobody was left to take over (sent to the proposer)
    PartialFailure { team: SharedGoalId, tasks: Vec<usize> },
    /// Every task resolved
    Completed { team: SharedGoalId, success: bool },
}

/// One unit of the partitioned goal
#[derive(Debug, Clone, Serialize)]
pub struct TeamTask {
    pub spec: GoalSpec,
    pub assignee: Option<AgentId>,
    /// `None` until the assignee reports a terminal status
    pub outcome: Option<GoalStatus>,
}

impl TeamTask {
    fn is_resolved(&self) -> bool {
        self.outcome.is_some()
    }
}

pub type Notices = Vec<(AgentId, TeamNotice)>;

#[derive(Debug, Clone, Serialize)]
pub struct SharedGoal {
    pub id: SharedGoalId,
    pub proposer: AgentId,
    pub goal: GoalSpec,
    pub state: TeamState,
    pub leader: Option<AgentId>,
    /// Leader first, then helpers in joining order
    pub participants: Vec<AgentId>,
    pub tasks: Vec<TeamTask>,
    pub proposed_tick: Tick,
    /// Tick the team reached COMPLETE or DISBANDED
    pub closed_tick: Option<Tick>,
}

impl SharedGoal {
    /// A fresh proposal; with no explicit tasks the goal itself is the only task
    pub fn new(proposer: AgentId, goal: GoalSpec, tasks: Vec<GoalSpec>, tick: Tick) -> Self {
        let tasks = if tasks.is_empty() { vec![goal.clone()] } else { tasks };
        Self {
            id: SharedGoalId::new(),
            proposer,
            goal,
            state: TeamState::Proposed,
            leader: None,
            participants: Vec::new(),
            tasks: tasks
                .into_iter()
                .map(|spec| TeamTask { spec, assignee: None, outcome: None })
                .collect(),
            proposed_tick: tick,
            closed_tick: None,
        }
    }

    pub fn is_member(&self, agent: AgentId) -> bool {
        self.participants.contains(&agent)
    }

    /// First claimant becomes leader; every later claim is rejected
    pub fn claim_leadership(&mut self, agent: AgentId) -> Result<()> {
        if self.state != TeamState::Proposed || self.leader.is_some() {
            return Err(MindError::AlreadyFormed(self.id));
        }
        self.leader = Some(agent);
        self.participants.retain(|p| *p != agent);
        self.participants.insert(0, agent);
        self.state = TeamState::Forming;
        tracing::info!(team = %self.id, leader = %agent, "Team forming");
        Ok(())
    }

    /// Opt in as a helper while the team is still soliciting participants
    pub fn join(&mut self, agent: AgentId) -> Result<()> {
        match self.state {
            TeamState::Proposed | TeamState::Forming => {
                if !self.is_member(agent) {
                    self.participants.push(agent);
                    tracing::info!(team = %self.id, %agent, members = self.participants.len(), "Agent joined team");
                }
                Ok(())
            }
            state => Err(MindError::InvalidTransition {
                id: self.id,
                reason: format!("cannot join a team in state {:?}", state),
            }),
        }
    }

    /// Time-driven transitions: activation on quorum, disbanding on timeout,
    /// completion after resolution
    pub fn advance(&mut self, now: Tick, config: &CoordinationConfig, notices: &mut Notices) {
        match self.state {
            TeamState::Forming if self.participants.len() >= config.quorum => self.activate(notices),
            TeamState::Proposed | TeamState::Forming
                if now.saturating_sub(self.proposed_tick) >= config.formation_timeout_ticks =>
            {
                tracing::info!(team = %self.id, members = self.participants.len(), "Quorum not reached; team disbanded");
                self.disband(now, notices);
            }
            TeamState::Resolving => {
                let success = self.tasks.iter().all(|t| t.outcome == Some(GoalStatus::Succeeded));
                self.state = TeamState::Complete;
                self.closed_tick = Some(now);
                tracing::info!(team = %self.id, success, "Team complete");
                for agent in self.recipients() {
                    notices.push((agent, TeamNotice::Completed { team: self.id, success }));
                }
            }
            _ => {}
        }
    }

    /// Round-robin the tasks over the participants
    fn activate(&mut self, notices: &mut Notices) {
        let members = self.participants.len();
        for (index, task) in self.tasks.iter_mut().enumerate() {
            let agent = self.participants[index % members];
            task.assignee = Some(agent);
            notices.push((
                agent,
                TeamNotice::Assigned {
                    team: self.id,
                    task: index,
                    spec: task.spec.clone(),
                },
            ));
        }
        self.state = TeamState::Active;
        tracing::info!(team = %self.id, members, tasks = self.tasks.len(), "Team active");
    }

    /// Record the terminal status of a task reported by its assignee
    pub fn report(&mut self, task: usize, agent: AgentId, status: GoalStatus) -> Result<()> {
        if self.state != TeamState::Active {
            return Err(MindError::InvalidTransition {
                id: self.id,
                reason: format!("report in state {:?}", self.state),
            });
        }
        if !status.is_terminal() {
            return Err(MindError::InvalidTransition {
                id: self.id,
                reason: format!("{:?} is not a terminal task status", status),
            });
        }
        let entry = self.tasks.get_mut(task).ok_or_else(|| MindError::InvalidTransition {
            id: self.id,
            reason: format!("no task {}", task),
        })?;
        if entry.assignee != Some(agent) {
            return Err(MindError::InvalidTransition {
                id: self.id,
                reason: format!("task {} is not assigned to {}", task, agent),
            });
        }

        entry.outcome = Some(status);
        self.resolve_if_done();
        Ok(())
    }

    /// Remove a participant, handing its open tasks to the others
    pub fn leave(&mut self, agent: AgentId, now: Tick, notices: &mut Notices) -> Result<()> {
        if !self.is_member(agent) {
            return Err(MindError::InvalidTransition {
                id: self.id,
                reason: format!("{} is not a member", agent),
            });
        }
        self.participants.retain(|p| *p != agent);

        match self.state {
            TeamState::Proposed | TeamState::Forming => {
                if self.leader == Some(agent) {
                    self.leader = self.participants.first().copied();
                    if self.leader.is_none() {
                        self.disband(now, notices);
                    }
                }
            }
            TeamState::Active => {
                let orphaned: Vec<usize> = self
                    .tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.assignee == Some(agent) && !t.is_resolved())
                    .map(|(i, _)| i)
                    .collect();

                if self.participants.is_empty() {
                    for index in &orphaned {
                        self.tasks[*index].outcome = Some(GoalStatus::Failed);
                    }
                    if !orphaned.is_empty() {
                        notices.push((self.proposer, TeamNotice::PartialFailure { team: self.id, tasks: orphaned }));
                    }
                } else {
                    for index in orphaned {
                        let heir = self.least_loaded();
                        self.tasks[index].assignee = Some(heir);
                        tracing::info!(team = %self.id, task = index, to = %heir, "Task reassigned");
                        notices.push((
                            heir,
                            TeamNotice::Assigned {
                                team: self.id,
                                task: index,
                                spec: self.tasks[index].spec.clone(),
                            },
                        ));
                    }
                }
                if self.leader == Some(agent) {
                    self.leader = self.participants.first().copied();
                }
                self.resolve_if_done();
            }
            _ => {}
        }
        Ok(())
    }

    /// Disband on request of the proposer or leader
    pub fn cancel(&mut self, agent: AgentId, now: Tick, notices: &mut Notices) -> Result<()> {
        if agent != self.proposer && Some(agent) != self.leader {
            return Err(MindError::InvalidTransition {
                id: self.id,
                reason: format!("{} may not cancel this team", agent),
            });
        }
        if self.state.is_terminal() {
            return Ok(());
        }
        self.disband(now, notices);
        Ok(())
    }

    fn disband(&mut self, now: Tick, notices: &mut Notices) {
        self.state = TeamState::Disbanded;
        self.closed_tick = Some(now);
        for agent in self.recipients() {
            notices.push((agent, TeamNotice::Cancelled { team: self.id }));
        }
    }

    fn resolve_if_done(&mut self) {
        if self.state == TeamState::Active && self.tasks.iter().all(TeamTask::is_resolved) {
            self.state = TeamState::Resolving;
            tracing::info!(team = %self.id, "Team resolving");
        }
    }

    fn least_loaded(&self) -> AgentId {
        self.participants
            .iter()
            .copied()
            .min_by_key(|p| {
                self.tasks
                    .iter()
                    .filter(|t| t.assignee == Some(*p) && !t.is_resolved())
                    .count()
            })
            .unwrap_or(self.proposer)
    }

    /// Participants plus the proposer, each once
    fn recipients(&self) -> Vec<AgentId> {
        let mut recipients = self.participants.clone();
        if !recipients.contains(&self.proposer) {
            recipients.push(self.proposer);
        }
        recipients
    }
}

/// Goal origin for task `task` of `team`
pub fn task_origin(team: SharedGoalId, task: usize) -> GoalOrigin {
    GoalOrigin::Team { team, task }
}
