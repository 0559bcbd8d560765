//! Reasoning service capability and the pending-request slot
//!
//! Requests are submitted without waiting. The caller keeps the reply
//! receiver in a [`ReasoningSlot`] and checks it at the start of the tier
//! that issued it; nothing ever blocks the tick.

use crate::core::error::{MindError, Result};
use crate::core::types::Tick;
use crate::llm::client::LlmClient;
use crate::llm::parser::{self, GoalProposal, SkillProposal};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// Why a request was made; selects the prompt and how the reply is read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReasoningPurpose {
    /// Affirm the current goal or propose a replacement
    Replan,
    /// Turn a successful trace into a skill
    GenerateSkill,
    /// Revise a failing skill's action sequence
    RefineSkill { skill: String },
}

#[derive(Debug, Clone)]
pub struct ReasoningRequest {
    pub purpose: ReasoningPurpose,
    /// Context summary sent as the user message
    pub context: String,
}

impl ReasoningRequest {
    pub fn new(purpose: ReasoningPurpose, context: impl Into<String>) -> Self {
        Self { purpose, context: context.into() }
    }
}

/// Structured or free-text reply
#[derive(Debug, Clone, PartialEq)]
pub enum ReasoningReply {
    Goal(GoalProposal),
    Skill(SkillProposal),
    Text(String),
}

pub type ReplyReceiver = oneshot::Receiver<Result<ReasoningReply>>;

/// External reasoning capability
pub trait ReasoningService: Send + Sync {
    /// Start a request; the reply arrives on the returned receiver
    fn submit(&self, request: ReasoningRequest) -> ReplyReceiver;
}

/// State of an outstanding request after one check
#[derive(Debug)]
pub enum PendingPoll {
    Waiting,
    Ready(Result<ReasoningReply>),
    TimedOut,
}

/// One outstanding request plus whatever the caller needs to apply it
#[derive(Debug)]
pub struct PendingReasoning<T> {
    receiver: ReplyReceiver,
    issued_tick: Tick,
    context: T,
    stale: bool,
}

impl<T> PendingReasoning<T> {
    pub fn new(receiver: ReplyReceiver, issued_tick: Tick, context: T) -> Self {
        Self { receiver, issued_tick, context, stale: false }
    }

    pub fn issued_tick(&self) -> Tick {
        self.issued_tick
    }

    pub fn context(&self) -> &T {
        &self.context
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// The eventual reply will be discarded instead of applied
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Non-blocking check; a dropped sender counts as an error reply
    pub fn poll(&mut self, now: Tick, timeout_ticks: u64) -> PendingPoll {
        match self.receiver.try_recv() {
            Ok(result) => PendingPoll::Ready(result),
            Err(TryRecvError::Closed) => PendingPoll::Ready(Err(MindError::LlmError(
                "reasoning service dropped the request".into(),
            ))),
            Err(TryRecvError::Empty) => {
                if now.saturating_sub(self.issued_tick) >= timeout_ticks {
                    PendingPoll::TimedOut
                } else {
                    PendingPoll::Waiting
                }
            }
        }
    }
}

/// A request that left its slot, either answered or timed out
#[derive(Debug)]
pub struct Resolved<T> {
    pub context: T,
    pub issued_tick: Tick,
    pub stale: bool,
    /// Timeouts arrive as `Err(MindError::ReasoningTimeout)`
    pub result: Result<ReasoningReply>,
}

/// At most one outstanding request per subsystem
#[derive(Debug)]
pub struct ReasoningSlot<T> {
    pending: Option<PendingReasoning<T>>,
}

impl<T> Default for ReasoningSlot<T> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<T> ReasoningSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_outstanding(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&PendingReasoning<T>> {
        self.pending.as_ref()
    }

    /// Submit through `service` unless a request is already outstanding
    ///
    /// Returns false when the trigger was skipped.
    pub fn issue(
        &mut self,
        service: &dyn ReasoningService,
        request: ReasoningRequest,
        tick: Tick,
        context: T,
    ) -> bool {
        if self.pending.is_some() {
            return false;
        }
        let receiver = service.submit(request);
        self.pending = Some(PendingReasoning::new(receiver, tick, context));
        true
    }

    /// Mark the outstanding request stale if `predicate` holds for its context
    pub fn mark_stale_if(&mut self, predicate: impl FnOnce(&T) -> bool) -> bool {
        match self.pending.as_mut() {
            Some(pending) if predicate(&pending.context) => {
                pending.mark_stale();
                true
            }
            _ => false,
        }
    }

    /// Check the slot; empties it once the request resolves or times out
    pub fn poll(&mut self, now: Tick, timeout_ticks: u64) -> Option<Resolved<T>> {
        let result = match self.pending.as_mut()?.poll(now, timeout_ticks) {
            PendingPoll::Waiting => return None,
            PendingPoll::Ready(result) => result,
            PendingPoll::TimedOut => Err(MindError::ReasoningTimeout),
        };
        let pending = self.pending.take()?;
        Some(Resolved {
            context: pending.context,
            issued_tick: pending.issued_tick,
            stale: pending.stale,
            result,
        })
    }
}

/// Reasoning backed by the HTTP model client on a tokio runtime
pub struct LlmReasoner {
    client: LlmClient,
    runtime: tokio::runtime::Handle,
    timeout: Duration,
}

impl LlmReasoner {
    pub fn new(client: LlmClient, runtime: tokio::runtime::Handle, timeout: Duration) -> Self {
        Self { client, runtime, timeout }
    }
}

impl ReasoningService for LlmReasoner {
    fn submit(&self, request: ReasoningRequest) -> ReplyReceiver {
        let (tx, rx) = oneshot::channel();
        let client = self.client.clone();
        let timeout = self.timeout;

        self.runtime.spawn(async move {
            let system = parser::system_prompt(&request.purpose);
            let result = match tokio::time::timeout(timeout, client.complete(system, &request.context)).await {
                Ok(Ok(text)) => Ok(parser::interpret_reply(&request.purpose, &text)),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(MindError::ReasoningTimeout),
            };
            if tx.send(result).is_err() {
                tracing::debug!(purpose = ?request.purpose, "Reasoning reply arrived after the caller gave up");
            }
        });
        rx
    }
}

/// Reasoning used when no model is configured: every request fails at once
#[derive(Debug, Default)]
pub struct OfflineReasoner;

impl ReasoningService for OfflineReasoner {
    fn submit(&self, _request: ReasoningRequest) -> ReplyReceiver {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(MindError::LlmError("no reasoning service configured".into())));
        rx
    }
}

/// Reasoning whose replies are delivered by hand, on a tick of the caller's choosing
#[derive(Debug, Default)]
pub struct ManualReasoner {
    queue: Mutex<Vec<(ReasoningRequest, oneshot::Sender<Result<ReasoningReply>>)>>,
}

impl ManualReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Requests still waiting for a reply, oldest first
    pub fn requests(&self) -> Vec<ReasoningRequest> {
        self.queue
            .lock()
            .map(|q| q.iter().map(|(r, _)| r.clone()).collect())
            .unwrap_or_default()
    }

    /// Answer the oldest waiting request; false if none was waiting
    pub fn respond_next(&self, reply: ReasoningReply) -> bool {
        self.resolve_next(Ok(reply))
    }

    /// Fail the oldest waiting request
    pub fn fail_next(&self, message: &str) -> bool {
        self.resolve_next(Err(MindError::LlmError(message.to_string())))
    }

    fn resolve_next(&self, result: Result<ReasoningReply>) -> bool {
        let next = match self.queue.lock() {
            Ok(mut queue) if !queue.is_empty() => queue.remove(0),
            _ => return false,
        };
        // The caller may have timed out and dropped its receiver
        let _ = next.1.send(result);
        true
    }
}

impl ReasoningService for ManualReasoner {
    fn submit(&self, request: ReasoningRequest) -> ReplyReceiver {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut queue) = self.queue.lock() {
            queue.push((request, tx));
        }
        rx
    }
}
