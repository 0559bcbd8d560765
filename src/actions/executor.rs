//! Action executor capability
//!
//! Movement, mining, combat and inventory handling live outside the brain.
//! The brain hands over one intent at a time and polls for its result.

use crate::actions::{ActionStatus, Intent};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Executes one current intent at a time
pub trait ActionExecutor: Send {
    /// Make `intent` the current intent. Re-issuing the current intent is a no-op.
    fn issue(&mut self, intent: Intent);

    /// Progress of the current intent. Terminal results are reported once,
    /// after which the executor is `Idle` until the next issue.
    fn poll(&mut self) -> ActionStatus;
}

#[derive(Debug, Default)]
struct ScriptState {
    issued: Vec<Intent>,
    outcomes: VecDeque<bool>,
}

/// Inspection/control handle for a [`ScriptedExecutor`] owned by a brain
#[derive(Debug, Clone, Default)]
pub struct ScriptHandle {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptHandle {
    /// Every intent that actually changed the executor's current intent
    pub fn issued(&self) -> Vec<Intent> {
        self.state.lock().map(|s| s.issued.clone()).unwrap_or_default()
    }

    /// Script the result of the next completed intent (true = success)
    pub fn push_outcome(&self, success: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.outcomes.push_back(success);
        }
    }
}

/// Deterministic executor: every intent takes a fixed number of polls
///
/// Used by the console demo and by tests. Results default to success unless
/// scripted otherwise through the [`ScriptHandle`].
pub struct ScriptedExecutor {
    duration: u32,
    current: Option<(Intent, u32)>,
    handle: ScriptHandle,
}

impl ScriptedExecutor {
    pub fn new(duration: u32) -> Self {
        Self {
            duration,
            current: None,
            handle: ScriptHandle::default(),
        }
    }

    pub fn handle(&self) -> ScriptHandle {
        self.handle.clone()
    }
}

impl ActionExecutor for ScriptedExecutor {
    fn issue(&mut self, intent: Intent) {
        if let Some((current, _)) = &self.current {
            if *current == intent {
                return;
            }
        }
        if let Ok(mut state) = self.handle.state.lock() {
            state.issued.push(intent.clone());
        }
        self.current = Some((intent, self.duration));
    }

    fn poll(&mut self) -> ActionStatus {
        let Some((_, remaining)) = self.current.as_mut() else {
            return ActionStatus::Idle;
        };

        if *remaining > 0 {
            *remaining -= 1;
            return ActionStatus::InProgress;
        }

        self.current = None;
        let success = self
            .handle
            .state
            .lock()
            .ok()
            .and_then(|mut s| s.outcomes.pop_front())
            .unwrap_or(true);

        if success {
            ActionStatus::Succeeded
        } else {
            ActionStatus::Failed("scripted failure".into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reissue_is_idempotent() {
        let mut exec = ScriptedExecutor::new(2);
        let handle = exec.handle();

        exec.issue(Intent::Stop);
        exec.issue(Intent::Stop);
        assert_eq!(handle.issued().len(), 1);
    }

    #[test]
    fn test_completes_after_duration() {
        let mut exec = ScriptedExecutor::new(2);
        exec.issue(Intent::UseItem { item: "bread".into() });

        assert_eq!(exec.poll(), ActionStatus::InProgress);
        assert_eq!(exec.poll(), ActionStatus::InProgress);
        assert_eq!(exec.poll(), ActionStatus::Succeeded);
        assert_eq!(exec.poll(), ActionStatus::Idle);
    }

    #[test]
    fn test_scripted_failure() {
        let mut exec = ScriptedExecutor::new(0);
        exec.handle().push_outcome(false);
        exec.issue(Intent::Stop);

        assert!(matches!(exec.poll(), ActionStatus::Failed(_)));
    }
}
