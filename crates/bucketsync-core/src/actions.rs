use async_trait::async_trait;
use bucketsync_shared::TaskId;
use thiserror::Error;
use tracing::trace;

pub const UNLOCK_PROMPT: &str = "Make this task eligible for automatic reordering again?";
pub const SPLIT_PROMPT: &str = "Split this task into parts?";

/// Answers the blocking yes/no questions some row actions ask first.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    ToggleLock,
    Split,
    EditDue,
    Done,
    Delete,
}

/// A user gesture on a rendered row, addressed by task id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowEvent {
    pub action: RowAction,
    pub task_id: TaskId,
}

impl RowEvent {
    pub fn new(action: RowAction, task_id: impl Into<TaskId>) -> Self {
        Self {
            action,
            task_id: task_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPhase {
    Requested,
    ConfirmPending,
    Confirmed,
    Cancelled,
    InFlight,
    Resolved,
}

impl ActionPhase {
    fn can_advance_to(self, next: ActionPhase) -> bool {
        use ActionPhase::*;
        matches!(
            (self, next),
            (Requested, ConfirmPending)
                | (Requested, InFlight)
                | (Requested, Resolved)
                | (ConfirmPending, Confirmed)
                | (ConfirmPending, Cancelled)
                | (Confirmed, InFlight)
                | (InFlight, Resolved)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ActionPhase::Cancelled | ActionPhase::Resolved)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal action transition {from:?} -> {to:?}")]
pub struct IllegalTransition {
    pub from: ActionPhase,
    pub to: ActionPhase,
}

/// How a row action ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionResult {
    /// The server answered with a snapshot and it was rendered.
    Rendered,
    /// The user declined the confirmation; nothing was sent.
    Cancelled,
    /// The server lacks the endpoint; nothing was rendered.
    Unavailable,
    /// Transport or server failure; the view was refetched.
    Failed,
    /// Input was rejected before any request.
    Invalid,
    /// The task is no longer on the board.
    Stale,
    /// An editor was opened and waits for the user to save.
    AwaitingInput,
    /// The server accepted the action but the follow-up refetch failed,
    /// so the board still shows the previous snapshot.
    Unsynced,
}

/// Lifecycle of one row action. Every phase it passed through is kept so
/// callers can assert on the exact path taken.
#[derive(Debug, Clone)]
pub struct ActionFlow {
    pub action: RowAction,
    pub task_id: TaskId,
    phases: Vec<ActionPhase>,
}

impl ActionFlow {
    pub fn start(action: RowAction, task_id: TaskId) -> Self {
        Self {
            action,
            task_id,
            phases: vec![ActionPhase::Requested],
        }
    }

    pub fn phase(&self) -> ActionPhase {
        self.phases
            .last()
            .copied()
            .unwrap_or(ActionPhase::Requested)
    }

    pub fn phases(&self) -> &[ActionPhase] {
        &self.phases
    }

    pub fn advance(&mut self, next: ActionPhase) -> Result<(), IllegalTransition> {
        let from = self.phase();
        if !from.can_advance_to(next) {
            return Err(IllegalTransition { from, to: next });
        }
        trace!(action = ?self.action, task = %self.task_id, ?from, to = ?next, "action phase");
        self.phases.push(next);
        Ok(())
    }

    /// Runs the confirmation step. Returns whether the action may proceed.
    pub async fn confirm_with(
        &mut self,
        confirmer: &dyn Confirmer,
        prompt: &str,
    ) -> Result<bool, IllegalTransition> {
        self.advance(ActionPhase::ConfirmPending)?;
        if confirmer.confirm(prompt).await {
            self.advance(ActionPhase::Confirmed)?;
            Ok(true)
        } else {
            self.advance(ActionPhase::Cancelled)?;
            Ok(false)
        }
    }
}

/// Report returned to the caller of a row action.
#[derive(Debug, Clone)]
pub struct ActionReport {
    pub flow: ActionFlow,
    pub result: ActionResult,
}
