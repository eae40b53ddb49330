use std::sync::Arc;

use bucketsync_shared::{Bucket, TaskId};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::policy::DragOutcome;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging { task_id: TaskId, from: Bucket },
}

/// Owns the gesture state shared by all three buckets.
#[derive(Debug, Default)]
pub struct DragController {
    state: Arc<RwLock<DragState>>,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view handed to the poll scheduler.
    pub fn gate(&self) -> DragGate {
        DragGate {
            state: Arc::clone(&self.state),
        }
    }

    pub fn begin(&self, task_id: TaskId, from: Bucket) {
        let mut state = self.state.write();
        if let DragState::Dragging { task_id: prev, .. } = &*state {
            warn!(previous = %prev, next = %task_id, "drag started while another was active");
        }
        debug!(task = %task_id, %from, "drag start");
        *state = DragState::Dragging { task_id, from };
    }

    /// Ends the gesture. Returns `None` when no drag was active.
    pub fn finish(&self, to: Bucket, new_index: usize) -> Option<DragOutcome> {
        let previous = std::mem::take(&mut *self.state.write());
        match previous {
            DragState::Dragging { task_id, from } => {
                debug!(task = %task_id, %from, %to, new_index, "drag end");
                Some(DragOutcome {
                    task_id,
                    from,
                    to,
                    new_index,
                })
            }
            DragState::Idle => {
                warn!(%to, new_index, "drag end without a matching start");
                None
            }
        }
    }

    pub fn cancel(&self) {
        *self.state.write() = DragState::Idle;
    }
}

#[derive(Debug, Clone)]
pub struct DragGate {
    state: Arc<RwLock<DragState>>,
}

impl DragGate {
    pub fn is_dragging(&self) -> bool {
        matches!(*self.state.read(), DragState::Dragging { .. })
    }

    pub fn state(&self) -> DragState {
        self.state.read().clone()
    }
}
