use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bucketsync_shared::{Bucket, ListSnapshot, NewTask, TaskId, TaskPatch};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::actions::{
    ActionFlow, ActionPhase, ActionReport, ActionResult, Confirmer, RowAction, RowEvent,
    SPLIT_PROMPT, UNLOCK_PROMPT,
};
use crate::client::SyncApi;
use crate::drag::{DragController, DragGate};
use crate::due::{self, DueDraft, DueEditor};
use crate::error::{SyncError, SyncResult, ValidationError};
use crate::notify::{Notice, Notifier};
use crate::policy::{self, Compensation, DragOutcome, Transition};
use crate::render::{Board, BoardView, Row};

/// What a single poll tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Rendered,
    /// A drag was active; nothing was sent or rendered.
    SkippedDragging,
    /// The response predates a later user action and was dropped.
    Stale,
    Failed,
}

/// How a finished drag was reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragResolution {
    Moved,
    Denied(policy::Denial),
    MoveFailed,
}

/// The reconciliation engine. All visible state flows through
/// [`Engine::apply`]: an authoritative snapshot replaces the whole board.
pub struct Engine {
    api: Arc<dyn SyncApi>,
    view: Arc<dyn BoardView>,
    notifier: Arc<dyn Notifier>,
    confirmer: Arc<dyn Confirmer>,
    drag: DragController,
    board: RwLock<Board>,
    generation: AtomicU64,
    // Bumped whenever a user-triggered request is issued; a poll that saw
    // an older value discards its response.
    mutation_epoch: AtomicU64,
    editor: Mutex<DueEditor>,
}

impl Engine {
    pub fn new(
        api: Arc<dyn SyncApi>,
        view: Arc<dyn BoardView>,
        notifier: Arc<dyn Notifier>,
        confirmer: Arc<dyn Confirmer>,
    ) -> Self {
        Self {
            api,
            view,
            notifier,
            confirmer,
            drag: DragController::new(),
            board: RwLock::new(Board::default()),
            generation: AtomicU64::new(0),
            mutation_epoch: AtomicU64::new(0),
            editor: Mutex::new(DueEditor::default()),
        }
    }

    pub fn drag_gate(&self) -> DragGate {
        self.drag.gate()
    }

    pub fn board(&self) -> Board {
        self.board.read().clone()
    }

    fn apply(&self, snapshot: &ListSnapshot) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let board = Board::from_snapshot(snapshot, generation);
        debug!(
            generation,
            main = snapshot.main_list.len(),
            side_a = snapshot.awaragardi_list.len(),
            side_b = snapshot.home_list.len(),
            "rows replaced"
        );
        *self.board.write() = board.clone();
        self.view.replace(&board);

        let expired = snapshot.expired_count();
        if expired > 0 {
            info!(expired, "server purged expired tasks");
            self.notifier.notify(&Notice::Expired(expired));
        }
    }

    fn notify(&self, notice: Notice) {
        debug!(%notice, "notify");
        self.notifier.notify(&notice);
    }

    fn begin_mutation(&self) {
        self.mutation_epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Forced full refetch. Always rendered, regardless of drag state.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> SyncResult<()> {
        self.begin_mutation();
        let snapshot = self.api.fetch_all().await?;
        self.apply(&snapshot);
        Ok(())
    }

    /// Forced refetch after a denial or failure. Returns whether a fresh
    /// board was rendered; a failed refetch is reported to the user since
    /// the screen may still show an optimistic layout.
    async fn resync(&self) -> bool {
        match self.refresh().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "resync failed");
                self.notify(Notice::RefreshFailed);
                false
            }
        }
    }

    async fn compensate(&self, compensation: Compensation) {
        if compensation == Compensation::Resync {
            self.resync().await;
        }
    }

    /// One background refresh. Never touches the board mid-gesture.
    #[instrument(skip(self))]
    pub async fn poll_once(&self) -> PollOutcome {
        let gate = self.drag.gate();
        if gate.is_dragging() {
            debug!("poll skipped: drag in progress");
            return PollOutcome::SkippedDragging;
        }

        let epoch = self.mutation_epoch.load(Ordering::SeqCst);
        let snapshot = match self.api.fetch_all().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "poll failed");
                return PollOutcome::Failed;
            }
        };

        if gate.is_dragging() {
            debug!("poll response dropped: drag started while in flight");
            return PollOutcome::SkippedDragging;
        }
        if self.mutation_epoch.load(Ordering::SeqCst) != epoch {
            debug!("poll response dropped: superseded by a user action");
            return PollOutcome::Stale;
        }

        self.apply(&snapshot);
        PollOutcome::Rendered
    }

    pub fn begin_drag(&self, task_id: TaskId, from: Bucket) {
        self.drag.begin(task_id, from);
    }

    /// Ends the active gesture and reconciles it with the server. Returns
    /// `None` when no drag was active.
    pub async fn end_drag(&self, to: Bucket, new_index: usize) -> Option<DragResolution> {
        let outcome = self.drag.finish(to, new_index)?;
        Some(self.reconcile_drag(outcome).await)
    }

    #[instrument(skip(self), fields(task = %outcome.task_id, from = %outcome.from, to = %outcome.to, index = outcome.new_index))]
    pub async fn reconcile_drag(&self, outcome: DragOutcome) -> DragResolution {
        let transition = policy::decide(&outcome);
        match &transition {
            Transition::Deny(denial) => {
                info!(?denial, "drag denied");
                self.notify(Notice::Denied(*denial));
                self.compensate(transition.compensation()).await;
                DragResolution::Denied(*denial)
            }
            Transition::Allow(request) => {
                self.begin_mutation();
                match self.api.move_task(request).await {
                    Ok(snapshot) => {
                        self.apply(&snapshot);
                        DragResolution::Moved
                    }
                    Err(err) => {
                        warn!(error = %err, "move failed");
                        self.notify(Notice::MoveFailed);
                        self.compensate(transition.on_failure()).await;
                        DragResolution::MoveFailed
                    }
                }
            }
        }
    }

    /// Routes a row gesture to its handler. The target row is resolved
    /// from the board currently on screen.
    #[instrument(skip(self), fields(task = %event.task_id, action = ?event.action))]
    pub async fn dispatch(&self, event: RowEvent) -> ActionReport {
        let mut flow = ActionFlow::start(event.action, event.task_id.clone());
        let row = self.board.read().row(&event.task_id).cloned();
        let Some(row) = row else {
            warn!("row event for a task that is no longer rendered");
            return finish(flow, ActionResult::Stale);
        };

        let result = match event.action {
            RowAction::ToggleLock => self.toggle_lock(&row, &mut flow).await,
            RowAction::Split => self.split(&row, &mut flow).await,
            RowAction::EditDue => {
                let draft = self.editor.lock().open(&row.task);
                debug!(date = %draft.date, time = %draft.time, "due editor opened");
                return ActionReport {
                    flow,
                    result: ActionResult::AwaitingInput,
                };
            }
            RowAction::Done => self.navigate(&row, &mut flow, RowAction::Done).await,
            RowAction::Delete => self.navigate(&row, &mut flow, RowAction::Delete).await,
        };

        finish(flow, result)
    }

    async fn toggle_lock(&self, row: &Row, flow: &mut ActionFlow) -> ActionResult {
        let id = &row.task.id;
        if row.task.locked {
            if !self.confirm(flow, UNLOCK_PROMPT).await {
                return ActionResult::Cancelled;
            }
            self.in_flight(flow);
            let result = self.api.update(id, &TaskPatch::unlock()).await;
            self.settle(result, Notice::Unlocked, Notice::UnlockFailed, None)
                .await
        } else {
            let index = match row.bucket {
                Bucket::Main => row.index,
                _ => 0,
            };
            self.in_flight(flow);
            let result = self.api.lock_at(id, index).await;
            self.settle(result, Notice::Locked, Notice::LockFailed, None)
                .await
        }
    }

    async fn split(&self, row: &Row, flow: &mut ActionFlow) -> ActionResult {
        if !self.confirm(flow, SPLIT_PROMPT).await {
            return ActionResult::Cancelled;
        }
        self.in_flight(flow);
        let result = self.api.split(&row.task.id).await;
        self.settle(
            result,
            Notice::Split,
            Notice::SplitFailed,
            Some(Notice::SplitUnavailable),
        )
        .await
    }

    async fn navigate(&self, row: &Row, flow: &mut ActionFlow, action: RowAction) -> ActionResult {
        self.in_flight(flow);
        let (result, ok, failed) = match action {
            RowAction::Delete => (
                self.api.delete(&row.task.id).await,
                Notice::Deleted,
                Notice::DeleteFailed,
            ),
            _ => (
                self.api.mark_done(&row.task.id).await,
                Notice::Done,
                Notice::DoneFailed,
            ),
        };

        match result {
            Ok(()) => {
                self.notify(ok);
                if self.resync().await {
                    ActionResult::Rendered
                } else {
                    ActionResult::Unsynced
                }
            }
            Err(err) => {
                warn!(error = %err, "navigation action failed");
                self.notify(failed);
                self.resync().await;
                ActionResult::Failed
            }
        }
    }

    /// Creates a task in its category bank. Input is checked before
    /// anything is sent; the server's snapshot replaces the board.
    #[instrument(skip(self, task), fields(title = %task.title, category = %task.category))]
    pub async fn add_task(&self, task: NewTask) -> ActionResult {
        if task.title.trim().is_empty() || task.category.trim().is_empty() {
            self.notify(Notice::AddInputMissing);
            return ActionResult::Invalid;
        }
        if let Err(err) = due::compose(&task.due_date, &task.due_time) {
            self.notify(validation_notice(err));
            return ActionResult::Invalid;
        }

        self.begin_mutation();
        match self.api.add(&task).await {
            Ok(snapshot) => {
                self.apply(&snapshot);
                self.notify(Notice::Added);
                ActionResult::Rendered
            }
            Err(err) => {
                warn!(error = %err, "add failed");
                self.notify(Notice::AddFailed);
                self.resync().await;
                ActionResult::Failed
            }
        }
    }

    /// Current due editor draft, if the editor is open.
    pub fn due_draft(&self) -> Option<DueDraft> {
        self.editor.lock().draft().cloned()
    }

    pub fn set_due_fields(&self, date: &str, time: &str) -> bool {
        self.editor.lock().set_fields(date, time)
    }

    pub fn close_due_editor(&self) {
        self.editor.lock().close();
    }

    /// Saves the open due editor. Invalid input keeps the editor open and
    /// sends nothing; once a request is attempted the editor is closed
    /// whatever the outcome.
    #[instrument(skip(self))]
    pub async fn save_due(&self) -> Option<ActionReport> {
        let draft = self.editor.lock().draft().cloned()?;
        let mut flow = ActionFlow::start(RowAction::EditDue, draft.task_id.clone());

        let local_iso = match draft.compose() {
            Ok(value) => value,
            Err(err) => {
                self.notify(validation_notice(err));
                return Some(finish(flow, ActionResult::Invalid));
            }
        };

        let _close = CloseEditor(&self.editor);
        self.in_flight(&mut flow);
        let result = self
            .api
            .update(&draft.task_id, &TaskPatch::due(local_iso))
            .await;
        let outcome = self
            .settle(
                result,
                Notice::DueUpdated,
                Notice::DueUpdateFailed,
                Some(Notice::UpdateUnavailable),
            )
            .await;
        Some(finish(flow, outcome))
    }

    async fn confirm(&self, flow: &mut ActionFlow, prompt: &str) -> bool {
        match flow.confirm_with(self.confirmer.as_ref(), prompt).await {
            Ok(go) => go,
            Err(err) => {
                warn!(error = %err, "confirmation out of order");
                false
            }
        }
    }

    fn in_flight(&self, flow: &mut ActionFlow) {
        if let Err(err) = flow.advance(ActionPhase::InFlight) {
            warn!(error = %err, "action state");
        }
        self.begin_mutation();
    }

    /// Shared tail of every snapshot-returning row action.
    async fn settle(
        &self,
        result: SyncResult<ListSnapshot>,
        ok: Notice,
        failed: Notice,
        unavailable: Option<Notice>,
    ) -> ActionResult {
        match result {
            Ok(snapshot) => {
                self.apply(&snapshot);
                self.notify(ok);
                ActionResult::Rendered
            }
            Err(SyncError::Unavailable { endpoint }) if unavailable.is_some() => {
                info!(%endpoint, "endpoint not available");
                if let Some(notice) = unavailable {
                    self.notify(notice);
                }
                ActionResult::Unavailable
            }
            Err(err) => {
                warn!(error = %err, "row action failed");
                self.notify(failed);
                self.resync().await;
                ActionResult::Failed
            }
        }
    }
}

fn validation_notice(err: ValidationError) -> Notice {
    match err {
        ValidationError::MissingDateOrTime => Notice::DueInputMissing,
        other => Notice::DueInputInvalid(other.to_string()),
    }
}

fn finish(mut flow: ActionFlow, result: ActionResult) -> ActionReport {
    if !flow.phase().is_terminal()
        && let Err(err) = flow.advance(ActionPhase::Resolved)
    {
        warn!(error = %err, "action state");
    }
    ActionReport { flow, result }
}

struct CloseEditor<'a>(&'a Mutex<DueEditor>);

impl Drop for CloseEditor<'_> {
    fn drop(&mut self) {
        self.0.lock().close();
    }
}
