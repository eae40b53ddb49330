#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use bucketsync_core::actions::Confirmer;
use bucketsync_core::client::SyncApi;
use bucketsync_core::engine::Engine;
use bucketsync_core::error::{Endpoint, SyncError, SyncResult};
use bucketsync_core::notify::{Notice, Notifier};
use bucketsync_core::render::{Board, BoardView};
use bucketsync_shared::{ExpiredEntry, ListSnapshot, MoveRequest, NewTask, Task, TaskId, TaskPatch};
use parking_lot::Mutex;
use tokio::sync::{Notify, oneshot};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FetchAll,
    Add(NewTask),
    Move(MoveRequest),
    Update(TaskId, TaskPatch),
    Split(TaskId),
    Done(TaskId),
    Delete(TaskId),
}

pub fn task(id: &str, category: &str) -> Task {
    Task {
        id: TaskId::new(id),
        title: format!("task {id}"),
        category: category.to_string(),
        due_datetime: Some("2025-11-01T09:00:00".to_string()),
        locked: false,
        fixed_pos: None,
        part_label: None,
        in_main: false,
        is_gym: false,
        is_done: false,
        created_at: None,
        updated_at: None,
    }
}

/// Board used by most scenarios:
/// Main [T2, M1, M2, M3], Awaragardi [A1, A2, T1], Home [H1].
pub fn seed() -> ListSnapshot {
    ListSnapshot {
        main_list: vec![
            task("T2", "Necessary"),
            task("M1", "College"),
            task("M2", "Necessary"),
            task("M3", "College"),
        ],
        awaragardi_list: vec![
            task("A1", "Awaragardi"),
            task("A2", "Awaragardi"),
            task("T1", "Awaragardi"),
        ],
        home_list: vec![task("H1", "Home")],
        removed_expired: vec![],
    }
}

/// In-memory stand-in for the task server. Applies moves and updates the
/// way the real server does closely enough for the client protocol.
#[derive(Default)]
pub struct FakeServer {
    state: Mutex<ListSnapshot>,
    calls: Mutex<Vec<Call>>,
    pending_expired: Mutex<Vec<ExpiredEntry>>,
    split_unavailable: Mutex<bool>,
    fail_mutations: Mutex<bool>,
    fail_fetches: Mutex<bool>,
    held_fetch: Mutex<Option<oneshot::Receiver<()>>>,
    /// Signalled when a fetch armed by [`FakeServer::hold_next_fetch`]
    /// has been received and is waiting for release.
    pub fetch_started: Notify,
}

impl FakeServer {
    pub fn with(snapshot: ListSnapshot) -> Arc<Self> {
        let server = Self::default();
        *server.state.lock() = snapshot;
        Arc::new(server)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn moves(&self) -> Vec<MoveRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Move(req) => Some(req),
                _ => None,
            })
            .collect()
    }

    pub fn fetch_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::FetchAll))
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn state(&self) -> ListSnapshot {
        self.state.lock().clone()
    }

    /// Drops a task server-side while the client still shows it.
    pub fn forget(&self, id: &str) {
        Self::take(&mut self.state.lock(), &TaskId::new(id));
    }

    pub fn expire_next(&self, ids: &[&str]) {
        *self.pending_expired.lock() = ids
            .iter()
            .map(|id| ExpiredEntry::Id(TaskId::new(*id)))
            .collect();
    }

    pub fn set_split_unavailable(&self, value: bool) {
        *self.split_unavailable.lock() = value;
    }

    pub fn set_fail_mutations(&self, value: bool) {
        *self.fail_mutations.lock() = value;
    }

    pub fn set_fail_fetches(&self, value: bool) {
        *self.fail_fetches.lock() = value;
    }

    /// The next fetch waits until the returned sender fires.
    pub fn hold_next_fetch(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.held_fetch.lock() = Some(rx);
        tx
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn respond(&self) -> ListSnapshot {
        let mut snapshot = self.state.lock().clone();
        snapshot.removed_expired = std::mem::take(&mut *self.pending_expired.lock());
        snapshot
    }

    fn failure(&self, path: &str) -> SyncResult<()> {
        if *self.fail_mutations.lock() {
            return Err(SyncError::Status {
                path: path.to_string(),
                status: 500,
                reason: Some("boom".to_string()),
            });
        }
        Ok(())
    }

    fn take(state: &mut ListSnapshot, id: &TaskId) -> Option<Task> {
        for list in [
            &mut state.main_list,
            &mut state.awaragardi_list,
            &mut state.home_list,
        ] {
            if let Some(pos) = list.iter().position(|t| &t.id == id) {
                return Some(list.remove(pos));
            }
        }
        None
    }

    fn with_task<F: FnOnce(&mut Task)>(state: &mut ListSnapshot, id: &TaskId, f: F) -> bool {
        state
            .main_list
            .iter_mut()
            .chain(state.awaragardi_list.iter_mut())
            .chain(state.home_list.iter_mut())
            .find(|t| &t.id == id)
            .map(f)
            .is_some()
    }
}

#[async_trait]
impl SyncApi for FakeServer {
    async fn fetch_all(&self) -> SyncResult<ListSnapshot> {
        self.record(Call::FetchAll);
        // Only a held fetch signals, so earlier fetches leave no permit.
        let held = self.held_fetch.lock().take();
        if let Some(rx) = held {
            self.fetch_started.notify_one();
            let _ = rx.await;
        }
        if *self.fail_fetches.lock() {
            return Err(SyncError::transport(
                "/api/tasks",
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
            ));
        }
        Ok(self.respond())
    }

    async fn add(&self, new: &NewTask) -> SyncResult<ListSnapshot> {
        self.record(Call::Add(new.clone()));
        self.failure("/add")?;
        {
            let mut state = self.state.lock();
            let count = state.main_list.len() + state.awaragardi_list.len() + state.home_list.len();
            let mut created = task(&format!("N{}", count + 1), &new.category);
            created.title = new.title.clone();
            created.due_datetime = Some(format!("{}T{}:00", new.due_date, new.due_time));
            match new.category.as_str() {
                "Awaragardi" => state.awaragardi_list.push(created),
                "Home" => state.home_list.push(created),
                _ => state.main_list.push(created),
            }
        }
        Ok(self.respond())
    }

    async fn move_task(&self, request: &MoveRequest) -> SyncResult<ListSnapshot> {
        self.record(Call::Move(request.clone()));
        self.failure("/move")?;
        {
            let mut state = self.state.lock();
            let Some(mut task) = Self::take(&mut state, &request.task_id) else {
                return Err(SyncError::Status {
                    path: "/move".to_string(),
                    status: 404,
                    reason: Some("task not found".to_string()),
                });
            };
            task.in_main = true;
            task.locked = request.locked;
            task.fixed_pos = request.locked.then_some(request.new_index as i64);
            let at = request.new_index.min(state.main_list.len());
            state.main_list.insert(at, task);
        }
        Ok(self.respond())
    }

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> SyncResult<ListSnapshot> {
        self.record(Call::Update(id.clone(), patch.clone()));
        self.failure("/update")?;
        let found = Self::with_task(&mut self.state.lock(), id, |task| {
            if let Some(locked) = patch.locked {
                task.locked = locked;
            }
            if let Some(pos) = patch.fixed_pos {
                task.fixed_pos = pos;
            }
            if let Some(due) = &patch.due_datetime {
                task.due_datetime = Some(due.clone());
            }
        });
        if !found {
            return Err(SyncError::Unavailable {
                endpoint: Endpoint::Update,
            });
        }
        Ok(self.respond())
    }

    async fn split(&self, id: &TaskId) -> SyncResult<ListSnapshot> {
        self.record(Call::Split(id.clone()));
        if *self.split_unavailable.lock() {
            return Err(SyncError::Unavailable {
                endpoint: Endpoint::Split,
            });
        }
        self.failure("/split")?;
        {
            let mut state = self.state.lock();
            let mut copy = None;
            Self::with_task(&mut state, id, |task| {
                task.part_label = Some("Part 1".to_string());
                let mut part = task.clone();
                part.id = TaskId::new(format!("{id}-2"));
                part.part_label = Some("Part 2".to_string());
                copy = Some(part);
            });
            if let Some(part) = copy {
                state.main_list.push(part);
            }
        }
        Ok(self.respond())
    }

    async fn mark_done(&self, id: &TaskId) -> SyncResult<()> {
        self.record(Call::Done(id.clone()));
        self.failure("/done")?;
        Self::take(&mut self.state.lock(), id);
        Ok(())
    }

    async fn delete(&self, id: &TaskId) -> SyncResult<()> {
        self.record(Call::Delete(id.clone()));
        self.failure("/delete")?;
        Self::take(&mut self.state.lock(), id);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingView {
    boards: Mutex<Vec<Board>>,
}

impl RecordingView {
    pub fn boards(&self) -> Vec<Board> {
        self.boards.lock().clone()
    }

    pub fn render_count(&self) -> usize {
        self.boards.lock().len()
    }
}

impl BoardView for RecordingView {
    fn replace(&self, board: &Board) {
        self.boards.lock().push(board.clone());
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &Notice) {
        self.notices.lock().push(notice.clone());
    }
}

/// Answers prompts from a script; an exhausted script declines.
#[derive(Default)]
pub struct ScriptedConfirmer {
    answers: Mutex<VecDeque<bool>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedConfirmer {
    pub fn answer(&self, yes: bool) {
        self.answers.lock().push_back(yes);
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl Confirmer for ScriptedConfirmer {
    async fn confirm(&self, prompt: &str) -> bool {
        self.prompts.lock().push(prompt.to_string());
        self.answers.lock().pop_front().unwrap_or(false)
    }
}

pub struct Harness {
    pub server: Arc<FakeServer>,
    pub view: Arc<RecordingView>,
    pub notifier: Arc<RecordingNotifier>,
    pub confirmer: Arc<ScriptedConfirmer>,
    pub engine: Arc<Engine>,
}

impl Harness {
    pub fn new(snapshot: ListSnapshot) -> Self {
        let server = FakeServer::with(snapshot);
        let view = Arc::new(RecordingView::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let confirmer = Arc::new(ScriptedConfirmer::default());
        let engine = Arc::new(Engine::new(
            server.clone(),
            view.clone(),
            notifier.clone(),
            confirmer.clone(),
        ));
        Self {
            server,
            view,
            notifier,
            confirmer,
            engine,
        }
    }

    /// Harness with the seed board already rendered and call log cleared.
    pub async fn loaded() -> Self {
        let harness = Self::new(seed());
        harness
            .engine
            .refresh()
            .await
            .expect("initial fetch");
        harness.server.clear_calls();
        harness
    }

    pub fn main_ids(&self) -> Vec<String> {
        self.engine
            .board()
            .rows(bucketsync_shared::Bucket::Main)
            .iter()
            .map(|row| row.task.id.to_string())
            .collect()
    }
}
