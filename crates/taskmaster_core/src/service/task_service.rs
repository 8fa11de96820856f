//! Task list controller for the signed-in identity.
//!
//! # Responsibility
//! - Hold the in-memory task list of the current identity.
//! - Apply add/update/toggle/delete and persist the full list after each one.
//! - Reload when the session switches to another identity.
//!
//! # Invariants
//! - Every operation needs a signed-in identity; otherwise nothing changes.
//! - A mutation is committed in memory only after the store accepted it, so
//!   the in-memory list always equals the last persisted list.
//! - Task ids are unique inside the list.

use crate::clock::Clock;
use crate::model::draft::TaskDraft;
use crate::model::task::{Priority, Task, TaskId};
use crate::repo::task_store::LocalTaskStore;
use crate::service::alert::Alert;
use crate::session::{SessionHandle, SessionSnapshot};
use crate::storage::{KeyValueStore, StorageError};
use chrono::{DateTime, SubsecRound, Utc};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

pub type TaskResult<T> = Result<T, TaskError>;

/// Task operation failure.
#[derive(Debug)]
pub enum TaskError {
    /// No identity is signed in.
    NotAuthenticated,
    /// Local persistence failed; in-memory state was left unchanged.
    Storage(StorageError),
}

impl Display for TaskError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "not signed in"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TaskError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotAuthenticated => None,
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<StorageError> for TaskError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

/// User action a `TaskError` is reported for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOp {
    Load,
    Add,
    Update,
    Toggle,
    Delete,
}

impl TaskError {
    /// Alert text shown to the user for a failed `op`.
    pub fn alert(&self, op: TaskOp) -> Alert {
        let message = match (self, op) {
            (Self::NotAuthenticated, TaskOp::Load) => "Please sign in to view your todos.",
            (Self::NotAuthenticated, TaskOp::Add) => "Please sign in to add todos.",
            (Self::NotAuthenticated, TaskOp::Update | TaskOp::Toggle) => {
                "Please sign in to update todos."
            }
            (Self::NotAuthenticated, TaskOp::Delete) => "Please sign in to delete todos.",
            (Self::Storage(_), TaskOp::Load) => "Failed to load todos. Please try again.",
            (Self::Storage(_), _) => "Failed to save todos. Please try again.",
        };
        Alert::error(message)
    }
}

/// Fields for a new task; omitted values take defaults at insert time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub priority: Option<Priority>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Partial update; `None` keeps the existing value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub priority: Option<Priority>,
}

impl TaskPatch {
    /// Patch that overwrites every editable field with the draft's values.
    pub fn from_draft(draft: &TaskDraft) -> Self {
        Self {
            title: Some(draft.title.clone()),
            description: Some(draft.description.clone()),
            created_at: Some(draft.created_at),
            deadline: Some(draft.deadline),
            priority: Some(draft.priority),
        }
    }
}

/// Display order for `sorted_tasks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskOrder {
    #[default]
    Insertion,
    CreatedAt,
    Deadline,
}

/// In-memory task list bound to the session's current identity.
pub struct TaskListController<S: KeyValueStore> {
    store: LocalTaskStore<S>,
    session: SessionHandle,
    events: Receiver<SessionSnapshot>,
    clock: Arc<dyn Clock>,
    owner: Option<String>,
    /// Whether `tasks` reflects a successful load for `owner`.
    synced: bool,
    tasks: Vec<Task>,
    loading: bool,
}

impl<S: KeyValueStore> TaskListController<S> {
    /// Creates an empty controller watching `session`.
    ///
    /// Call `pump_session_events` to load the current identity's tasks.
    pub fn new(store: LocalTaskStore<S>, session: SessionHandle, clock: Arc<dyn Clock>) -> Self {
        let events = session.watch();
        Self {
            store,
            session,
            events,
            clock,
            owner: None,
            synced: false,
            tasks: Vec::new(),
            loading: true,
        }
    }

    /// Owner of the list currently held in memory.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// True until the session has settled and the owner's first load has
    /// finished (successfully or not), and again while the list is reloaded
    /// for a new identity.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Tasks in `order`; ties keep insertion order.
    pub fn sorted_tasks(&self, order: TaskOrder) -> Vec<&Task> {
        let mut sorted = self.tasks.iter().collect::<Vec<_>>();
        match order {
            TaskOrder::Insertion => {}
            TaskOrder::CreatedAt => sorted.sort_by_key(|task| task.created_at),
            TaskOrder::Deadline => sorted.sort_by_key(|task| task.deadline),
        }
        sorted
    }

    /// Drains session notifications and follows the latest identity.
    pub fn pump_session_events(&mut self) -> TaskResult<()> {
        let mut latest = None;
        for snapshot in self.events.try_iter() {
            latest = Some(snapshot);
        }
        match latest {
            Some(snapshot) => self.apply_session(&snapshot),
            None => {
                let current = self.session.snapshot();
                self.apply_session(&current)
            }
        }
    }

    /// Follows one session snapshot.
    ///
    /// A different identity discards the list and loads the new owner's
    /// collection; sign-out discards the list.
    pub fn apply_session(&mut self, snapshot: &SessionSnapshot) -> TaskResult<()> {
        if snapshot.loading {
            self.loading = true;
            return Ok(());
        }
        let next_owner = snapshot.identity.as_ref().map(|identity| identity.owner_id());
        if next_owner == self.owner.as_deref() {
            self.loading = false;
            return Ok(());
        }

        self.tasks.clear();
        self.synced = false;
        self.owner = next_owner.map(str::to_string);
        match self.owner.clone() {
            Some(owner) => self.load_for(&owner),
            None => {
                self.loading = false;
                info!("event=tasks_reset module=service status=ok reason=signed_out");
                Ok(())
            }
        }
    }

    /// Replaces the list with the stored collection of the active identity.
    ///
    /// On failure the previous list is kept.
    pub fn load(&mut self) -> TaskResult<()> {
        self.pump_session_events()?;
        let owner = self.owner.clone().ok_or(TaskError::NotAuthenticated)?;
        self.load_for(&owner)
    }

    /// Adds a task. A blank title is ignored and returns `Ok(None)`.
    pub fn add(&mut self, new_task: NewTask) -> TaskResult<Option<TaskId>> {
        let owner = self.require_owner()?;
        let title = new_task.title.trim();
        if title.is_empty() {
            return Ok(None);
        }

        let now = self.clock.now();
        let task = Task {
            id: self.next_id(now),
            title: title.to_string(),
            description: new_task
                .description
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
            created_at: new_task.created_at.unwrap_or(now).trunc_subsecs(3),
            deadline: new_task.deadline.unwrap_or(now).trunc_subsecs(3),
            priority: new_task.priority.unwrap_or_default(),
            completed: false,
            owner: owner.clone(),
        };
        let id = task.id.clone();

        let mut next = self.tasks.clone();
        next.push(task);
        self.commit(&owner, next, TaskOp::Add)?;
        Ok(Some(id))
    }

    /// Merges `patch` into task `id`. Unknown ids and blank titles are no-ops.
    pub fn update(&mut self, id: &str, patch: TaskPatch) -> TaskResult<bool> {
        let owner = self.require_owner()?;
        if patch
            .title
            .as_deref()
            .is_some_and(|title| title.trim().is_empty())
        {
            return Ok(false);
        }
        let Some(index) = self.position(id) else {
            return Ok(false);
        };

        let mut next = self.tasks.clone();
        let task = &mut next[index];
        if let Some(title) = patch.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            task.description = description.trim().to_string();
        }
        if let Some(created_at) = patch.created_at {
            task.created_at = created_at.trunc_subsecs(3);
        }
        if let Some(deadline) = patch.deadline {
            task.deadline = deadline.trunc_subsecs(3);
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        task.owner = owner.clone();

        self.commit(&owner, next, TaskOp::Update)?;
        Ok(true)
    }

    /// Flips the completed flag of task `id`.
    pub fn toggle_completed(&mut self, id: &str) -> TaskResult<bool> {
        let owner = self.require_owner()?;
        let Some(index) = self.position(id) else {
            return Ok(false);
        };

        let mut next = self.tasks.clone();
        next[index].completed = !next[index].completed;
        self.commit(&owner, next, TaskOp::Toggle)?;
        Ok(true)
    }

    /// Removes task `id`.
    pub fn delete(&mut self, id: &str) -> TaskResult<bool> {
        let owner = self.require_owner()?;
        let Some(index) = self.position(id) else {
            return Ok(false);
        };

        let mut next = self.tasks.clone();
        next.remove(index);
        self.commit(&owner, next, TaskOp::Delete)?;
        Ok(true)
    }

    /// Saves a form draft: updates when it edits a task, adds otherwise.
    ///
    /// Returns the affected task id, or `None` when nothing was stored.
    pub fn save_draft(&mut self, draft: &TaskDraft) -> TaskResult<Option<TaskId>> {
        match &draft.editing {
            Some(id) => {
                let changed = self.update(id, TaskPatch::from_draft(draft))?;
                Ok(changed.then(|| id.clone()))
            }
            None => self.add(NewTask {
                title: draft.title.clone(),
                description: Some(draft.description.clone()),
                created_at: Some(draft.created_at),
                deadline: Some(draft.deadline),
                priority: Some(draft.priority),
            }),
        }
    }

    /// Blank draft stamped with the controller's clock.
    pub fn new_draft(&self) -> TaskDraft {
        TaskDraft::new(self.clock.now())
    }

    /// Applies the deadline policy to `draft` using the controller's clock.
    pub fn pick_deadline(&self, draft: &mut TaskDraft, selected: DateTime<Utc>) {
        draft.set_deadline(selected, self.clock.now());
    }

    /// Current owner, with its collection loaded.
    ///
    /// A collection that failed to load is retried here so a mutation can
    /// never overwrite stored tasks that were not read.
    fn require_owner(&mut self) -> TaskResult<String> {
        self.pump_session_events()?;
        let owner = self.owner.clone().ok_or(TaskError::NotAuthenticated)?;
        if !self.synced {
            self.load_for(&owner)?;
        }
        Ok(owner)
    }

    fn load_for(&mut self, owner: &str) -> TaskResult<()> {
        self.loading = true;
        let result = self.store.load(owner);
        self.loading = false;

        match result {
            Ok(tasks) => {
                info!(
                    "event=tasks_load module=service status=ok count={}",
                    tasks.len()
                );
                self.tasks = tasks;
                self.synced = true;
                Ok(())
            }
            Err(err) => {
                warn!("event=tasks_load module=service status=error error={err}");
                Err(err.into())
            }
        }
    }

    fn commit(&mut self, owner: &str, next: Vec<Task>, op: TaskOp) -> TaskResult<()> {
        if let Err(err) = self.store.save(owner, &next) {
            warn!("event=tasks_commit module=service status=error op={op:?} error={err}");
            return Err(err.into());
        }
        info!(
            "event=tasks_commit module=service status=ok op={op:?} count={}",
            next.len()
        );
        self.tasks = next;
        Ok(())
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|task| task.id == id)
    }

    fn next_id(&self, now: DateTime<Utc>) -> TaskId {
        let mut candidate = now.timestamp_millis();
        while self.tasks.iter().any(|task| task.id == candidate.to_string()) {
            candidate += 1;
        }
        candidate.to_string()
    }
}
