//! Editable add/edit form state for a single task.
//!
//! # Invariants
//! - `set_deadline` never stores an instant earlier than the supplied `now`.
//! - `created_at` is not clamped; users may backdate a task.

use crate::model::task::{clamp_deadline, Priority, Task, TaskId};
use chrono::{DateTime, SubsecRound, Utc};

/// Unsaved task fields as the user edits them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub priority: Priority,
    /// Set when the draft edits an existing task.
    pub editing: Option<TaskId>,
}

impl TaskDraft {
    /// Blank draft for a new task.
    pub fn new(now: DateTime<Utc>) -> Self {
        let now = now.trunc_subsecs(3);
        Self {
            title: String::new(),
            description: String::new(),
            created_at: now,
            deadline: now,
            priority: Priority::Medium,
            editing: None,
        }
    }

    /// Prefilled draft for editing `task`.
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            created_at: task.created_at,
            deadline: task.deadline,
            priority: task.priority,
            editing: Some(task.id.clone()),
        }
    }

    pub fn reset(&mut self, now: DateTime<Utc>) {
        *self = Self::new(now);
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    pub fn set_created_at(&mut self, selected: DateTime<Utc>) {
        self.created_at = selected.trunc_subsecs(3);
    }

    /// Stores `selected`, or `now` if `selected` is in the past.
    pub fn set_deadline(&mut self, selected: DateTime<Utc>, now: DateTime<Utc>) {
        self.deadline = clamp_deadline(selected.trunc_subsecs(3), now.trunc_subsecs(3));
    }

    /// Whether the draft would pass the non-blank title rule.
    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }
}
