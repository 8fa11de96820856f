//! Per-owner task collections on top of a `KeyValueStore`.
//!
//! # Responsibility
//! - Derive the storage key for an owner.
//! - Encode and decode the full task list as one JSON value.
//!
//! # Invariants
//! - `save` always writes the complete collection.
//! - Every stored task belongs to the owner whose key it is stored under.
//! - Task ids are unique inside one stored collection.

use crate::model::task::Task;
use crate::storage::{KeyValueStore, StorageError, StorageResult};
use log::{debug, error};
use std::collections::HashSet;

/// Prefix of every task collection key.
pub const STORAGE_KEY_PREFIX: &str = "@todos_";

/// Storage key for `owner`'s task collection.
pub fn storage_key(owner: &str) -> String {
    format!("{STORAGE_KEY_PREFIX}{owner}")
}

/// Task collection persistence partitioned by owner email.
#[derive(Debug)]
pub struct LocalTaskStore<S: KeyValueStore> {
    kv: S,
}

impl<S: KeyValueStore> LocalTaskStore<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    pub fn kv(&self) -> &S {
        &self.kv
    }

    /// Reads `owner`'s collection; a missing key is an empty collection.
    pub fn load(&self, owner: &str) -> StorageResult<Vec<Task>> {
        let raw = self.kv.get(&storage_key(owner)).inspect_err(|err| {
            error!("event=tasks_load module=repo status=error stage=read error={err}");
        })?;

        let tasks = match raw {
            Some(raw) => decode_tasks(owner, &raw).inspect_err(|err| {
                error!("event=tasks_load module=repo status=error stage=decode error={err}");
            })?,
            None => Vec::new(),
        };
        debug!(
            "event=tasks_load module=repo status=ok count={}",
            tasks.len()
        );
        Ok(tasks)
    }

    /// Replaces `owner`'s stored collection with `tasks`.
    pub fn save(&self, owner: &str, tasks: &[Task]) -> StorageResult<()> {
        let encoded = encode_tasks(owner, tasks)?;
        self.kv
            .set(&storage_key(owner), &encoded)
            .inspect_err(|err| {
                error!("event=tasks_save module=repo status=error stage=write error={err}");
            })?;
        debug!(
            "event=tasks_save module=repo status=ok count={}",
            tasks.len()
        );
        Ok(())
    }
}

/// Serializes a full collection after checking it belongs to `owner`.
pub fn encode_tasks(owner: &str, tasks: &[Task]) -> StorageResult<String> {
    check_collection(owner, tasks)?;
    serde_json::to_string(tasks).map_err(StorageError::Encode)
}

/// Parses a stored collection and checks it belongs to `owner`.
pub fn decode_tasks(owner: &str, raw: &str) -> StorageResult<Vec<Task>> {
    let tasks: Vec<Task> = serde_json::from_str(raw).map_err(StorageError::Decode)?;
    check_collection(owner, &tasks)?;
    Ok(tasks)
}

fn check_collection(owner: &str, tasks: &[Task]) -> StorageResult<()> {
    let mut seen = HashSet::with_capacity(tasks.len());
    for task in tasks {
        task.validate()
            .map_err(|err| StorageError::InvalidData(format!("task `{}`: {err}", task.id)))?;
        if task.owner != owner {
            return Err(StorageError::InvalidData(format!(
                "task `{}` belongs to a different owner",
                task.id
            )));
        }
        if !seen.insert(task.id.as_str()) {
            return Err(StorageError::InvalidData(format!(
                "duplicate task id `{}`",
                task.id
            )));
        }
    }
    Ok(())
}
