//! Core domain logic for TaskMaster.
//! This crate is the single source of truth for session and task invariants.

pub mod app;
pub mod auth;
pub mod clock;
pub mod db;
pub mod logging;
pub mod model;
pub mod navigation;
pub mod repo;
pub mod service;
pub mod session;
pub mod storage;

pub use app::{AppRuntime, SessionUpdate};
pub use auth::{
    AccountRecord, AccountRegistry, AuthError, AuthForm, AuthResult, IdentityBackend,
    LocalIdentityBackend, MemoryAccountRegistry, SessionListener, SqliteAccountRegistry,
    SubscriptionId,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::draft::TaskDraft;
pub use model::identity::Identity;
pub use model::task::{clamp_deadline, Priority, Task, TaskId, TaskValidationError};
pub use navigation::{Flow, GateState, NavigationGate, Redirect, Screen};
pub use repo::task_store::{storage_key, LocalTaskStore, STORAGE_KEY_PREFIX};
pub use service::alert::Alert;
pub use service::task_service::{
    NewTask, TaskError, TaskListController, TaskOp, TaskOrder, TaskPatch, TaskResult,
};
pub use session::{SessionHandle, SessionSnapshot, SessionStore};
pub use storage::{
    KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore, StorageError, StorageResult,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
