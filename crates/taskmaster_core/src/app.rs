//! Application runtime wiring session, navigation and tasks together.
//!
//! # Responsibility
//! - Own the session subscription for the lifetime of the app.
//! - Route every session change to the navigation gate and task controller.
//!
//! # Invariants
//! - Gate and controller each watch the session from `start` on, so no
//!   notification after start is missed.
//! - Dropping the runtime releases the backend subscription.

use crate::auth::{AuthForm, AuthResult, IdentityBackend};
use crate::clock::Clock;
use crate::navigation::{NavigationGate, Redirect};
use crate::repo::task_store::LocalTaskStore;
use crate::service::alert::Alert;
use crate::service::task_service::{TaskListController, TaskOp};
use crate::session::{SessionSnapshot, SessionStore};
use crate::storage::KeyValueStore;
use log::{info, warn};
use std::sync::Arc;

/// What the view layer must do after session notifications were applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUpdate {
    pub redirects: Vec<Redirect>,
    pub alert: Option<Alert>,
}

/// Running app core for one process.
pub struct AppRuntime<S: KeyValueStore> {
    session: SessionStore,
    gate: NavigationGate,
    tasks: TaskListController<S>,
}

impl<S: KeyValueStore> AppRuntime<S> {
    /// Initializes the session store and attaches gate and controller.
    pub fn start(backend: Arc<dyn IdentityBackend>, kv: S, clock: Arc<dyn Clock>) -> Self {
        let session = SessionStore::init(backend);
        let handle = session.handle();
        let gate = NavigationGate::watching(&handle.snapshot(), handle.watch());
        let tasks = TaskListController::new(LocalTaskStore::new(kv), handle, clock);

        let mut runtime = Self {
            session,
            gate,
            tasks,
        };
        runtime.pump();
        info!("event=app_runtime_start module=app status=ok");
        runtime
    }

    pub fn session(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn backend(&self) -> &Arc<dyn IdentityBackend> {
        self.session.backend()
    }

    pub fn gate(&self) -> &NavigationGate {
        &self.gate
    }

    pub fn gate_mut(&mut self) -> &mut NavigationGate {
        &mut self.gate
    }

    pub fn tasks(&self) -> &TaskListController<S> {
        &self.tasks
    }

    pub fn tasks_mut(&mut self) -> &mut TaskListController<S> {
        &mut self.tasks
    }

    /// Applies pending session notifications to gate and controller.
    pub fn pump(&mut self) -> SessionUpdate {
        let redirects = self.gate.pump();
        let alert = self
            .tasks
            .pump_session_events()
            .err()
            .map(|err| err.alert(TaskOp::Load));
        SessionUpdate { redirects, alert }
    }

    pub fn sign_in(&mut self, form: &mut AuthForm) -> AuthResult<SessionUpdate> {
        let backend = self.backend().clone();
        form.sign_in(backend.as_ref())?;
        Ok(self.pump())
    }

    pub fn sign_up(&mut self, form: &mut AuthForm) -> AuthResult<SessionUpdate> {
        let backend = self.backend().clone();
        form.sign_up(backend.as_ref())?;
        Ok(self.pump())
    }

    /// Signs out; a backend failure becomes an alert and nothing changes.
    pub fn sign_out(&mut self) -> Result<SessionUpdate, Alert> {
        if let Err(err) = self.backend().sign_out() {
            warn!("event=app_sign_out module=app status=error error={err}");
            return Err(Alert::error("Failed to sign out. Please try again."));
        }
        Ok(self.pump())
    }

    /// Releases the session subscription ahead of drop.
    pub fn shutdown(mut self) {
        self.session.teardown();
        info!("event=app_runtime_stop module=app status=ok");
    }
}
