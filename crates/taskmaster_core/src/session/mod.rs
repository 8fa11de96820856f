//! Session store: who is signed in right now.
//!
//! # Responsibility
//! - Subscribe to the identity backend and mirror its current identity.
//! - Fan session snapshots out to watchers (navigation gate, task controller).
//!
//! # Invariants
//! - `loading` is true until the first backend notification arrives.
//! - Only the backend subscription writes the stored identity.
//! - The subscription is released by `teardown` or on drop, exactly once.

use crate::auth::{IdentityBackend, SessionListener, SubscriptionId};
use crate::model::identity::Identity;
use log::{info, warn};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub loading: bool,
    pub identity: Option<Identity>,
}

impl SessionSnapshot {
    pub fn loading() -> Self {
        Self {
            loading: true,
            identity: None,
        }
    }

    pub fn signed_in(identity: Identity) -> Self {
        Self {
            loading: false,
            identity: Some(identity),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            loading: false,
            identity: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

struct Shared {
    snapshot: SessionSnapshot,
    watchers: Vec<Sender<SessionSnapshot>>,
}

impl Shared {
    fn publish(&mut self, identity: Option<Identity>) {
        self.snapshot = SessionSnapshot {
            loading: false,
            identity,
        };
        let snapshot = self.snapshot.clone();
        self.watchers
            .retain(|watcher| watcher.send(snapshot.clone()).is_ok());
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Read-only, cloneable view of the session store.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Mutex<Shared>>,
}

impl SessionHandle {
    pub fn snapshot(&self) -> SessionSnapshot {
        lock(&self.shared).snapshot.clone()
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.shared).snapshot.loading
    }

    /// Receiver of every snapshot published after this call.
    pub fn watch(&self) -> Receiver<SessionSnapshot> {
        let (sender, receiver) = channel();
        lock(&self.shared).watchers.push(sender);
        receiver
    }
}

/// Owner of the backend subscription.
pub struct SessionStore {
    backend: Arc<dyn IdentityBackend>,
    handle: SessionHandle,
    subscription: Option<SubscriptionId>,
}

impl SessionStore {
    /// Clears any stale session, then subscribes to backend notifications.
    ///
    /// A failing sign-out is logged and ignored; the subscription is made
    /// regardless.
    pub fn init(backend: Arc<dyn IdentityBackend>) -> Self {
        let handle = SessionHandle {
            shared: Arc::new(Mutex::new(Shared {
                snapshot: SessionSnapshot::loading(),
                watchers: Vec::new(),
            })),
        };

        if let Err(err) = backend.sign_out() {
            warn!("event=session_init module=session status=degraded stage=sign_out error={err}");
        }

        let sink = Arc::downgrade(&handle.shared);
        let listener: SessionListener = Arc::new(move |identity: Option<&Identity>| {
            if let Some(shared) = sink.upgrade() {
                lock(&shared).publish(identity.cloned());
            }
        });
        let subscription = backend.subscribe(listener);
        info!("event=session_init module=session status=ok");

        Self {
            backend,
            handle,
            subscription: Some(subscription),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn backend(&self) -> &Arc<dyn IdentityBackend> {
        &self.backend
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.handle.snapshot()
    }

    pub fn watch(&self) -> Receiver<SessionSnapshot> {
        self.handle.watch()
    }

    /// Unsubscribes from the backend. Safe to call more than once.
    pub fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.backend.unsubscribe(subscription);
            info!("event=session_teardown module=session status=ok");
        }
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.teardown();
    }
}
