//! In-process identity backend.
//!
//! Accounts live in an `AccountRegistry`: in memory for tests and probes, or
//! in the app database so they survive restarts. Emails are matched trimmed
//! and lowercased.
//!
//! # Invariants
//! - Listeners observe session changes in the order they were committed.
//! - Listeners must not call back into the backend.

use super::accounts::{
    AccountRecord, AccountRegistry, MemoryAccountRegistry, SqliteAccountRegistry,
};
use super::{AuthError, AuthResult, IdentityBackend, SessionListener, SubscriptionId};
use crate::model::identity::Identity;
use crate::storage::{StorageError, StorageResult};
use log::{info, warn};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const MIN_PASSWORD_CHARS: usize = 6;

struct BackendState {
    accounts: Box<dyn AccountRegistry>,
    current: Option<Identity>,
    listeners: Vec<(SubscriptionId, SessionListener)>,
    next_subscription: u64,
    offline: bool,
}

/// Identity backend holding the signed-in user in memory.
pub struct LocalIdentityBackend {
    state: Mutex<BackendState>,
    /// Taken before `state` is released, held while listeners run.
    delivery: Mutex<()>,
}

impl Default for LocalIdentityBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalIdentityBackend {
    /// Backend whose accounts are forgotten when it is dropped.
    pub fn new() -> Self {
        Self::with_registry(Box::new(MemoryAccountRegistry::default()))
    }

    pub fn with_registry(accounts: Box<dyn AccountRegistry>) -> Self {
        Self {
            state: Mutex::new(BackendState {
                accounts,
                current: None,
                listeners: Vec::new(),
                next_subscription: 0,
                offline: false,
            }),
            delivery: Mutex::new(()),
        }
    }

    /// Backend keeping accounts in the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let accounts = SqliteAccountRegistry::open(path)?;
        Ok(Self::with_registry(Box::new(accounts)))
    }

    /// Simulates a network outage: every auth call fails while set.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn current_user(&self) -> Option<Identity> {
        self.lock().current.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_online(state: &BackendState) -> AuthResult<()> {
        if state.offline {
            return Err(AuthError::Backend(
                "Network request failed. Check your connection and try again.".to_string(),
            ));
        }
        Ok(())
    }

    /// Stores `next` and notifies listeners if it changed.
    ///
    /// The delivery lock is taken while `state` is still held, so a later
    /// transition cannot overtake this one.
    fn transition(&self, mut state: MutexGuard<'_, BackendState>, next: Option<Identity>) {
        if state.current == next {
            return;
        }
        state.current = next.clone();
        let listeners = state
            .listeners
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect::<Vec<_>>();
        let delivery = self.lock_delivery();
        drop(state);

        for listener in listeners {
            listener(next.as_ref());
        }
        drop(delivery);
    }
}

fn registry_failure(stage: &str, err: StorageError) -> AuthError {
    warn!("event=auth_registry module=auth status=error stage={stage} error={err}");
    AuthError::Backend("Account storage is unavailable. Please try again.".to_string())
}

impl IdentityBackend for LocalIdentityBackend {
    fn sign_in(&self, email: &str, password: &str) -> AuthResult<Identity> {
        let key = normalize_email(email);
        let state = self.lock();
        Self::ensure_online(&state)?;

        let account = state
            .accounts
            .find(&key)
            .map_err(|err| registry_failure("find", err))?;
        let identity = match account {
            Some(account) if account.verify(password) => Identity::new(account.uid, key),
            _ => {
                warn!("event=auth_sign_in module=auth status=error error_code=invalid_credentials");
                return Err(AuthError::InvalidCredentials);
            }
        };

        info!("event=auth_sign_in module=auth status=ok");
        self.transition(state, Some(identity.clone()));
        Ok(identity)
    }

    fn sign_up(&self, email: &str, password: &str) -> AuthResult<Identity> {
        let key = normalize_email(email);
        let mut state = self.lock();
        Self::ensure_online(&state)?;

        if !is_plausible_email(&key) {
            return Err(AuthError::InvalidEmail);
        }
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AuthError::WeakPassword);
        }

        let account = AccountRecord::new(key.clone(), password);
        let inserted = state
            .accounts
            .insert(&account)
            .map_err(|err| registry_failure("insert", err))?;
        if !inserted {
            return Err(AuthError::EmailInUse);
        }
        let identity = Identity::new(account.uid, key);

        info!("event=auth_sign_up module=auth status=ok");
        self.transition(state, Some(identity.clone()));
        Ok(identity)
    }

    fn sign_out(&self) -> AuthResult<()> {
        let state = self.lock();
        Self::ensure_online(&state)?;
        info!("event=auth_sign_out module=auth status=ok");
        self.transition(state, None);
        Ok(())
    }

    fn subscribe(&self, listener: SessionListener) -> SubscriptionId {
        let mut state = self.lock();
        state.next_subscription += 1;
        let id = SubscriptionId(state.next_subscription);
        state.listeners.push((id, listener.clone()));
        let current = state.current.clone();
        let delivery = self.lock_delivery();
        drop(state);

        listener(current.as_ref());
        drop(delivery);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().listeners.retain(|(existing, _)| *existing != id);
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        }
        None => false,
    }
}
