//! Identity backend contract and authentication forms.
//!
//! # Responsibility
//! - Define what the core consumes from an identity service.
//! - Provide an in-process backend for tests, probes and offline builds.
//! - Hold sign-in/sign-up form state with inline error reporting.
//!
//! # Invariants
//! - `AuthError` display text is safe to show to the user verbatim.
//! - Listeners receive the current state once on subscribe, then every change.

use crate::model::identity::Identity;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub mod accounts;
pub mod form;
pub mod local;

pub use accounts::{
    AccountRecord, AccountRegistry, MemoryAccountRegistry, SqliteAccountRegistry,
};
pub use form::AuthForm;
pub use local::LocalIdentityBackend;

pub type AuthResult<T> = Result<T, AuthError>;

/// Callback invoked with the new identity (or `None`) on session change.
pub type SessionListener = Arc<dyn Fn(Option<&Identity>) + Send + Sync>;

/// Handle returned by `IdentityBackend::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Authentication failure with a user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    MissingFields,
    InvalidEmail,
    WeakPassword,
    EmailInUse,
    InvalidCredentials,
    /// Transport or service failure reported by the backend.
    Backend(String),
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingFields => write!(f, "Please fill in all fields"),
            Self::InvalidEmail => write!(f, "The email address is badly formatted."),
            Self::WeakPassword => write!(f, "Password should be at least 6 characters."),
            Self::EmailInUse => {
                write!(f, "The email address is already in use by another account.")
            }
            Self::InvalidCredentials => write!(f, "Invalid email or password."),
            Self::Backend(message) => write!(f, "{message}"),
        }
    }
}

impl Error for AuthError {}

/// Identity service consumed by the session store and auth forms.
pub trait IdentityBackend: Send + Sync {
    fn sign_in(&self, email: &str, password: &str) -> AuthResult<Identity>;
    fn sign_up(&self, email: &str, password: &str) -> AuthResult<Identity>;
    fn sign_out(&self) -> AuthResult<()>;
    /// Registers `listener`; it is called immediately with the current state.
    fn subscribe(&self, listener: SessionListener) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);
}
