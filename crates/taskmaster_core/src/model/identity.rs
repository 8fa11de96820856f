//! Signed-in user handle.

use serde::{Deserialize, Serialize};

/// A user authenticated by the identity backend.
///
/// `email` is the stable owner id for task partitioning; `uid` is whatever
/// opaque id the backend assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub email: String,
}

impl Identity {
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
        }
    }

    /// Owner id used to key this user's task collection.
    pub fn owner_id(&self) -> &str {
        self.email.as_str()
    }
}
