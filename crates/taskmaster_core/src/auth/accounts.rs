//! Account registries behind `LocalIdentityBackend`.
//!
//! # Invariants
//! - Keys are normalized emails; one account per email.
//! - Passwords are stored only as salted SHA-256 digests.

use crate::db::{open_db, open_db_in_memory};
use crate::storage::StorageResult;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

/// Registered account with its password digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub uid: String,
    pub email: String,
    password_salt: String,
    password_hash: String,
}

impl AccountRecord {
    /// New account with a fresh uid and salt.
    pub fn new(email: impl Into<String>, password: &str) -> Self {
        let password_salt = Uuid::new_v4().simple().to_string();
        let password_hash = digest(&password_salt, password);
        Self {
            uid: Uuid::new_v4().to_string(),
            email: email.into(),
            password_salt,
            password_hash,
        }
    }

    pub fn verify(&self, password: &str) -> bool {
        digest(&self.password_salt, password) == self.password_hash
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update([0u8]);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Where accounts are kept.
pub trait AccountRegistry: Send {
    fn find(&self, email: &str) -> StorageResult<Option<AccountRecord>>;

    /// Stores `record`; returns `false` when its email is already taken.
    fn insert(&mut self, record: &AccountRecord) -> StorageResult<bool>;
}

/// Registry that forgets every account when dropped.
#[derive(Debug, Default)]
pub struct MemoryAccountRegistry {
    accounts: HashMap<String, AccountRecord>,
}

impl AccountRegistry for MemoryAccountRegistry {
    fn find(&self, email: &str) -> StorageResult<Option<AccountRecord>> {
        Ok(self.accounts.get(email).cloned())
    }

    fn insert(&mut self, record: &AccountRecord) -> StorageResult<bool> {
        if self.accounts.contains_key(&record.email) {
            return Ok(false);
        }
        self.accounts.insert(record.email.clone(), record.clone());
        Ok(true)
    }
}

/// Registry over the `accounts` table.
pub struct SqliteAccountRegistry {
    conn: Connection,
}

impl SqliteAccountRegistry {
    /// Wraps a connection that already went through `open_db`.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }
}

impl AccountRegistry for SqliteAccountRegistry {
    fn find(&self, email: &str) -> StorageResult<Option<AccountRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT uid, email, password_salt, password_hash FROM accounts WHERE email = ?1;",
                [email],
                |row| {
                    Ok(AccountRecord {
                        uid: row.get(0)?,
                        email: row.get(1)?,
                        password_salt: row.get(2)?,
                        password_hash: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn insert(&mut self, record: &AccountRecord) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT INTO accounts (email, uid, password_salt, password_hash)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(email) DO NOTHING;",
            params![
                record.email,
                record.uid,
                record.password_salt,
                record.password_hash
            ],
        )?;
        Ok(inserted == 1)
    }
}
