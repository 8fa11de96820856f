//! Domain model for identities and task records.
//!
//! # Responsibility
//! - Define the records shared by session, storage and controller layers.
//! - Keep validation and timestamp normalization next to the data.
//!
//! # Invariants
//! - Task timestamps carry millisecond precision, matching the persisted format.
//! - A task's `owner` is the email of the identity it is stored under.

pub mod draft;
pub mod identity;
pub mod task;
