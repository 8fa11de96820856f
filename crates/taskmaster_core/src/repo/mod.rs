//! Repositories over local persistence.
//!
//! # Responsibility
//! - Map domain collections onto key-value storage.
//! - Keep encoding details out of the controller layer.
//!
//! # Invariants
//! - Write paths validate every record before touching storage.
//! - Read paths reject invalid persisted state instead of masking it.

pub mod task_store;
