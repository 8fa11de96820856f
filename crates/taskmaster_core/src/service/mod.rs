//! Use-case services consumed by the FFI and CLI layers.
//!
//! # Responsibility
//! - Orchestrate session, storage and model rules into user actions.
//! - Translate failures into user-facing alerts.

pub mod alert;
pub mod task_service;
