//! ScriptFlow core data models.
//!
//! This crate defines the task records driven by the execution queue, the
//! script artifacts the writing workflow produces, and the wire types of
//! the task API.

#![warn(missing_docs)]

// Core identities
mod id;

// Async tasks
mod task;

// Persisted artifacts
mod script;

pub mod api;

// Re-exports
pub use id::*;

pub use task::{TaskKind, TaskParams, TaskRecord, TaskStatus, TaskStatusView, UnknownTaskType};
pub use script::{Episode, NewScript, Script, ScriptUpdate};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
