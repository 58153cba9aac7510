//! Storage abstraction and implementations for ScriptFlow.
//!
//! Finished scripts are persisted through the [`ScriptStore`] trait, with an
//! in-memory backend for demos and tests and a JSON-file backend for
//! deployments with a data directory.

#![warn(missing_docs)]

pub mod trait_;
pub mod memory;
pub mod json_storage;

pub use trait_::{ScriptStore, StorageError, Result};
pub(crate) use trait_::sort_recent_first;
pub use memory::MemoryStorage;
pub use json_storage::JsonStorage;
