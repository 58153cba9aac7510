//! ScriptFlow task client - submits tasks and polls them to completion.

#![warn(missing_docs)]

pub mod api;
pub mod poller;

pub use api::{ClientError, HttpTaskApi, TaskApi};
pub use poller::{PollConfig, PollError, TaskPoller};
