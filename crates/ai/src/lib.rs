//! AI-backed units of work for the scriptwriting workflow.
//!
//! Each task kind becomes one prompt to a language model; the reply is
//! shaped into the task's result payload.

#![warn(missing_docs)]

pub mod client;
pub mod prompts;
pub mod units;

pub use client::{AiConfig, GeminiClient, LlmClient};
pub use units::{dispatch_table, ScriptWriter};
