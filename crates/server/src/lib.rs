//! ScriptFlow HTTP server - task submission, status polling, cancellation
//! and saved scripts over JSON.

#![warn(missing_docs)]

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::ServerError;
pub use routes::build;
pub use state::AppState;
