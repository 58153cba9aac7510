//! Execution layer - task registry, work dispatch and bounded-concurrency
//! scheduling.

#![warn(missing_docs)]

pub mod scheduler;
pub mod executor;
pub mod registry;
pub mod queue;

pub use scheduler::{Budget, ResourceScheduler, MAX_CONCURRENT};
pub use executor::{DispatchTable, ExecutionError, UnitOfWork, WorkExecutor};
pub use registry::{CancelOutcome, RegistryError, TaskRegistry};
pub use queue::{QueueConfig, QueueStats, TaskQueue};
