//! Client-side poller - waits for a submitted task with linear backoff.
//!
//! The delay before poll `n` (0-indexed) is `initial + step × n`, clamped to
//! `max_interval`. Polling gives up after `max_duration` with
//! [`PollError::Timeout`], which is distinct from the task itself failing.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use scriptflow_core::{TaskId, TaskParams, TaskStatus, TaskStatusView};
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{ClientError, TaskApi};

/// Backoff schedule for polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay after the first poll
    pub initial_interval: Duration,
    /// Added to the delay after every poll
    pub step: Duration,
    /// Delay cap
    pub max_interval: Duration,
    /// Total time before giving up
    pub max_duration: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(2),
            step: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            max_duration: Duration::from_secs(5 * 60),
        }
    }
}

impl PollConfig {
    /// Delay after poll number `round` (0-indexed).
    pub fn interval(&self, round: u32) -> Duration {
        self.step
            .checked_mul(round)
            .and_then(|grown| self.initial_interval.checked_add(grown))
            .map_or(self.max_interval, |delay| delay.min(self.max_interval))
    }
}

/// Why polling ended without a result.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The task finished as failed
    #[error("task failed: {0}")]
    TaskFailed(String),

    /// The task was cancelled, by this or another client
    #[error("task was cancelled")]
    TaskCancelled,

    /// The task did not finish in time; it may still be running
    #[error("task did not finish within {}s", .0.as_secs())]
    Timeout(Duration),

    /// The caller stopped waiting and a cancel was sent
    #[error("polling cancelled by caller")]
    CancelledByCaller,

    /// Another loop is already polling this task
    #[error("task {0} is already being polled")]
    AlreadyPolling(TaskId),

    /// The task API could not be reached or rejected the request
    #[error(transparent)]
    Api(#[from] ClientError),
}

/// Releases a task ID from the active set when polling ends.
struct ActiveGuard {
    active: Arc<Mutex<HashSet<TaskId>>>,
    id: TaskId,
}

impl ActiveGuard {
    fn acquire(active: &Arc<Mutex<HashSet<TaskId>>>, id: TaskId) -> Option<Self> {
        let inserted = active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        inserted.then(|| Self {
            active: Arc::clone(active),
            id,
        })
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// Polls task status until a terminal state, a timeout or a caller cancel.
///
/// Cheap to clone; clones share the set of tasks being polled, so at most
/// one loop runs per task ID across all of them.
#[derive(Clone)]
pub struct TaskPoller {
    api: Arc<dyn TaskApi>,
    config: PollConfig,
    active: Arc<Mutex<HashSet<TaskId>>>,
}

impl TaskPoller {
    /// Create a poller with the default schedule.
    pub fn new(api: Arc<dyn TaskApi>) -> Self {
        Self {
            api,
            config: PollConfig::default(),
            active: Arc::default(),
        }
    }

    /// Use a custom schedule.
    pub fn with_config(mut self, config: PollConfig) -> Self {
        self.config = config;
        self
    }

    /// Whether a loop is currently polling `id`.
    pub fn is_polling(&self, id: TaskId) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    /// Wait for `id` to finish and return its result.
    pub async fn poll(&self, id: TaskId) -> Result<Value, PollError> {
        self.poll_with(id, CancellationToken::new(), |_| {}).await
    }

    /// Submit a task and wait for its result. Cancelling `cancel` before
    /// the submit answers stops waiting without a task ID to cancel.
    pub async fn submit_and_poll(
        &self,
        task_type: &str,
        params: TaskParams,
        cancel: CancellationToken,
        on_update: impl FnMut(&TaskStatusView) + Send,
    ) -> Result<Value, PollError> {
        let id = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::CancelledByCaller),
            id = self.api.submit(task_type, params) => id?,
        };
        self.poll_with(id, cancel, on_update).await
    }

    /// Wait for `id` to finish, reporting every status snapshot to
    /// `on_update`. Cancelling `cancel` sends a cancel request to the server
    /// and stops polling at once.
    pub async fn poll_with(
        &self,
        id: TaskId,
        cancel: CancellationToken,
        mut on_update: impl FnMut(&TaskStatusView) + Send,
    ) -> Result<Value, PollError> {
        let _guard = ActiveGuard::acquire(&self.active, id).ok_or(PollError::AlreadyPolling(id))?;
        let deadline = Instant::now() + self.config.max_duration;
        let mut round = 0u32;

        loop {
            let view = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancel_remote(id).await),
                view = self.api.status(id) => view?,
                _ = tokio::time::sleep_until(deadline) => return Err(self.timed_out(id)),
            };
            on_update(&view);

            match view.status {
                TaskStatus::Completed => return Ok(view.result.unwrap_or(Value::Null)),
                TaskStatus::Failed => {
                    let error = view.error.unwrap_or_else(|| "task failed".to_string());
                    return Err(PollError::TaskFailed(error));
                }
                TaskStatus::Cancelled => return Err(PollError::TaskCancelled),
                TaskStatus::Pending | TaskStatus::Processing => {}
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(self.timed_out(id));
            }

            let delay = self.config.interval(round).min(deadline - now);
            debug!(task_id = %id, status = %view.status, ?delay, "task still running");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancel_remote(id).await),
                _ = tokio::time::sleep(delay) => {}
            }
            round = round.saturating_add(1);
        }
    }

    fn timed_out(&self, id: TaskId) -> PollError {
        warn!(task_id = %id, "gave up polling");
        PollError::Timeout(self.config.max_duration)
    }

    async fn cancel_remote(&self, id: TaskId) -> PollError {
        match self.api.cancel(id).await {
            Ok(response) => {
                debug!(task_id = %id, cancelled = response.cancelled, "cancel sent");
            }
            Err(e) => warn!(task_id = %id, error = %e, "cancel request failed"),
        }
        PollError::CancelledByCaller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scriptflow_core::api::CancelTaskResponse;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Serves a scripted sequence of statuses and records when each poll
    /// happened.
    struct ScriptedApi {
        statuses: Mutex<VecDeque<TaskStatus>>,
        polls: Mutex<Vec<Instant>>,
        cancels: Mutex<Vec<TaskId>>,
    }

    impl ScriptedApi {
        fn new(statuses: impl IntoIterator<Item = TaskStatus>) -> Arc<Self> {
            Arc::new(Self {
                statuses: Mutex::new(statuses.into_iter().collect()),
                polls: Mutex::new(Vec::new()),
                cancels: Mutex::new(Vec::new()),
            })
        }

        /// Gaps between consecutive polls.
        fn gaps(&self) -> Vec<Duration> {
            let polls = self.polls.lock().unwrap();
            polls.windows(2).map(|w| w[1] - w[0]).collect()
        }
    }

    fn view(id: TaskId, status: TaskStatus) -> TaskStatusView {
        TaskStatusView {
            id,
            task_type: "generate-outline".to_string(),
            status,
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            error: (status == TaskStatus::Failed).then(|| "AI service unavailable".to_string()),
            result: (status == TaskStatus::Completed).then(|| json!({"outline": "Act I"})),
        }
    }

    #[async_trait]
    impl TaskApi for ScriptedApi {
        async fn submit(&self, _task_type: &str, _params: TaskParams) -> Result<TaskId, ClientError> {
            Ok(TaskId::new())
        }

        async fn status(&self, id: TaskId) -> Result<TaskStatusView, ClientError> {
            self.polls.lock().unwrap().push(Instant::now());
            let mut statuses = self.statuses.lock().unwrap();
            // The last scripted status repeats forever.
            let status = if statuses.len() > 1 {
                statuses.pop_front().unwrap()
            } else {
                *statuses.front().unwrap()
            };
            Ok(view(id, status))
        }

        async fn cancel(&self, id: TaskId) -> Result<CancelTaskResponse, ClientError> {
            self.cancels.lock().unwrap().push(id);
            Ok(CancelTaskResponse {
                cancelled: true,
                status: None,
            })
        }
    }

    /// Accepts requests and never answers them.
    #[derive(Default)]
    struct StalledApi {
        cancels: Mutex<Vec<TaskId>>,
    }

    #[async_trait]
    impl TaskApi for StalledApi {
        async fn submit(&self, _task_type: &str, _params: TaskParams) -> Result<TaskId, ClientError> {
            std::future::pending().await
        }

        async fn status(&self, _id: TaskId) -> Result<TaskStatusView, ClientError> {
            std::future::pending().await
        }

        async fn cancel(&self, id: TaskId) -> Result<CancelTaskResponse, ClientError> {
            self.cancels.lock().unwrap().push(id);
            Ok(CancelTaskResponse {
                cancelled: true,
                status: None,
            })
        }
    }

    #[test]
    fn test_interval_grows_linearly_to_cap() {
        let config = PollConfig::default();
        assert_eq!(config.interval(0), Duration::from_secs(2));
        assert_eq!(config.interval(1), Duration::from_millis(2500));
        assert_eq!(config.interval(4), Duration::from_secs(4));
        assert_eq!(config.interval(16), Duration::from_secs(10));
        assert_eq!(config.interval(17), Duration::from_secs(10));
        assert_eq!(config.interval(u32::MAX), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_returns_result() {
        use TaskStatus::*;
        let api = ScriptedApi::new([Pending, Processing, Processing, Completed]);
        let poller = TaskPoller::new(api.clone());

        let mut seen = Vec::new();
        let result = poller
            .poll_with(TaskId::new(), CancellationToken::new(), |v| seen.push(v.status))
            .await
            .unwrap();

        assert_eq!(result, json!({"outline": "Act I"}));
        assert_eq!(seen, vec![Pending, Processing, Processing, Completed]);
        assert_eq!(
            api.gaps(),
            vec![
                Duration::from_secs(2),
                Duration::from_millis(2500),
                Duration::from_secs(3),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_is_not_a_timeout() {
        let api = ScriptedApi::new([TaskStatus::Processing, TaskStatus::Failed]);
        let poller = TaskPoller::new(api);

        let err = poller.poll(TaskId::new()).await.unwrap_err();
        assert!(matches!(err, PollError::TaskFailed(ref m) if m == "AI service unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_elsewhere() {
        let api = ScriptedApi::new([TaskStatus::Cancelled]);
        let poller = TaskPoller::new(api);
        let err = poller.poll(TaskId::new()).await.unwrap_err();
        assert!(matches!(err, PollError::TaskCancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_max_duration() {
        let api = ScriptedApi::new([TaskStatus::Processing]);
        let poller = TaskPoller::new(api.clone());
        let started = Instant::now();

        let err = poller.poll(TaskId::new()).await.unwrap_err();

        assert!(matches!(err, PollError::Timeout(d) if d == Duration::from_secs(300)));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(300) && elapsed < Duration::from_secs(301));
        assert!(api.gaps().iter().all(|gap| *gap <= Duration::from_secs(10)));
        assert!(api.cancels.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_cancel_stops_polling_and_cancels_task() {
        let api = ScriptedApi::new([TaskStatus::Processing]);
        let poller = TaskPoller::new(api.clone());
        let id = TaskId::new();
        let cancel = CancellationToken::new();

        let handle = {
            let poller = poller.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { poller.poll_with(id, cancel, |_| {}).await })
        };

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(poller.is_polling(id));
        cancel.cancel();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, PollError::CancelledByCaller));
        assert_eq!(*api.cancels.lock().unwrap(), vec![id]);
        assert!(!poller.is_polling(id));

        let polls = api.polls.lock().unwrap().len();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(api.polls.lock().unwrap().len(), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_loop_per_task() {
        use TaskStatus::*;
        let api = ScriptedApi::new([Processing, Processing, Completed]);
        let poller = TaskPoller::new(api);
        let id = TaskId::new();

        let first = {
            let poller = poller.clone();
            tokio::spawn(async move { poller.poll(id).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        let err = poller.poll(id).await.unwrap_err();
        assert!(matches!(err, PollError::AlreadyPolling(dup) if dup == id));

        assert!(first.await.unwrap().is_ok());
        assert!(!poller.is_polling(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_and_poll() {
        let api = ScriptedApi::new([TaskStatus::Completed]);
        let poller = TaskPoller::new(api);
        let result = poller
            .submit_and_poll("generate-outline", TaskParams::new(), CancellationToken::new(), |_| {})
            .await
            .unwrap();
        assert_eq!(result["outline"], "Act I");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_status_request_still_times_out() {
        let api = Arc::new(StalledApi::default());
        let poller = TaskPoller::new(api.clone());
        let id = TaskId::new();
        let started = Instant::now();

        let outcome = tokio::time::timeout(Duration::from_secs(3600), poller.poll(id))
            .await
            .expect("poller must stop at its own deadline");

        assert!(matches!(outcome, Err(PollError::Timeout(d)) if d == Duration::from_secs(300)));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(300) && elapsed < Duration::from_secs(301));
        assert!(!poller.is_polling(id));
        assert!(api.cancels.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_submit() {
        let poller = TaskPoller::new(Arc::new(StalledApi::default()));
        let cancel = CancellationToken::new();

        let handle = {
            let poller = poller.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                poller
                    .submit_and_poll("generate-outline", TaskParams::new(), cancel, |_| {})
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, PollError::CancelledByCaller));
    }
}
