//! Server configuration, loaded from environment variables at startup.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use scriptflow_ai::AiConfig;
use scriptflow_execution::{Budget, QueueConfig, MAX_CONCURRENT};

/// Runtime configuration for scriptflow-server.
///
/// Every field has a default so the server starts without any environment
/// variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Directory for saved scripts. `None` keeps them in memory.
    pub data_dir: Option<PathBuf>,

    /// Units of work allowed in flight at once.
    pub max_concurrent: usize,

    /// Fallback scheduling interval in milliseconds.
    pub tick_ms: u64,

    /// Per-task timeout in seconds; `0` disables it.
    pub task_timeout_secs: u64,

    /// How long finished tasks stay queryable, in seconds.
    pub retention_secs: u64,

    /// LLM endpoint settings.
    pub ai: AiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_owned(),
            log_level: "info".to_owned(),
            log_json: false,
            data_dir: None,
            max_concurrent: MAX_CONCURRENT,
            tick_ms: 1_000,
            task_timeout_secs: 600,
            retention_secs: 30 * 60,
            ai: AiConfig::default(),
        }
    }
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: env_or("SCRIPTFLOW_BIND", &defaults.bind_address),
            log_level: env_or("SCRIPTFLOW_LOG", &defaults.log_level),
            log_json: std::env::var("SCRIPTFLOW_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            data_dir: std::env::var_os("SCRIPTFLOW_DATA_DIR").map(PathBuf::from),
            max_concurrent: parse_env("SCRIPTFLOW_MAX_CONCURRENT", defaults.max_concurrent),
            tick_ms: parse_env("SCRIPTFLOW_TICK_MS", defaults.tick_ms),
            task_timeout_secs: parse_env("SCRIPTFLOW_TASK_TIMEOUT_SECS", defaults.task_timeout_secs),
            retention_secs: parse_env("SCRIPTFLOW_RETENTION_SECS", defaults.retention_secs),
            ai: AiConfig::from_env(),
        }
    }

    /// Queue settings derived from this configuration.
    pub fn queue_config(&self) -> QueueConfig {
        let time_per_task = (self.task_timeout_secs > 0)
            .then(|| Duration::from_secs(self.task_timeout_secs));
        let max_concurrent = NonZeroUsize::new(self.max_concurrent).unwrap_or(NonZeroUsize::MIN);

        QueueConfig {
            budget: Budget::new()
                .with_time_per_task(time_per_task)
                .with_max_concurrent(max_concurrent),
            tick_interval: Duration::from_millis(self.tick_ms.max(1)),
            retention: Duration::from_secs(self.retention_secs),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
