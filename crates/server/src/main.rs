//! scriptflow-server - entry point.
//!
//! Startup order:
//! 1. Read configuration from the environment, then command-line overrides.
//! 2. Initialise structured tracing.
//! 3. Open the script store.
//! 4. Build the LLM client, dispatch table and task queue.
//! 5. Start the queue ticker.
//! 6. Serve HTTP until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use scriptflow_ai::{dispatch_table, GeminiClient};
use scriptflow_execution::{TaskQueue, TaskRegistry};
use scriptflow_server::{build, AppState, Config};
use scriptflow_storage::{JsonStorage, MemoryStorage, ScriptStore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "scriptflow-server")]
#[command(about = "ScriptFlow task queue and script API server", long_about = None)]
struct Args {
    /// Address to bind, overrides SCRIPTFLOW_BIND
    #[arg(long)]
    bind: Option<String>,

    /// Directory for saved scripts, overrides SCRIPTFLOW_DATA_DIR
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Units of work in flight at once, overrides SCRIPTFLOW_MAX_CONCURRENT
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Log filter, overrides SCRIPTFLOW_LOG
    #[arg(long)]
    log: Option<String>,

    /// Emit JSON logs
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn apply(self, cfg: &mut Config) {
        if let Some(bind) = self.bind {
            cfg.bind_address = bind;
        }
        if let Some(dir) = self.data_dir {
            cfg.data_dir = Some(dir);
        }
        if let Some(max) = self.max_concurrent {
            cfg.max_concurrent = max;
        }
        if let Some(log) = self.log {
            cfg.log_level = log;
        }
        cfg.log_json |= self.log_json;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let mut cfg = Config::from_env();
    Args::parse().apply(&mut cfg);

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: SCRIPTFLOW_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "scriptflow-server starting");

    // ── 3. Script store ────────────────────────────────────────────────────────
    let scripts: Arc<dyn ScriptStore> = match &cfg.data_dir {
        Some(dir) => {
            let store = JsonStorage::new(dir)
                .await
                .with_context(|| format!("Failed to open data directory {}", dir.display()))?;
            info!(path = %dir.display(), "script store ready");
            Arc::new(store)
        }
        None => {
            warn!("SCRIPTFLOW_DATA_DIR not set; scripts are kept in memory");
            Arc::new(MemoryStorage::new())
        }
    };

    // ── 4. Execution ───────────────────────────────────────────────────────────
    let llm = GeminiClient::new(cfg.ai.clone())?;
    let executor = dispatch_table(Arc::new(llm));
    let queue_config = cfg.queue_config();
    info!(
        max_concurrent = queue_config.budget.max_concurrent.get(),
        timeout = ?queue_config.budget.time_per_task,
        model = %cfg.ai.model,
        "task queue ready"
    );
    let queue = TaskQueue::new(Arc::new(TaskRegistry::new()), Arc::new(executor), queue_config);

    // ── 5. Ticker ──────────────────────────────────────────────────────────────
    let shutdown = CancellationToken::new();
    let ticker = queue.spawn_ticker(shutdown.clone());

    // ── 6. HTTP server with graceful shutdown ──────────────────────────────────
    let addr: SocketAddr = cfg
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address {}", cfg.bind_address))?;
    let state = Arc::new(AppState { queue, scripts });
    let app = build(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    if let Err(e) = ticker.await {
        warn!(error = %e, "queue ticker ended abnormally");
    }

    info!("scriptflow-server stopped");
    Ok(())
}

/// Resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
