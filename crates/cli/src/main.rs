//! ScriptFlow CLI - submit, watch and cancel AI writing tasks.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scriptflow_client::{HttpTaskApi, PollError, TaskApi, TaskPoller};
use scriptflow_core::{OwnerId, TaskId, TaskParams, TaskStatusView};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Level};

#[derive(Parser)]
#[command(name = "scriptflow")]
#[command(about = "AI scriptwriting task client", long_about = None)]
struct Cli {
    /// Server base URL
    #[arg(long, env = "SCRIPTFLOW_SERVER", default_value = "http://localhost:3000")]
    server: String,

    /// User ID sent as X-User-Id
    #[arg(long, env = "SCRIPTFLOW_USER", default_value = "local")]
    user: String,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a task and print its ID
    Submit {
        /// Task type, e.g. generate-outline
        task_type: String,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Show a task's status
    Status {
        /// Task ID
        id: String,
    },
    /// Cancel a task
    Cancel {
        /// Task ID
        id: String,
    },
    /// Submit a task and wait for its result (Ctrl-C cancels it)
    Run {
        /// Task type, e.g. generate-outline
        task_type: String,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Wait for an already submitted task
    Watch {
        /// Task ID
        id: String,
    },
}

#[derive(clap::Args)]
struct ParamArgs {
    /// Parameters as a JSON object
    #[arg(long)]
    params: Option<String>,

    /// Single parameter as key=value; values that parse as JSON are kept typed
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    param: Vec<String>,
}

impl ParamArgs {
    fn build(self) -> Result<TaskParams> {
        let mut params = match self.params {
            Some(json) => match serde_json::from_str(&json).context("Invalid --params JSON")? {
                Value::Object(map) => map,
                _ => anyhow::bail!("--params must be a JSON object"),
            },
            None => TaskParams::new(),
        };
        for pair in self.param {
            let (key, raw) = pair
                .split_once('=')
                .with_context(|| format!("Expected KEY=VALUE, got '{pair}'"))?;
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            params.insert(key.to_string(), value);
        }
        Ok(params)
    }
}

fn parse_id(id: &str) -> Result<TaskId> {
    id.parse().map_err(|_| anyhow::anyhow!("Invalid task ID: {id}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    let api: Arc<dyn TaskApi> = Arc::new(HttpTaskApi::new(&cli.server, OwnerId::new(cli.user))?);

    match cli.command {
        Commands::Submit { task_type, params } => {
            let id = api.submit(&task_type, params.build()?).await?;
            println!("{id}");
        }
        Commands::Status { id } => {
            let view = api.status(parse_id(&id)?).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Commands::Cancel { id } => {
            let response = api.cancel(parse_id(&id)?).await?;
            match response.status {
                None => println!("Cancelled"),
                Some(status) => println!("Not cancelled: task already {status}"),
            }
        }
        Commands::Run { task_type, params } => {
            let params = params.build()?;
            let id = api.submit(&task_type, params).await?;
            eprintln!("Submitted {id}");
            wait(TaskPoller::new(api), id).await?;
        }
        Commands::Watch { id } => {
            wait(TaskPoller::new(api), parse_id(&id)?).await?;
        }
    }

    Ok(())
}

/// Poll until the task finishes, printing its result. Ctrl-C cancels it.
async fn wait(poller: TaskPoller, id: TaskId) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut last = None;
    let outcome = poller
        .poll_with(id, cancel, |view: &TaskStatusView| {
            if last != Some(view.status) {
                eprintln!("{}: {}", view.id, view.status);
                last = Some(view.status);
            }
        })
        .await;
    on_ctrl_c.abort();

    match outcome {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(PollError::CancelledByCaller) => {
            eprintln!("Cancelled {id}");
            Ok(())
        }
        Err(e) => {
            debug!(task_id = %id, error = ?e, "task did not complete");
            Err(e.into())
        }
    }
}
