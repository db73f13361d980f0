//! Command-line control surface.
//!
//! Drives the same paths the browser popup does: fetch a page, run the
//! configured collector rows against it, append the result to the session
//! log, optionally forward it to the native host, and maintain the visited
//! set. State persists in a JSON file between invocations.

mod store;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};

use selector_logger::{
    normalize_url, Badge, CollectorRow, ConfigState, Controller, HtmlExecutor, ProcessLauncher,
    Request, Response, HOST_NAME,
};
use store::JsonFileKv;

#[derive(Parser)]
#[command(name = "selector-logger", about = "Scan pages with selector rows and log the results")]
struct Cli {
    /// JSON file holding config state, visited set, and log
    #[arg(long, default_value = "selector-logger-state.json")]
    state_file: PathBuf,

    /// Native host executable, for forwarding
    #[arg(long, default_value = "selector-logger-host")]
    host_cmd: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch a page and run the enabled collector rows against it
    Run {
        url: String,

        /// Extra rows for this run only, e.g. ".headline|inner:strip"
        #[arg(long = "row")]
        rows: Vec<String>,
    },

    /// Check that the native host can be reached
    Ping,

    /// Show or clear the session log
    Log {
        #[command(subcommand)]
        action: LogAction,
    },

    /// Show or edit the persisted config state
    State {
        #[command(subcommand)]
        action: StateAction,
    },
}

#[derive(Subcommand)]
enum LogAction {
    Show,
    Clear,
}

#[derive(Subcommand)]
enum StateAction {
    Show,

    /// Replace the collector rows
    SetRows { rows: Vec<String> },

    /// Merge individual fields into the state record
    Set {
        #[arg(long)]
        auto_run: Option<bool>,

        #[arg(long)]
        enable_native: Option<bool>,

        #[arg(long)]
        file_path: Option<String>,

        #[arg(long)]
        skip_visited: Option<bool>,
    },
}

/// Shows the visited count as a log line; the CLI has no toolbar.
struct TracingBadge;

#[async_trait]
impl Badge for TracingBadge {
    async fn show_count(&self, count: usize) {
        tracing::info!(visited = count, "badge updated");
    }
}

type CliController = Controller<JsonFileKv, ProcessLauncher, TracingBadge>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let controller = Controller::new(
        JsonFileKv::new(&cli.state_file),
        ProcessLauncher::new(HOST_NAME, &cli.host_cmd),
        TracingBadge,
    );

    match cli.command {
        Command::Run { url, rows } => run(&controller, &url, rows).await,
        Command::Ping => ping(&controller).await,
        Command::Log { action } => log(&controller, action).await,
        Command::State { action } => state(&controller, action).await,
    }
}

async fn run(controller: &CliController, url: &str, extra_rows: Vec<String>) -> Result<()> {
    let state = controller.session().state().await?;
    let mut rows: Vec<CollectorRow> = state
        .rows
        .iter()
        .filter(|row| row.enabled && !row.value.is_empty())
        .cloned()
        .collect();
    rows.extend(extra_rows.into_iter().map(CollectorRow::new));
    if rows.is_empty() {
        bail!("no enabled collector rows; add some with `state set-rows` or --row");
    }

    let source = fetch(url).await?;
    let executor = HtmlExecutor::new(url, source);

    let lines = match controller
        .handle(Request::RunCollectors { rows }, &executor)
        .await
    {
        Response::Collected { result } => result,
        Response::CollectFailed { error } => bail!("collection failed: {error}"),
        other => bail!("unexpected response: {other:?}"),
    };

    for line in &lines {
        println!("{line}");
    }
    controller.session().append_log(&lines).await?;

    if state.enable_native && !state.file_path.is_empty() {
        let response = controller
            .handle(
                Request::NativeAppend {
                    path: state.file_path.clone(),
                    lines: lines.clone(),
                },
                &executor,
            )
            .await;
        ensure_ok(response, "native forward")?;
    }

    let mut visited = controller.session().visited().await?;
    visited.insert(normalize_url(url));
    controller.session().set_visited(&visited).await?;
    let response = controller.handle(Request::UpdateBadge, &executor).await;
    ensure_ok(response, "badge update")?;

    Ok(())
}

/// Fail on an `ok:false` acknowledgement; failures on user-triggered
/// commands are reported, not swallowed.
fn ensure_ok(response: Response, what: &str) -> Result<()> {
    if let Response::Ack { ok: false, error } = response {
        bail!(
            "{what} failed: {}",
            error.unwrap_or_else(|| "unknown error".to_string())
        );
    }
    Ok(())
}

async fn fetch(url: &str) -> Result<String> {
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("failed to fetch {url}"))?
        .error_for_status()
        .with_context(|| format!("{url} answered with an error status"))?;
    response.text().await.context("failed to read page body")
}

async fn ping(controller: &CliController) -> Result<()> {
    // No page involved; the executor is never consulted
    let executor = HtmlExecutor::new("http://localhost/", "");
    match controller.handle(Request::NativePing, &executor).await {
        Response::Ack { ok: true, .. } => {
            println!("native host reachable");
            Ok(())
        }
        Response::Ack { ok: false, error } => {
            bail!(error.unwrap_or_else(|| "native host unreachable".to_string()))
        }
        other => bail!("unexpected response: {other:?}"),
    }
}

async fn log(controller: &CliController, action: LogAction) -> Result<()> {
    match action {
        LogAction::Show => {
            for line in controller.session().log().await? {
                println!("{line}");
            }
        }
        LogAction::Clear => {
            controller.session().clear_log().await?;
        }
    }
    Ok(())
}

async fn state(controller: &CliController, action: StateAction) -> Result<()> {
    match action {
        StateAction::Show => {
            let state = controller.session().state().await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        StateAction::SetRows { rows } => {
            // Whole-record write: merge into a fresh read first
            let mut state = controller.session().state().await?;
            state.rows = rows.into_iter().map(CollectorRow::new).collect();
            controller.session().set_state(&state).await?;
        }
        StateAction::Set {
            auto_run,
            enable_native,
            file_path,
            skip_visited,
        } => {
            let mut state: ConfigState = controller.session().state().await?;
            if let Some(auto_run) = auto_run {
                state.auto_run = auto_run;
            }
            if let Some(enable_native) = enable_native {
                state.enable_native = enable_native;
            }
            if let Some(file_path) = file_path {
                state.file_path = file_path;
            }
            if let Some(skip_visited) = skip_visited {
                state.skip_visited = skip_visited;
            }
            controller.session().set_state(&state).await?;
        }
    }
    Ok(())
}
