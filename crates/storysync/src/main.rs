//! storysync - runs the Story App offline engine as a standalone host.
//!
//! Each subcommand delivers one lifecycle signal or message to the engine.
//! `serve` reads commands as JSON lines on stdin and prints engine events as
//! JSON lines on stdout.

mod host;

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storysync_core::models::{Command, EngineEvent, HttpRequest};
use storysync_core::{
    ApiClient, CacheStorage, Config, Engine, OutboxStore, PendingWork, Platform, SYNC_TAG,
};

use host::{ConfiguredPushService, HeadlessClients, LogNotifier, PUSH_STATE_FILE};

#[derive(Parser)]
#[command(name = "storysync", version, about = "Offline sync engine for the Story App")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Pre-cache the application shell
    Install,
    /// Remove stale cache stores and claim clients
    Activate,
    /// Resolve a request through the cache strategies
    Fetch {
        url: String,
        #[arg(long, default_value = "GET")]
        method: String,
        /// Treat the request as a page navigation
        #[arg(long)]
        navigate: bool,
    },
    /// Send one command as JSON, e.g. '{"type":"SYNC_OUTBOX"}'
    Send { json: String },
    /// Read commands as JSON lines from stdin until EOF
    Serve,
    /// Deliver a push message
    Push { payload: Option<String> },
    /// Deliver a background sync signal
    Sync {
        #[arg(long, default_value = SYNC_TAG)]
        tag: String,
    },
    /// List queued stories
    Outbox,
}

/// Initialize the tracing subscriber. Logs go to stderr, and also to a daily
/// rolling file when `log_dir` is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // RUST_LOG controls the level (e.g. RUST_LOG=storysync_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "storysync.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn build_engine(config: &Config) -> Result<Engine> {
    let storage = CacheStorage::new(config.cache_dir()?)?;

    let outbox = OutboxStore::open(&config.outbox_path()?)?;

    let remote = Arc::new(ApiClient::new(config.api_base_url.clone())?);
    let platform = Platform {
        push: Arc::new(ConfiguredPushService::new(
            config.push_subscription.clone(),
            config.data_dir()?.join(PUSH_STATE_FILE),
        )),
        clients: Arc::new(HeadlessClients),
        notifier: Arc::new(LogNotifier),
    };

    Ok(Engine::from_config(config, storage, outbox, remote, platform)?)
}

/// Print every engine event as a JSON line until the engine is dropped.
fn spawn_event_printer(mut events: broadcast::Receiver<EngineEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!(error = %e, "Failed to encode event"),
                },
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Event printer fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn settle_all(pending: Vec<PendingWork>) {
    for (kind, result) in join_all(pending.into_iter().map(|work| {
        let kind = work.kind();
        async move { (kind, work.settle().await) }
    }))
    .await
    {
        if let Err(e) = result {
            warn!(kind, error = %e, "Command failed");
        }
    }
}

/// Dispatch commands, wait for them to settle, then drain the event printer.
async fn run_commands(engine: Engine, commands: Vec<Command>) -> Result<()> {
    let printer = spawn_event_printer(engine.events());
    let pending = commands
        .into_iter()
        .map(|command| engine.on_message(command))
        .collect();
    settle_all(pending).await;
    drop(engine);
    printer.await?;
    Ok(())
}

async fn serve(engine: Engine) -> Result<()> {
    let printer = spawn_event_printer(engine.events());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending = Vec::new();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Command>(line) {
            Ok(command) => pending.push(engine.on_message(command)),
            Err(e) => warn!(error = %e, "Ignoring malformed command"),
        }
    }

    settle_all(pending).await;
    drop(engine);
    printer.await?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::load()?;
    let _guard = init_tracing(config.log_dir.as_deref());
    info!(api = %config.api_base_url, app = %config.app_base_url, "storysync starting");

    let engine = build_engine(&config)?;

    match cli.command {
        Cmd::Install => {
            let report = engine.on_install().await?;
            println!("cached {} assets", report.cached.len());
            for url in &report.failed {
                println!("failed: {}", url);
            }
        }
        Cmd::Activate => {
            for name in engine.on_activate().await? {
                println!("removed cache store: {}", name);
            }
        }
        Cmd::Fetch {
            url,
            method,
            navigate,
        } => {
            let mut request = HttpRequest::new(method.to_uppercase(), url);
            request.navigate = navigate;
            let response = engine.on_fetch(&request).await;
            println!("{}", response.status);
            for (name, value) in &response.headers {
                println!("{}: {}", name, value);
            }
            println!();
            println!("{}", response.text());
        }
        Cmd::Send { json } => {
            let command: Command =
                serde_json::from_str(&json).context("Command is not valid JSON")?;
            run_commands(engine, vec![command]).await?;
        }
        Cmd::Serve => serve(engine).await?,
        Cmd::Push { payload } => {
            let notification = engine.on_push(payload.as_deref().map(str::as_bytes)).await?;
            println!("{}", serde_json::to_string_pretty(&notification)?);
        }
        Cmd::Sync { tag } => match engine.on_sync(&tag).await? {
            Some(report) if report.skipped => println!("drain already in progress"),
            Some(report) => println!(
                "attempted {}, submitted {}, failed {}",
                report.attempted, report.submitted, report.failed
            ),
            None => println!("ignored sync tag: {}", tag),
        },
        Cmd::Outbox => {
            let items = engine.outbox().list_all()?;
            if items.is_empty() {
                println!("outbox is empty");
            }
            for item in items {
                println!(
                    "{}\t{}\t{}",
                    item.id,
                    item.queued_at.to_rfc3339(),
                    item.story.description
                );
            }
        }
    }

    Ok(())
}
