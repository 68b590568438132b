//! CLI entry point for mailslot

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use mailslot_core::config::{Config, ConfigLoader};
use mailslot_core::ingest::{GatewayEvent, IngestOutcome, Ingestor};
use mailslot_core::logging::init_logging;
use mailslot_core::poll::{PollHandler, PollOutcome, PollRequest};
use mailslot_core::resolve::ChannelDirectory;
use mailslot_core::safety::{AuditLogger, ChannelFilter};
use mailslot_core::{Entry, MessageQueue};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "mailslot")]
#[command(about = "Long-poll inbox for chat gateway messages")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Config,
    /// Ingest gateway events from stdin and print polled messages
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Print entries as JSON lines
    #[arg(long)]
    json: bool,
    /// Seconds each poll waits for new messages
    #[arg(short, long)]
    timeout: Option<i64>,
    /// Maximum messages per poll
    #[arg(short, long)]
    limit: Option<i64>,
    /// Only take messages from this channel (name or id)
    #[arg(long)]
    channel: Option<String>,
}

impl RunArgs {
    fn request(&self) -> PollRequest {
        PollRequest {
            timeout_secs: self.timeout,
            limit: self.limit,
            channel: self.channel.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };

    match cli.command {
        Commands::Init { force } => run_init(&config_loader, force)?,
        Commands::Config => run_config(&config_loader)?,
        Commands::Run(args) => run(&config_loader, args).await?,
    }

    Ok(())
}

fn run_init(loader: &ConfigLoader, force: bool) -> Result<()> {
    let path = loader.config_path();
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    loader.save(&Config::default())?;
    println!("{} {}", style("Wrote").green(), path.display());
    Ok(())
}

fn run_config(loader: &ConfigLoader) -> Result<()> {
    let config = loader.load().context("failed to load configuration")?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn open_audit(config: &Config) -> Option<Arc<AuditLogger>> {
    if !config.audit.enabled {
        return None;
    }
    match AuditLogger::open(&config.audit.log_path) {
        Ok(logger) => Some(Arc::new(logger)),
        Err(e) => {
            warn!(
                "Could not open audit log {}, audit logging disabled: {}",
                config.audit.log_path, e
            );
            None
        }
    }
}

async fn run(loader: &ConfigLoader, args: RunArgs) -> Result<()> {
    let config = loader.load().context("failed to load configuration")?;
    let _log_guard = init_logging(&config.logging);

    let queue = Arc::new(MessageQueue::with_capacity(config.queue.max_size));
    let directory = Arc::new(ChannelDirectory::new(config.gateway.guild_id.clone()));
    let filter = Arc::new(ChannelFilter::new(
        &config.safety.channels.allowlist,
        &config.safety.channels.denylist,
    ));
    let ingestor = Ingestor::new(queue.clone(), directory.clone()).with_filter(filter);
    let handler = PollHandler::new(queue.clone(), directory.clone(), config.queue.clone())
        .with_audit(open_audit(&config));

    info!(
        capacity = queue.capacity(),
        guild = %config.gateway.guild_id,
        "mailslot running"
    );
    eprintln!(
        "{}",
        style("Reading gateway events from stdin. Press Ctrl+C to stop.").cyan()
    );

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, shutting down");
                shutdown.cancel();
            }
        }
    });

    // Cancelled on shutdown or when stdin is exhausted.
    let stop = shutdown.child_token();
    let stdin = BufReader::new(tokio::io::stdin());
    let reader = tokio::spawn(read_events(stdin, ingestor, stop.clone()));

    let request = args.request();
    loop {
        match handler.handle(&stop, &request).await {
            Ok(PollOutcome::Messages(entries)) => print_entries(&entries, args.json)?,
            Ok(PollOutcome::NoMessages) => {
                if stop.is_cancelled() {
                    break;
                }
            }
            Err(e) => {
                // The channel may not be known until the guild snapshot arrives.
                warn!("Poll failed: {}", e);
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                }
            }
        }
    }

    if let Err(e) = reader.await {
        warn!("Event reader task failed: {}", e);
    }

    if !shutdown.is_cancelled() {
        print_entries(&drain_remaining(&handler, &request), args.json)?;
    }

    info!(left = queue.len(), "mailslot stopped");
    Ok(())
}

async fn read_events<R>(input: R, ingestor: Ingestor, stop: CancellationToken)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            _ = stop.cancelled() => return,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match GatewayEvent::parse(line) {
                    Ok(event) => match ingestor.handle_event(event) {
                        IngestOutcome::Skipped(reason) => debug!(?reason, "Event skipped"),
                        outcome => debug!(?outcome, "Event handled"),
                    },
                    Err(e) => warn!("Ignoring malformed gateway event: {}", e),
                }
            }
            Ok(None) => {
                info!("Input closed");
                break;
            }
            Err(e) => {
                warn!("Failed to read stdin: {}", e);
                break;
            }
        }
    }
    stop.cancel();
}

/// Take everything still queued for `request` without waiting
///
/// An unresolvable channel leaves the queue untouched.
fn drain_remaining(handler: &PollHandler, request: &PollRequest) -> Vec<Entry> {
    let mut remaining = Vec::new();
    loop {
        match handler.handle_now(request) {
            Ok(PollOutcome::Messages(entries)) => remaining.extend(entries),
            Ok(PollOutcome::NoMessages) => break,
            Err(e) => {
                warn!("Skipping final flush: {}", e);
                break;
            }
        }
    }
    remaining
}

fn print_entries(entries: &[Entry], json: bool) -> Result<()> {
    for entry in entries {
        if json {
            println!("{}", serde_json::to_string(entry)?);
        } else {
            println!("{}", entry.formatted());
        }
    }
    Ok(())
}
