use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use cdp_adapter::ChromiumHost;
use chrono::{DateTime, Utc};
use clap::Args;
use dmsweep_event_bus::SurfaceMessage;
use stealth::TokioPacer;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::context::CliContext;
use super::output::{describe_event, describe_state, render, OutputFormat};
use crate::coordinator::{Coordinator, StartOutcome};
use crate::factory::DefaultWorkerFactory;
use crate::worker::status_text;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Start over even if a run is marked active
    #[arg(long, conflicts_with = "resume")]
    pub force: bool,

    /// Continue the persisted run, keeping its deleted count
    #[arg(long)]
    pub resume: bool,

    /// Enable headless mode
    #[arg(long)]
    pub headless: bool,

    /// Estimate the total from the inbox listing instead of visible rows
    #[arg(long)]
    pub hybrid: bool,

    /// Ignore stdin control commands
    #[arg(long)]
    pub no_input: bool,
}

const CONTROL_HELP: &str = "commands: pause | resume | start | close | status";

/// Map a line typed on the control terminal to a control message.
pub fn parse_control(line: &str) -> Option<SurfaceMessage> {
    match line.trim().to_ascii_lowercase().as_str() {
        "pause" | "stop" | "stop_delete" => Some(SurfaceMessage::StopDelete),
        "resume" | "resume_delete" => Some(SurfaceMessage::ResumeDelete),
        "start" | "start_delete" => Some(SurfaceMessage::StartDelete),
        "close" | "quit" | "close_delete" => Some(SurfaceMessage::CloseDelete),
        "status" | "get_status" => Some(SurfaceMessage::GetStatus),
        _ => None,
    }
}

enum Flow {
    Continue,
    Stop,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let mut config = ctx.config().clone();
    if args.headless {
        config.browser.headless = true;
    }
    if args.hybrid {
        config.bridge.hybrid_total = true;
    }

    let state = ctx.open_state()?;
    let labels = Arc::new(ctx.load_labels()?);
    let catalog = ctx.load_catalog()?;
    let grace = Duration::from_millis(config.worker.completion_grace_ms);
    let worker_url = config.worker_url()?;

    let host = Arc::new(ChromiumHost::new(config.browser.clone()));
    let factory = Arc::new(DefaultWorkerFactory::new(
        config,
        labels,
        catalog,
        Arc::new(TokioPacer),
    ));
    let coordinator = Coordinator::new(host, state, factory, worker_url, grace);
    let mut events = coordinator.subscribe();

    let started_at = Utc::now();
    if args.resume {
        let outcome = coordinator.resume().await?;
        info!(?outcome, "Resume requested");
    } else if coordinator.start(args.force).await? == StartOutcome::AlreadyRunning {
        bail!("A run is already marked active; use --resume to continue it or --force to start over");
    }
    if !args.no_input && output == OutputFormat::Human {
        eprintln!("{CONTROL_HELP}");
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = !args.no_input;
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(message) => {
                    println!("{}", render(&message, output, describe_event)?);
                    if let Flow::Stop = on_event(&message, grace).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "control surface lagged"),
                Err(RecvError::Closed) => break,
            },
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    let Some(message) = parse_control(&line) else {
                        if !line.trim().is_empty() {
                            eprintln!("{CONTROL_HELP}");
                        }
                        continue;
                    };
                    let closing = message == SurfaceMessage::CloseDelete;
                    if let Some(status) = coordinator.handle(message).await? {
                        println!("{}", render(&status, output, describe_state)?);
                    }
                    if closing {
                        break;
                    }
                }
                Ok(None) => stdin_open = false,
                Err(err) => {
                    warn!(error = %err, "reading control input failed");
                    stdin_open = false;
                }
            },
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    warn!(error = %err, "listening for Ctrl-C failed");
                }
                if interrupted {
                    break;
                }
                interrupted = true;
                info!("Interrupted; pausing. Press Ctrl-C again to exit");
                coordinator.stop().await?;
            },
        }
    }

    coordinator.shutdown().await;
    let final_state = coordinator.get_status().await?;
    info!(
        status = %final_state.status,
        deleted = final_state.deleted,
        elapsed = %elapsed(started_at, Utc::now()),
        "Session ended"
    );
    Ok(())
}

async fn on_event(message: &SurfaceMessage, grace: Duration) -> Flow {
    match message {
        SurfaceMessage::DeleteComplete(_) => {
            // Let the coordinator finish its teardown first.
            tokio::time::sleep(grace).await;
            Flow::Stop
        }
        SurfaceMessage::DeletePaused(progress)
            if progress.status_text == status_text::WINDOW_CLOSED =>
        {
            info!("Worker window closed; run `dmsweep run --resume` to continue");
            Flow::Stop
        }
        _ => Flow::Continue,
    }
}

fn elapsed(from: DateTime<Utc>, to: DateTime<Utc>) -> String {
    let secs = (to - from).num_seconds().max(0);
    format!("{}m{:02}s", secs / 60, secs % 60)
}
