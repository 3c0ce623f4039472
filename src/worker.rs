//! Worker loop: the resumable deletion state machine that runs against one
//! worker surface.
//!
//! `starting -> running <-> paused -> done`. The loop only emits events; the
//! coordinator turns them into persisted state.

use std::sync::Arc;

use action_flow::DeletionCycle;
use action_locator::ElementLocator;
use action_primitives::{ActionPrimitives, ExecCtx, Settle};
use async_trait::async_trait;
use dmsweep_core_types::{Command, DeletionStatus, Progress};
use dmsweep_event_bus::{EventBus, SurfaceMessage};
use dmsweep_state_center::PersistedState;
use std::time::Duration;
use stealth::{DelayKey, DelayRange, Pacer, PacingPolicy};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{is_under_path, url_path, WorkerTimings};

pub mod status_text {
    pub fn found(total: u32) -> String {
        format!("{total} conversations found. Deleting...")
    }

    pub fn deleting(next: u32, total: u32) -> String {
        format!("Deleting... ({next}/{total})")
    }

    pub fn natural_pause(deleted: u32, total: u32) -> String {
        format!("Natural pause... ({deleted}/{total})")
    }

    pub fn paused(deleted: u32, total: u32) -> String {
        format!("Paused ({deleted}/{total})")
    }

    pub fn failures(deleted: u32, streak: u32) -> String {
        format!("{deleted} deleted, {streak} consecutive failures.")
    }

    pub fn completed(deleted: u32) -> String {
        format!("{deleted} conversations deleted successfully!")
    }

    pub const NOTHING_TO_DELETE: &str = "No conversations to delete!";
    pub const WINDOW_CLOSED: &str = "Window closed. Resume to continue.";
    pub const STARTING: &str = "Starting...";
}

/// Alternative source for the initial total, such as the inbox listing.
#[async_trait]
pub trait TotalEstimator: Send + Sync {
    /// `None` means "unknown"; the worker then counts visible rows.
    async fn estimate_total(&self) -> Option<u32>;
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// `done` was emitted with these counters
    Completed(Progress),
    /// The surface went away; nothing was emitted for it
    SurfaceLost(Progress),
}

impl WorkerExit {
    pub fn progress(&self) -> &Progress {
        match self {
            WorkerExit::Completed(progress) | WorkerExit::SurfaceLost(progress) => progress,
        }
    }
}

/// Components one run drives.
#[derive(Clone)]
pub struct WorkerParts {
    pub locator: Arc<dyn ElementLocator>,
    pub cycle: Arc<dyn DeletionCycle>,
    pub primitives: Arc<dyn ActionPrimitives>,
    pub policy: Arc<PacingPolicy>,
    pub pacer: Arc<dyn Pacer>,
}

/// Wiring supplied by the coordinator.
pub struct WorkerContext {
    pub state: PersistedState,
    pub events: Arc<dyn EventBus<SurfaceMessage>>,
    pub control: mpsc::Receiver<SurfaceMessage>,
    /// Counters carried over from an earlier run
    pub baseline_deleted: u32,
    pub worker_url: String,
    pub closed: CancellationToken,
}

enum Pass {
    Continue,
    Finished,
    Exit(WorkerExit),
}

pub struct WorkerLoop {
    parts: WorkerParts,
    ctx: WorkerContext,
    timings: WorkerTimings,
    estimator: Option<Arc<dyn TotalEstimator>>,
    inbox_path: String,
    paused: bool,
    deleted: u32,
    total: u32,
    fail_streak: u32,
}

impl WorkerLoop {
    pub fn new(parts: WorkerParts, ctx: WorkerContext, timings: WorkerTimings) -> Self {
        let inbox_path = url_path(&ctx.worker_url).unwrap_or_default();
        let deleted = ctx.baseline_deleted;
        Self {
            parts,
            ctx,
            timings,
            estimator: None,
            inbox_path,
            paused: false,
            deleted,
            total: deleted,
            fail_streak: 0,
        }
    }

    pub fn with_total_estimator(mut self, estimator: Arc<dyn TotalEstimator>) -> Self {
        self.estimator = Some(estimator);
        self
    }

    fn progress(&self, text: impl Into<String>) -> Progress {
        Progress::new(self.deleted, self.total, text)
    }

    fn lost(&self) -> Option<WorkerExit> {
        self.ctx
            .closed
            .is_cancelled()
            .then(|| WorkerExit::SurfaceLost(self.progress("")))
    }

    async fn emit(&self, status: DeletionStatus, text: String) {
        let message = SurfaceMessage::from_worker(status, self.progress(text));
        debug!(event = message.name(), deleted = self.deleted, total = self.total, "worker event");
        if let Err(err) = self.ctx.events.publish(message).await {
            debug!(error = %err, "worker event dropped");
        }
    }

    async fn sleep_range(&self, range: DelayRange) {
        let delay = self.parts.policy.draw_range(range);
        self.parts.pacer.sleep(delay).await;
    }

    fn drain_control(&mut self) {
        while let Ok(message) = self.ctx.control.try_recv() {
            match message {
                SurfaceMessage::Pause => {
                    info!("Worker paused");
                    self.paused = true;
                }
                SurfaceMessage::Resume => {
                    info!("Worker resumed");
                    self.paused = false;
                }
                other => debug!(message = other.name(), "ignoring control message"),
            }
        }
    }

    async fn persisted_command(&self) -> Option<Command> {
        match self.ctx.state.pending_command().await {
            Ok(command) => command,
            Err(err) => {
                warn!(error = %err, "reading pending command failed");
                None
            }
        }
    }

    /// Run until `done` or surface loss.
    pub async fn run(mut self) -> WorkerExit {
        info!(
            url = %self.ctx.worker_url,
            profile = %self.parts.policy.profile().name,
            baseline = self.deleted,
            "Worker starting"
        );

        self.parts
            .pacer
            .sleep(Duration::from_millis(self.timings.load_settle_ms))
            .await;
        if self.persisted_command().await == Some(Command::Pause) {
            self.paused = true;
        }
        self.sleep_range(self.timings.entry_settle).await;
        if let Some(exit) = self.lost() {
            return exit;
        }

        if self.parts.locator.is_inbox_empty().await {
            return self.finish(status_text::NOTHING_TO_DELETE.to_string()).await;
        }
        let visible = self.initial_count().await;
        if let Some(exit) = self.lost() {
            return exit;
        }
        if visible == 0 {
            return self.finish(status_text::NOTHING_TO_DELETE.to_string()).await;
        }
        self.total = self.deleted + visible;
        info!(total = self.total, "Initial total established");
        self.emit(DeletionStatus::Running, status_text::found(visible)).await;

        loop {
            match self.pass().await {
                Pass::Continue => {}
                Pass::Finished => break,
                Pass::Exit(exit) => return exit,
            }
        }

        let deleted = self.deleted;
        self.finish(status_text::completed(deleted)).await
    }

    async fn initial_count(&self) -> u32 {
        if let Some(estimator) = &self.estimator {
            if let Some(total) = estimator.estimate_total().await {
                if total > 0 {
                    info!(total, "Initial total from inbox listing");
                    return total;
                }
            }
            debug!("Inbox listing unavailable, counting rows");
        }
        self.parts.locator.count_conversations().await
    }

    async fn pass(&mut self) -> Pass {
        self.drain_control();
        while self.paused {
            self.emit(
                DeletionStatus::Paused,
                status_text::paused(self.deleted, self.total),
            )
            .await;
            self.sleep_range(self.timings.pause_poll).await;
            self.drain_control();
            if let Some(exit) = self.lost() {
                return Pass::Exit(exit);
            }
            if self
                .persisted_command()
                .await
                .is_some_and(|command| command.releases_pause())
            {
                info!("Resume picked up from persisted command");
                self.paused = false;
            }
        }
        if let Some(exit) = self.lost() {
            return Pass::Exit(exit);
        }

        if self.parts.locator.is_inbox_empty().await {
            info!("Inbox empty");
            return Pass::Finished;
        }
        let remaining = self.parts.locator.count_conversations().await;
        if remaining == 0 {
            self.sleep_range(self.timings.zero_recheck).await;
            if self.parts.locator.count_conversations().await == 0
                || self.parts.locator.is_inbox_empty().await
            {
                info!("No conversations left");
                return Pass::Finished;
            }
        }
        self.total = self.total.max(self.deleted + remaining);

        self.emit(
            DeletionStatus::Running,
            status_text::deleting(self.deleted + 1, self.total),
        )
        .await;

        let outcome = self.parts.cycle.delete_top_conversation().await;
        if outcome.success {
            self.deleted += 1;
            self.total = self.total.max(self.deleted);
            self.fail_streak = 0;
            info!(deleted = self.deleted, total = self.total, "Conversation deleted");
            // The surface may have gone right after the confirm click.
            if let Some(exit) = self.lost() {
                return Pass::Exit(exit);
            }
            self.emit(
                DeletionStatus::Running,
                status_text::deleting(self.deleted, self.total),
            )
            .await;

            let (key, delay) = self.parts.policy.after_delete_delay(self.deleted);
            if key == DelayKey::PauseDuration {
                self.emit(
                    DeletionStatus::Running,
                    status_text::natural_pause(self.deleted, self.total),
                )
                .await;
            }
            self.parts.pacer.sleep(delay).await;
            return Pass::Continue;
        }
        if let Some(exit) = self.lost() {
            return Pass::Exit(exit);
        }
        if outcome.surface_closed() {
            return Pass::Exit(WorkerExit::SurfaceLost(self.progress("")));
        }

        self.fail_streak += 1;
        warn!(
            streak = self.fail_streak,
            reason = ?outcome.reason(),
            step = outcome.step.name(),
            "Deletion cycle failed"
        );
        if self.fail_streak >= self.timings.failure_threshold {
            if self.parts.locator.is_inbox_empty().await
                || self.parts.locator.count_conversations().await == 0
            {
                info!("Inbox empty after failures; treating as finished");
                return Pass::Finished;
            }
            let text = status_text::failures(self.deleted, self.fail_streak);
            warn!(deleted = self.deleted, total = self.total, "Giving up after consecutive failures");
            self.emit(DeletionStatus::Done, text.clone()).await;
            return Pass::Exit(WorkerExit::Completed(self.progress(text)));
        }

        if !self.on_inbox().await {
            self.return_to_inbox().await;
            return Pass::Continue;
        }
        self.sleep_range(self.timings.failure_retry).await;
        Pass::Continue
    }

    async fn on_inbox(&self) -> bool {
        match self.parts.primitives.current_url().await {
            Some(url) => is_under_path(&url, &self.inbox_path).unwrap_or(true),
            None => true,
        }
    }

    async fn return_to_inbox(&self) {
        info!(url = %self.ctx.worker_url, "Returning to inbox");
        let ctx = ExecCtx::new(
            self.timings.cycle.action_timeout(),
            self.ctx.closed.child_token(),
        );
        let report = self
            .parts
            .primitives
            .navigate(
                &ctx,
                &self.ctx.worker_url,
                Settle::Fixed(Duration::from_millis(self.timings.load_settle_ms)),
            )
            .await;
        if !report.ok {
            warn!(reason = ?report.reason(), "Return to inbox failed");
        }
    }

    async fn finish(&mut self, text: String) -> WorkerExit {
        self.total = self.total.max(self.deleted);
        info!(deleted = self.deleted, total = self.total, "Worker done");
        self.emit(DeletionStatus::Done, text.clone()).await;
        WorkerExit::Completed(self.progress(text))
    }
}
