//! Cross-surface coordinator.
//!
//! Owns the worker surface, persists every worker event into the shared
//! [`DeletionState`] and relays it to the control surface. At most one worker
//! surface is alive at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cdp_adapter::{Surface, SurfaceHost};
use dmsweep_core_types::{Command, DeletionState, DeletionStatus, SurfaceId};
use dmsweep_event_bus::{to_mpsc, EventBus, InMemoryBus, SurfaceMessage};
use dmsweep_state_center::PersistedState;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::factory::WorkerFactory;
use crate::worker::{status_text, WorkerContext};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A run is already `starting`/`running` and `force` was not set
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// The live worker got the command
    Forwarded,
    /// No live worker; a new run started from the persisted counters
    Restarted,
}

struct ActiveWorker {
    run_id: u64,
    surface: Arc<dyn Surface>,
    control: mpsc::Sender<SurfaceMessage>,
    worker_task: JoinHandle<()>,
}

struct CoordinatorInner {
    host: Arc<dyn SurfaceHost>,
    state: PersistedState,
    factory: Arc<dyn WorkerFactory>,
    control_bus: Arc<InMemoryBus<SurfaceMessage>>,
    worker_url: String,
    grace: Duration,
    active: Mutex<Option<ActiveWorker>>,
    runs: AtomicU64,
}

#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

impl Coordinator {
    pub fn new(
        host: Arc<dyn SurfaceHost>,
        state: PersistedState,
        factory: Arc<dyn WorkerFactory>,
        worker_url: impl Into<String>,
        grace: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                host,
                state,
                factory,
                control_bus: InMemoryBus::new(EVENT_CAPACITY),
                worker_url: worker_url.into(),
                grace,
                active: Mutex::new(None),
                runs: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> &PersistedState {
        &self.inner.state
    }

    /// Events relayed to the control surface.
    pub fn subscribe(&self) -> broadcast::Receiver<SurfaceMessage> {
        self.inner.control_bus.subscribe()
    }

    pub async fn worker_surface(&self) -> Option<SurfaceId> {
        self.inner
            .active
            .lock()
            .await
            .as_ref()
            .map(|active| active.surface.id().clone())
    }

    /// Dispatch one control-surface message. Returns the state for `get_status`.
    pub async fn handle(&self, message: SurfaceMessage) -> Result<Option<DeletionState>> {
        debug!(message = message.name(), "control message");
        match message {
            SurfaceMessage::StartDelete => {
                self.start(false).await?;
            }
            SurfaceMessage::StopDelete => self.stop().await?,
            SurfaceMessage::ResumeDelete => {
                self.resume().await?;
            }
            SurfaceMessage::CloseDelete => self.close().await?,
            SurfaceMessage::GetStatus => return Ok(Some(self.get_status().await?)),
            other => warn!(message = other.name(), "not a control message"),
        }
        Ok(None)
    }

    pub async fn get_status(&self) -> Result<DeletionState> {
        Ok(self.inner.state.deletion_state().await?)
    }

    /// Begin a fresh run with `deleted` reset to zero.
    pub async fn start(&self, force: bool) -> Result<StartOutcome> {
        if !force {
            let current = self.inner.state.deletion_state().await?;
            if current.status.is_active() {
                info!(status = %current.status, "Run already active; not starting");
                return Ok(StartOutcome::AlreadyRunning);
            }
        }
        self.launch(0, 0).await?;
        Ok(StartOutcome::Started)
    }

    /// Pause. Repeating it is harmless.
    pub async fn stop(&self) -> Result<()> {
        self.inner.state.set_pending_command(Command::Pause).await?;
        if let Some(active) = self.inner.active.lock().await.as_ref() {
            if let Err(err) = active.control.try_send(SurfaceMessage::Pause) {
                debug!(error = %err, "pause not delivered to worker");
            }
        }
        info!("Pause requested");
        Ok(())
    }

    pub async fn resume(&self) -> Result<ResumeOutcome> {
        self.inner.state.set_pending_command(Command::Resume).await?;
        let forwarded = match self.inner.active.lock().await.as_ref() {
            Some(active) if !active.surface.is_closed() => {
                active.control.try_send(SurfaceMessage::Resume).is_ok()
            }
            _ => false,
        };
        if forwarded {
            info!("Resume forwarded to worker");
            return Ok(ResumeOutcome::Forwarded);
        }

        let previous = self.inner.state.deletion_state().await?;
        info!(baseline = previous.deleted, total = previous.total, "No live worker; restarting");
        self.launch(previous.deleted, previous.total).await?;
        Ok(ResumeOutcome::Restarted)
    }

    /// Tear the worker down and forget the run.
    pub async fn close(&self) -> Result<()> {
        self.teardown_active().await;
        self.inner.state.set_deletion_state(&DeletionState::idle()).await?;
        self.inner.state.clear_pending_command().await?;
        info!("Run closed");
        Ok(())
    }

    /// Tear down the worker and the browser. An unfinished run is left paused
    /// with its counters so a later `resume` picks it up.
    pub async fn shutdown(&self) {
        self.teardown_active().await;
        let updated = self
            .inner
            .state
            .update_deletion_state(|state| {
                if state.status.is_active() {
                    *state = state.paused_with(status_text::paused(state.deleted, state.total));
                }
            })
            .await;
        if let Err(err) = updated {
            warn!(error = %err, "persisting shutdown state failed");
        }
        self.inner.host.shutdown().await;
    }

    async fn launch(&self, baseline: u32, known_total: u32) -> Result<()> {
        let inner = &self.inner;
        inner
            .state
            .set_deletion_state(&DeletionState::starting(
                baseline,
                known_total,
                status_text::STARTING,
            ))
            .await?;
        inner.state.set_pending_command(Command::Start).await?;

        self.teardown_active().await;

        let surface = match inner.host.open_surface(&inner.worker_url).await {
            Ok(surface) => surface,
            Err(err) => {
                let text = format!("Could not open worker window: {err}");
                inner
                    .state
                    .update_deletion_state(move |state| *state = state.paused_with(text))
                    .await?;
                return Err(err).context("opening worker surface");
            }
        };
        let run_id = inner.runs.fetch_add(1, Ordering::SeqCst) + 1;
        info!(run_id, surface = %surface.id(), url = %inner.worker_url, "Worker surface opened");

        let worker_bus: Arc<InMemoryBus<SurfaceMessage>> = InMemoryBus::new(EVENT_CAPACITY);
        let mut events = to_mpsc(worker_bus.clone(), EVENT_CAPACITY);
        let (control_tx, control_rx) = mpsc::channel(8);
        let closed = surface.closed_token();
        let ctx = WorkerContext {
            state: inner.state.clone(),
            events: worker_bus,
            control: control_rx,
            baseline_deleted: baseline,
            worker_url: inner.worker_url.clone(),
            closed: closed.clone(),
        };
        let worker = inner.factory.build(surface.clone(), ctx).await;

        // Held until the run is registered so early events are not mistaken for a retired run.
        let mut slot = inner.active.lock().await;
        let worker_task = tokio::spawn(async move {
            let exit = worker.run().await;
            debug!(run_id, ?exit, "worker finished");
        });

        let relay = self.clone();
        tokio::spawn(async move {
            while let Some(message) = events.recv().await {
                relay.on_worker_event(run_id, message).await;
            }
        });

        let watcher = self.clone();
        tokio::spawn(async move {
            closed.cancelled().await;
            watcher.on_surface_lost(run_id).await;
        });

        *slot = Some(ActiveWorker {
            run_id,
            surface,
            control: control_tx,
            worker_task,
        });
        Ok(())
    }

    async fn on_worker_event(&self, run_id: u64, message: SurfaceMessage) {
        // Held while persisting so a teardown cannot interleave with the write.
        let slot = self.inner.active.lock().await;
        if !slot.as_ref().is_some_and(|active| active.run_id == run_id) {
            debug!(run_id, event = message.name(), "event from retired run ignored");
            return;
        }
        if let (Some(status), Some(progress)) = (message.implied_status(), message.progress()) {
            let record = DeletionState::from_progress(status, progress);
            if let Err(err) = self.inner.state.set_deletion_state(&record).await {
                warn!(error = %err, "persisting worker event failed");
            }
        }
        if let Err(err) = self.inner.control_bus.publish(message.clone()).await {
            debug!(error = %err, "no control surface listening");
        }
        drop(slot);

        if let SurfaceMessage::DeleteComplete(progress) = &message {
            info!(deleted = progress.deleted, total = progress.total, "Run complete");
            let this = self.clone();
            let grace = self.inner.grace;
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                this.teardown_run(run_id).await;
            });
        }
    }

    async fn on_surface_lost(&self, run_id: u64) {
        let active = {
            let mut slot = self.inner.active.lock().await;
            match slot.as_ref() {
                Some(active) if active.run_id == run_id => slot.take(),
                _ => None,
            }
        };
        let Some(active) = active else {
            return;
        };
        warn!(run_id, surface = %active.surface.id(), "Worker surface closed unexpectedly");

        let updated = self
            .inner
            .state
            .update_deletion_state(|state| {
                if state.status.is_active() {
                    *state = state.paused_with(status_text::WINDOW_CLOSED);
                }
            })
            .await;
        match updated {
            Ok(state) if state.status == DeletionStatus::Paused => {
                let message = SurfaceMessage::DeletePaused(state.progress());
                if let Err(err) = self.inner.control_bus.publish(message).await {
                    debug!(error = %err, "no control surface listening");
                }
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "persisting surface loss failed"),
        }
    }

    async fn teardown_run(&self, run_id: u64) {
        let active = {
            let mut slot = self.inner.active.lock().await;
            match slot.as_ref() {
                Some(active) if active.run_id == run_id => slot.take(),
                _ => None,
            }
        };
        if let Some(active) = active {
            Self::close_worker(active).await;
        }
    }

    async fn teardown_active(&self) {
        let active = self.inner.active.lock().await.take();
        if let Some(active) = active {
            Self::close_worker(active).await;
        }
    }

    async fn close_worker(active: ActiveWorker) {
        info!(run_id = active.run_id, surface = %active.surface.id(), "Tearing down worker surface");
        active.worker_task.abort();
        if let Err(err) = active.surface.close().await {
            debug!(error = %err, "closing worker surface failed");
        }
    }
}
