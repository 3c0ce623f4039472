//! Fake inbox shared by the worker and coordinator tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use action_flow::{CycleFailure, CycleOutcome, DeletionCycle};
use action_locator::{ElementLocator, LocatorTarget, Resolution};
use action_primitives::{DefaultActionPrimitives, PollConfig};
use async_trait::async_trait;
use cdp_adapter::Surface;
use dmsweep_cli::config::WorkerTimings;
use dmsweep_cli::factory::WorkerFactory;
use dmsweep_cli::worker::{WorkerContext, WorkerLoop, WorkerParts};
use dmsweep_event_bus::SurfaceMessage;
use parking_lot::Mutex;
use stealth::{PacingPolicy, RecordingPacer, SpeedProfile};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

pub const WORKER_URL: &str = "https://dm.test/direct/inbox/?dmsweep=worker";

type Hook = Box<dyn FnOnce() + Send>;

/// Conversation list the fakes share. Each successful cycle removes one row.
#[derive(Default)]
pub struct FakeInbox {
    rows: AtomicU32,
    placeholder: AtomicBool,
    cycles: AtomicU32,
    queued_failures: Mutex<VecDeque<CycleFailure>>,
    always_fail: Mutex<Option<CycleFailure>>,
    hooks: Mutex<Vec<(u32, Hook)>>,
    gate: Mutex<Option<(u32, CancellationToken)>>,
}

impl FakeInbox {
    pub fn new(rows: u32) -> Arc<Self> {
        let inbox = Self::default();
        inbox.rows.store(rows, Ordering::SeqCst);
        Arc::new(inbox)
    }

    pub fn rows(&self) -> u32 {
        self.rows.load(Ordering::SeqCst)
    }

    pub fn set_rows(&self, rows: u32) {
        self.rows.store(rows, Ordering::SeqCst);
    }

    /// Render the empty-inbox placeholder once no rows are left.
    pub fn show_placeholder(&self) {
        self.placeholder.store(true, Ordering::SeqCst);
    }

    pub fn cycles(&self) -> u32 {
        self.cycles.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, failure: CycleFailure) {
        self.queued_failures.lock().push_back(failure);
    }

    pub fn fail_always(&self, failure: CycleFailure) {
        *self.always_fail.lock() = Some(failure);
    }

    /// Run `hook` right after the `cycle`-th cycle took effect.
    pub fn after_cycle(&self, cycle: u32, hook: impl FnOnce() + Send + 'static) {
        self.hooks.lock().push((cycle, Box::new(hook)));
    }

    /// Hold the `cycle`-th cycle until the returned token is cancelled.
    pub fn hold_cycle(&self, cycle: u32) -> CancellationToken {
        let release = CancellationToken::new();
        *self.gate.lock() = Some((cycle, release.clone()));
        release
    }

    fn is_empty(&self) -> bool {
        self.placeholder.load(Ordering::SeqCst) && self.rows() == 0
    }

    async fn run_cycle(&self) -> CycleOutcome {
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        let held = match self.gate.lock().as_ref() {
            Some((at, release)) if *at == cycle => Some(release.clone()),
            _ => None,
        };
        if let Some(release) = held {
            release.cancelled().await;
        }

        let failure = self
            .queued_failures
            .lock()
            .pop_front()
            .or_else(|| self.always_fail.lock().clone());
        let outcome = match failure {
            Some(failure) => CycleOutcome::failed(failure),
            None if self.rows() == 0 => CycleOutcome::failed(CycleFailure::NoConversation),
            None => {
                self.rows.fetch_sub(1, Ordering::SeqCst);
                CycleOutcome::deleted()
            }
        };

        let due: Vec<Hook> = {
            let mut hooks = self.hooks.lock();
            let (due, rest): (Vec<_>, Vec<_>) = hooks.drain(..).partition(|(at, _)| *at == cycle);
            *hooks = rest;
            due.into_iter().map(|(_, hook)| hook).collect()
        };
        for hook in due {
            hook();
        }
        outcome
    }
}

pub struct FakeLocator(pub Arc<FakeInbox>);

#[async_trait]
impl ElementLocator for FakeLocator {
    async fn locate(&self, _target: LocatorTarget) -> Option<Resolution> {
        None
    }

    async fn await_target(&self, _target: LocatorTarget, _poll: PollConfig) -> Option<Resolution> {
        None
    }

    async fn count_conversations(&self) -> u32 {
        self.0.rows()
    }

    async fn is_inbox_empty(&self) -> bool {
        self.0.is_empty()
    }

    async fn count_chats(&self) -> u32 {
        self.0.rows()
    }
}

pub struct FakeCycle(pub Arc<FakeInbox>);

#[async_trait]
impl DeletionCycle for FakeCycle {
    async fn delete_top_conversation(&self) -> CycleOutcome {
        self.0.run_cycle().await
    }
}

pub fn parts(
    inbox: &Arc<FakeInbox>,
    surface: &Arc<dyn Surface>,
    pacer: &Arc<RecordingPacer>,
) -> WorkerParts {
    let policy = Arc::new(PacingPolicy::with_seed(SpeedProfile::normal(), 7));
    let primitives = Arc::new(DefaultActionPrimitives::new(
        surface.driver(),
        policy.clone(),
        pacer.clone(),
    ));
    WorkerParts {
        locator: Arc::new(FakeLocator(inbox.clone())),
        cycle: Arc::new(FakeCycle(inbox.clone())),
        primitives,
        policy,
        pacer: pacer.clone(),
    }
}

/// Factory handing every run the same fake inbox.
pub struct FakeFactory {
    pub inbox: Arc<FakeInbox>,
    pub pacer: Arc<RecordingPacer>,
}

#[async_trait]
impl WorkerFactory for FakeFactory {
    async fn build(&self, surface: Arc<dyn Surface>, ctx: WorkerContext) -> WorkerLoop {
        WorkerLoop::new(
            parts(&self.inbox, &surface, &self.pacer),
            ctx,
            WorkerTimings::default(),
        )
    }
}

/// Next message matching `pred`, skipping lag.
pub async fn next_matching(
    rx: &mut broadcast::Receiver<SurfaceMessage>,
    pred: impl Fn(&SurfaceMessage) -> bool,
) -> SurfaceMessage {
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(message) if pred(&message) => return message,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => panic!("event stream closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(30), wait)
        .await
        .expect("timed out waiting for event")
}

pub fn is_complete(message: &SurfaceMessage) -> bool {
    matches!(message, SurfaceMessage::DeleteComplete(_))
}

pub fn is_paused(message: &SurfaceMessage) -> bool {
    matches!(message, SurfaceMessage::DeletePaused(_))
}
