mod common;

use std::sync::Arc;
use std::time::Duration;

use action_flow::CycleFailure;
use cdp_adapter::scripted::{DriverCall, ScriptedDriver, ScriptedSurface};
use cdp_adapter::Surface;
use common::{is_complete, is_paused, next_matching, parts, FakeInbox, WORKER_URL};
use dmsweep_cli::config::WorkerTimings;
use dmsweep_cli::worker::{status_text, WorkerContext, WorkerExit, WorkerLoop};
use dmsweep_core_types::{Command, Progress};
use dmsweep_event_bus::{EventBus, InMemoryBus, SurfaceMessage};
use dmsweep_state_center::PersistedState;
use parking_lot::Mutex;
use stealth::RecordingPacer;
use tokio::sync::{broadcast, mpsc};

struct Run {
    inbox: Arc<FakeInbox>,
    driver: Arc<ScriptedDriver>,
    pacer: Arc<RecordingPacer>,
    state: PersistedState,
    control: mpsc::Sender<SurfaceMessage>,
    events: broadcast::Receiver<SurfaceMessage>,
    worker: WorkerLoop,
}

fn run_with(inbox: Arc<FakeInbox>, baseline_deleted: u32) -> Run {
    let driver = ScriptedDriver::new(WORKER_URL);
    let surface: Arc<dyn Surface> = ScriptedSurface::new(driver.clone());
    let pacer = RecordingPacer::new();
    let state = PersistedState::in_memory();
    let bus: Arc<InMemoryBus<SurfaceMessage>> = InMemoryBus::new(1024);
    let events = bus.subscribe();
    let (control, control_rx) = mpsc::channel(8);
    let ctx = WorkerContext {
        state: state.clone(),
        events: bus,
        control: control_rx,
        baseline_deleted,
        worker_url: WORKER_URL.to_string(),
        closed: surface.closed_token(),
    };
    let worker = WorkerLoop::new(
        parts(&inbox, &surface, &pacer),
        ctx,
        WorkerTimings::default(),
    );
    Run {
        inbox,
        driver,
        pacer,
        state,
        control,
        events,
        worker,
    }
}

fn drain(events: &mut broadcast::Receiver<SurfaceMessage>) -> Vec<SurfaceMessage> {
    let mut seen = Vec::new();
    while let Ok(message) = events.try_recv() {
        seen.push(message);
    }
    seen
}

fn progress_of(events: &[SurfaceMessage]) -> Vec<Progress> {
    events.iter().filter_map(|m| m.progress().cloned()).collect()
}

#[tokio::test]
async fn three_conversations_all_deleted() {
    let Run {
        inbox,
        mut events,
        worker,
        ..
    } = run_with(FakeInbox::new(3), 0);

    let exit = worker.run().await;

    let WorkerExit::Completed(progress) = exit else {
        panic!("unexpected exit {exit:?}");
    };
    assert_eq!((progress.deleted, progress.total), (3, 3));
    assert_eq!(progress.status_text, status_text::completed(3));
    assert_eq!(inbox.cycles(), 3);

    let seen = drain(&mut events);
    assert!(is_complete(seen.last().unwrap()));
    assert_eq!(progress_of(&seen)[0].status_text, status_text::found(3));
    for progress in progress_of(&seen) {
        assert!(progress.deleted <= progress.total, "{progress:?}");
    }
}

#[tokio::test]
async fn empty_inbox_finishes_without_cycling() {
    let inbox = FakeInbox::new(0);
    inbox.show_placeholder();
    let Run {
        inbox,
        mut events,
        worker,
        ..
    } = run_with(inbox, 0);

    let exit = worker.run().await;

    assert_eq!(
        exit,
        WorkerExit::Completed(Progress::new(0, 0, status_text::NOTHING_TO_DELETE))
    );
    assert_eq!(inbox.cycles(), 0);
    let seen = drain(&mut events);
    assert_eq!(seen.len(), 1);
    assert!(is_complete(&seen[0]));
}

#[tokio::test]
async fn zero_rows_without_placeholder_also_counts_as_empty() {
    let Run { inbox, worker, .. } = run_with(FakeInbox::new(0), 0);
    let exit = worker.run().await;
    assert_eq!(exit.progress().status_text, status_text::NOTHING_TO_DELETE);
    assert_eq!(inbox.cycles(), 0);
}

#[tokio::test]
async fn persistent_failures_end_the_run() {
    let inbox = FakeInbox::new(4);
    inbox.fail_always(CycleFailure::InfoControlNotFound);
    let Run {
        inbox,
        pacer,
        mut events,
        worker,
        ..
    } = run_with(inbox, 0);

    let exit = worker.run().await;

    let progress = exit.progress().clone();
    assert_eq!((progress.deleted, progress.total), (0, 4));
    assert!(progress.status_text.contains('5'), "{}", progress.status_text);
    assert_eq!(inbox.cycles(), 5);
    assert!(is_complete(drain(&mut events).last().unwrap()));

    // Four retry waits between the five attempts.
    let retries = pacer
        .sleeps()
        .iter()
        .filter(|d| (1500..=2500).contains(&(d.as_millis() as u64)))
        .count();
    assert!(retries >= 4);
}

#[tokio::test]
async fn failures_on_a_drained_inbox_count_as_completion() {
    let inbox = FakeInbox::new(2);
    inbox.fail_always(CycleFailure::DeleteControlNotFound);
    let drained = inbox.clone();
    inbox.after_cycle(5, move || drained.set_rows(0));
    let Run { worker, .. } = run_with(inbox, 0);

    let exit = worker.run().await;

    assert_eq!(exit.progress().status_text, status_text::completed(0));
}

#[tokio::test]
async fn failure_away_from_inbox_navigates_back() {
    let inbox = FakeInbox::new(2);
    inbox.fail_next(CycleFailure::ConfirmControlNotFound);
    let Run { driver, worker, .. } = run_with(inbox, 0);
    driver.set_url("https://dm.test/direct/t/340282366841710300/");

    let exit = worker.run().await;

    assert_eq!(exit.progress().deleted, 2);
    assert!(driver
        .calls()
        .contains(&DriverCall::Navigate(WORKER_URL.to_string())));
}

#[tokio::test]
async fn natural_pause_follows_every_twelfth_deletion() {
    let inbox = FakeInbox::new(13);
    let Run {
        inbox,
        pacer,
        mut events,
        worker,
        ..
    } = run_with(inbox, 0);
    let mark = Arc::new(Mutex::new(None));
    {
        let pacer = pacer.clone();
        let mark = mark.clone();
        inbox.after_cycle(12, move || *mark.lock() = Some(pacer.sleeps().len()));
    }

    let exit = worker.run().await;
    assert_eq!(exit.progress().deleted, 13);

    let index = mark.lock().expect("twelfth cycle ran");
    let after_twelfth = pacer.sleeps()[index].as_millis() as u64;
    assert!((4000..=7000).contains(&after_twelfth), "{after_twelfth}");
    let long_sleeps = pacer
        .sleeps()
        .iter()
        .filter(|d| (4000..=7000).contains(&(d.as_millis() as u64)))
        .count();
    assert_eq!(long_sleeps, 1);

    let seen = progress_of(&drain(&mut events));
    assert!(seen
        .iter()
        .any(|p| p.status_text == status_text::natural_pause(12, 13)));
}

#[tokio::test]
async fn pause_and_resume_keep_counters() {
    let inbox = FakeInbox::new(5);
    let Run {
        inbox,
        control,
        mut events,
        worker,
        ..
    } = run_with(inbox, 0);
    {
        let control = control.clone();
        inbox.after_cycle(2, move || {
            control.try_send(SurfaceMessage::Pause).unwrap();
        });
    }

    let task = tokio::spawn(worker.run());

    let paused = next_matching(&mut events, is_paused).await;
    let progress = paused.progress().unwrap();
    assert_eq!((progress.deleted, progress.total), (2, 5));
    assert_eq!(progress.status_text, status_text::paused(2, 5));
    assert_eq!(inbox.rows(), 3);

    control.send(SurfaceMessage::Resume).await.unwrap();
    let done = next_matching(&mut events, is_complete).await;
    let progress = done.progress().unwrap();
    assert_eq!((progress.deleted, progress.total), (5, 5));

    let exit = task.await.unwrap();
    assert_eq!(exit.progress().deleted, 5);
}

#[tokio::test]
async fn persisted_resume_releases_a_paused_worker() {
    let inbox = FakeInbox::new(2);
    let Run {
        state,
        mut events,
        worker,
        ..
    } = run_with(inbox, 0);
    state.set_pending_command(Command::Pause).await.unwrap();

    let task = tokio::spawn(worker.run());
    let paused = next_matching(&mut events, is_paused).await;
    assert_eq!(paused.progress().unwrap().deleted, 0);

    state.set_pending_command(Command::Resume).await.unwrap();
    next_matching(&mut events, is_complete).await;
    assert_eq!(task.await.unwrap().progress().deleted, 2);
}

#[tokio::test]
async fn persisted_resume_at_load_starts_unpaused() {
    let Run {
        state,
        mut events,
        worker,
        ..
    } = run_with(FakeInbox::new(1), 0);
    state.set_pending_command(Command::Resume).await.unwrap();

    let exit = worker.run().await;

    assert_eq!(exit.progress().deleted, 1);
    assert!(!drain(&mut events).iter().any(is_paused));
}

#[tokio::test]
async fn baseline_carries_over_into_a_restarted_run() {
    let Run { worker, mut events, .. } = run_with(FakeInbox::new(2), 3);

    let exit = worker.run().await;

    assert_eq!(
        exit,
        WorkerExit::Completed(Progress::new(5, 5, status_text::completed(5)))
    );
    let seen = progress_of(&drain(&mut events));
    assert_eq!((seen[0].deleted, seen[0].total), (3, 5));
}

#[tokio::test]
async fn closing_the_surface_stops_without_done() {
    let inbox = FakeInbox::new(3);
    let Run {
        driver,
        mut events,
        worker,
        ..
    } = run_with(inbox.clone(), 0);
    {
        let driver = driver.clone();
        inbox.after_cycle(1, move || driver.close());
    }

    let exit = tokio::time::timeout(Duration::from_secs(10), worker.run())
        .await
        .unwrap();

    let WorkerExit::SurfaceLost(progress) = exit else {
        panic!("unexpected exit {exit:?}");
    };
    assert_eq!(progress.deleted, 1);
    assert!(!drain(&mut events).iter().any(is_complete));
}
