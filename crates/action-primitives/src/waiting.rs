//! Bounded polling

use std::future::Future;
use std::time::Duration;

use stealth::Pacer;
use tracing::debug;

/// Poll cadence and budget for [`await_condition`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollConfig {
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub const fn from_millis(interval_ms: u64, timeout_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
        )
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::from_millis(250, 3000)
    }
}

/// Check now, re-poll every interval, and check one final time once the budget
/// is spent. Time is measured in requested sleeps, so a recording pacer sees the
/// same number of attempts as a real one.
pub async fn await_condition<T, F, Fut>(pacer: &dyn Pacer, poll: PollConfig, mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let interval = if poll.interval.is_zero() {
        poll.timeout.max(Duration::from_millis(1))
    } else {
        poll.interval
    };
    let mut waited = Duration::ZERO;
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        if let Some(found) = check().await {
            debug!(attempts, waited_ms = waited.as_millis() as u64, "condition met");
            return Some(found);
        }
        if waited >= poll.timeout {
            debug!(attempts, timeout_ms = poll.timeout.as_millis() as u64, "condition not met");
            return None;
        }
        let step = interval.min(poll.timeout - waited);
        pacer.sleep(step).await;
        waited += step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use stealth::RecordingPacer;

    #[tokio::test]
    async fn immediate_hit_does_not_sleep() {
        let pacer = RecordingPacer::new();
        let found = await_condition(pacer.as_ref(), PollConfig::default(), || async { Some(7) }).await;
        assert_eq!(found, Some(7));
        assert!(pacer.sleeps().is_empty());
    }

    #[tokio::test]
    async fn final_check_happens_at_timeout() {
        let pacer = RecordingPacer::new();
        let calls = AtomicU32::new(0);
        let poll = PollConfig::from_millis(1000, 2500);
        let found: Option<()> = await_condition(pacer.as_ref(), poll, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { None }
        })
        .await;
        assert_eq!(found, None);
        // t=0, 1000, 2000, 2500
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(pacer.total(), Duration::from_millis(2500));
    }

    #[tokio::test]
    async fn late_hit_is_returned() {
        let pacer = RecordingPacer::new();
        let calls = AtomicU32::new(0);
        let found = await_condition(pacer.as_ref(), PollConfig::from_millis(100, 1000), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { (n == 3).then_some("confirm") }
        })
        .await;
        assert_eq!(found, Some("confirm"));
        assert_eq!(pacer.sleeps().len(), 3);
    }
}
