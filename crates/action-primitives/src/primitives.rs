//! Action primitives implementation
//!
//! 1. click - trusted click with a script-click fallback
//! 2. navigate / navigate_back - load a URL or step back in history
//! 3. press_escape - dismiss an open dialog

mod click;
mod escape;
mod navigate;

pub use click::*;
pub use escape::*;
pub use navigate::*;

use async_trait::async_trait;
use cdp_adapter::PageDriver;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use stealth::{delay_from_profile, Pacer, PacingPolicy};
use tracing::warn;

use crate::{
    errors::ActionError,
    types::{ActionReport, ElementHandle, ExecCtx, Settle},
};

/// Best-effort UI actions. Every method resolves to a report; none of them
/// returns an error.
#[async_trait]
pub trait ActionPrimitives: Send + Sync {
    async fn click(&self, ctx: &ExecCtx, target: &ElementHandle, settle: Settle) -> ActionReport;

    async fn navigate(&self, ctx: &ExecCtx, url: &str, settle: Settle) -> ActionReport;

    async fn navigate_back(&self, ctx: &ExecCtx, settle: Settle) -> ActionReport;

    async fn press_escape(&self, ctx: &ExecCtx, settle: Settle) -> ActionReport;

    /// Apply a settle wait on its own, returning what was slept.
    async fn settle(&self, settle: Settle) -> Duration;

    async fn current_url(&self) -> Option<String>;
}

/// Primitives over a [`PageDriver`], paced by the run's [`PacingPolicy`].
pub struct DefaultActionPrimitives {
    driver: Arc<dyn PageDriver>,
    policy: Arc<PacingPolicy>,
    pacer: Arc<dyn Pacer>,
}

impl DefaultActionPrimitives {
    pub fn new(
        driver: Arc<dyn PageDriver>,
        policy: Arc<PacingPolicy>,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        Self {
            driver,
            policy,
            pacer,
        }
    }

    /// Get reference to the page driver
    pub fn driver(&self) -> &Arc<dyn PageDriver> {
        &self.driver
    }

    pub(crate) async fn apply_settle(&self, settle: Settle) -> Duration {
        let duration = match settle {
            Settle::None => return Duration::ZERO,
            Settle::Fixed(duration) => duration,
            Settle::Range(range) => self.policy.draw_range(range),
            Settle::Paced(key) => {
                return delay_from_profile(&self.policy, self.pacer.as_ref(), key).await
            }
        };
        self.pacer.sleep(duration).await;
        duration
    }

    /// Turn an execution result into a report, then settle if it succeeded.
    pub(crate) async fn finish(
        &self,
        action: &str,
        started_at: DateTime<Utc>,
        start_instant: Instant,
        result: Result<(), ActionError>,
        settle: Settle,
    ) -> ActionReport {
        let latency_ms = start_instant.elapsed().as_millis() as u64;
        match result {
            Ok(()) => {
                let settled = self.apply_settle(settle).await;
                ActionReport::success(started_at, latency_ms).with_settle(settled)
            }
            Err(err) => {
                warn!(
                    action,
                    error = %err,
                    latency_ms,
                    severity = err.severity(),
                    retryable = err.is_retryable(),
                    "action failed"
                );
                ActionReport::failure(started_at, latency_ms, err)
            }
        }
    }
}

#[async_trait]
impl ActionPrimitives for DefaultActionPrimitives {
    async fn click(&self, ctx: &ExecCtx, target: &ElementHandle, settle: Settle) -> ActionReport {
        let started_at = Utc::now();
        let start_instant = Instant::now();
        let result = click::execute_click(self, ctx, target).await;
        self.finish("click", started_at, start_instant, result, settle)
            .await
    }

    async fn navigate(&self, ctx: &ExecCtx, url: &str, settle: Settle) -> ActionReport {
        let started_at = Utc::now();
        let start_instant = Instant::now();
        let result = navigate::execute_navigate(self, ctx, url).await;
        self.finish("navigate", started_at, start_instant, result, settle)
            .await
    }

    async fn navigate_back(&self, ctx: &ExecCtx, settle: Settle) -> ActionReport {
        let started_at = Utc::now();
        let start_instant = Instant::now();
        let result = navigate::execute_history_back(self, ctx).await;
        self.finish("navigate_back", started_at, start_instant, result, settle)
            .await
    }

    async fn press_escape(&self, ctx: &ExecCtx, settle: Settle) -> ActionReport {
        let started_at = Utc::now();
        let start_instant = Instant::now();
        let result = escape::execute_escape(self, ctx).await;
        self.finish("press_escape", started_at, start_instant, result, settle)
            .await
    }

    async fn settle(&self, settle: Settle) -> Duration {
        self.apply_settle(settle).await
    }

    async fn current_url(&self) -> Option<String> {
        match self.driver.current_url().await {
            Ok(url) => Some(url),
            Err(err) => {
                warn!(error = %err, "failed to read current url");
                None
            }
        }
    }
}
