//! Core data types for action primitives

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use stealth::{DelayKey, DelayRange};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::ActionError;

/// Execution context for one action
///
/// - Deadline for timeout enforcement
/// - Cancellation token, cancelled when the surface goes away
/// - Unique action ID for tracing and correlation
#[derive(Clone, Debug)]
pub struct ExecCtx {
    /// Deadline for this operation
    pub deadline: Instant,

    /// Cancellation token for cooperative cancellation
    pub cancel_token: CancellationToken,

    /// Unique identifier for this action
    pub action_id: String,
}

impl ExecCtx {
    pub fn new(timeout: Duration, cancel_token: CancellationToken) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            cancel_token,
            action_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Check if this context has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Check if this context has exceeded its deadline
    pub fn is_timeout(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Get remaining time until deadline
    pub fn remaining_time(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub(crate) fn check(&self) -> Result<(), ActionError> {
        if self.is_cancelled() {
            return Err(ActionError::Interrupted("Context cancelled".to_string()));
        }
        if self.is_timeout() {
            return Err(ActionError::WaitTimeout(
                "Context deadline exceeded".to_string(),
            ));
        }
        Ok(())
    }

    /// Run one driver call, bounded by the deadline and the cancel token.
    pub(crate) async fn bound<T, F>(&self, call: F) -> Result<T, ActionError>
    where
        F: Future<Output = Result<T, ActionError>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => {
                Err(ActionError::Interrupted("Context cancelled during action".to_string()))
            }
            outcome = tokio::time::timeout(self.remaining_time(), call) => match outcome {
                Ok(result) => result,
                Err(_) => Err(ActionError::WaitTimeout(format!(
                    "action {} exceeded its deadline",
                    self.action_id
                ))),
            },
        }
    }
}

/// Wait applied after an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
    /// No wait
    None,

    /// Exactly this long
    Fixed(Duration),

    /// Uniform draw from an explicit range
    Range(DelayRange),

    /// Uniform draw from the active speed profile
    Paced(DelayKey),
}

/// Transient reference to a live element. The selector points at a marker
/// attribute stamped by the locator; it is re-resolved every cycle and never
/// kept across waits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    pub selector: String,
    pub description: String,
}

impl ElementHandle {
    pub fn new(selector: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description, self.selector)
    }
}

/// Outcome of one action. Failures are values, never errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionReport {
    /// Whether the action succeeded
    pub ok: bool,

    /// When the action started
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,

    /// When the action finished
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub finished_at: DateTime<Utc>,

    /// Total latency in milliseconds, settle excluded
    pub latency_ms: u64,

    /// Settle wait applied afterwards
    pub settled_ms: u64,

    /// Error details (if failed)
    #[serde(skip)]
    pub error: Option<ActionError>,
}

impl ActionReport {
    /// Create a successful action report
    pub fn success(started_at: DateTime<Utc>, latency_ms: u64) -> Self {
        Self {
            ok: true,
            started_at,
            finished_at: Utc::now(),
            latency_ms,
            settled_ms: 0,
            error: None,
        }
    }

    /// Create a failed action report
    pub fn failure(started_at: DateTime<Utc>, latency_ms: u64, error: ActionError) -> Self {
        Self {
            ok: false,
            started_at,
            finished_at: Utc::now(),
            latency_ms,
            settled_ms: 0,
            error: Some(error),
        }
    }

    pub fn with_settle(mut self, settled: Duration) -> Self {
        self.settled_ms = settled.as_millis() as u64;
        self
    }

    /// Human-readable failure reason
    pub fn reason(&self) -> Option<String> {
        self.error.as_ref().map(|err| err.to_string())
    }

    pub fn surface_closed(&self) -> bool {
        self.error
            .as_ref()
            .map(ActionError::is_surface_closed)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_report_keeps_reason() {
        let report = ActionReport::failure(
            Utc::now(),
            12,
            ActionError::SurfaceClosed("gone".into()),
        );
        assert!(!report.ok);
        assert!(report.surface_closed());
        assert_eq!(report.reason().as_deref(), Some("Surface closed: gone"));
    }

    #[test]
    fn cancelled_context_is_interrupted() {
        let token = CancellationToken::new();
        let ctx = ExecCtx::new(Duration::from_secs(5), token.clone());
        assert!(ctx.check().is_ok());
        token.cancel();
        assert!(matches!(ctx.check(), Err(ActionError::Interrupted(_))));
    }

    #[test]
    fn adapter_errors_classify() {
        let closed: ActionError = cdp_adapter::AdapterError::surface_closed().into();
        assert!(closed.is_surface_closed());
        assert_eq!(closed.severity(), 3);
        assert!(!closed.is_retryable());

        let io: ActionError =
            cdp_adapter::AdapterError::new(cdp_adapter::AdapterErrorKind::CdpIo).into();
        assert!(io.is_retryable());
        assert_eq!(io.severity(), 2);
    }
}
