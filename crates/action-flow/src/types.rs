//! Cycle types

use crate::errors::CycleFailure;
use action_primitives::PollConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use stealth::DelayRange;

/// Steps of one deletion cycle, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStep {
    LocateConversation,
    OpenConversation,
    LocateInfo,
    OpenInfo,
    LocateDelete,
    ClickDelete,
    LocateConfirm,
    ClickConfirm,
}

impl CycleStep {
    pub fn name(&self) -> &'static str {
        match self {
            CycleStep::LocateConversation => "locate conversation",
            CycleStep::OpenConversation => "open conversation",
            CycleStep::LocateInfo => "locate info control",
            CycleStep::OpenInfo => "open info panel",
            CycleStep::LocateDelete => "locate delete control",
            CycleStep::ClickDelete => "click delete control",
            CycleStep::LocateConfirm => "locate confirm control",
            CycleStep::ClickConfirm => "click confirm control",
        }
    }
}

/// Cleanup run after a failed step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recovery {
    /// Nothing was opened yet
    None,
    /// Leave the open conversation
    NavigateBack,
    /// Close the open confirmation dialog
    DismissDialog,
}

/// Result of one cycle. Never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub success: bool,
    pub failure: Option<CycleFailure>,
    /// Last step reached
    pub step: CycleStep,
}

impl CycleOutcome {
    pub fn deleted() -> Self {
        Self {
            success: true,
            failure: None,
            step: CycleStep::ClickConfirm,
        }
    }

    pub fn failed(failure: CycleFailure) -> Self {
        Self {
            success: false,
            step: failure.step(),
            failure: Some(failure),
        }
    }

    pub fn reason(&self) -> Option<String> {
        self.failure.as_ref().map(|f| f.to_string())
    }

    pub fn surface_closed(&self) -> bool {
        self.failure
            .as_ref()
            .map(CycleFailure::is_surface_closed)
            .unwrap_or(false)
    }
}

/// Timings for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    pub poll_interval_ms: u64,
    pub delete_poll_timeout_ms: u64,
    pub confirm_poll_timeout_ms: u64,
    pub back_settle: DelayRange,
    pub escape_settle: DelayRange,
    /// Upper bound for a single click or navigation
    pub action_timeout_ms: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
            delete_poll_timeout_ms: 3000,
            confirm_poll_timeout_ms: 3000,
            back_settle: DelayRange::new(500, 800),
            escape_settle: DelayRange::new(300, 500),
            action_timeout_ms: 5000,
        }
    }
}

impl CycleConfig {
    pub fn delete_poll(&self) -> PollConfig {
        PollConfig::from_millis(self.poll_interval_ms, self.delete_poll_timeout_ms)
    }

    pub fn confirm_poll(&self) -> PollConfig {
        PollConfig::from_millis(self.poll_interval_ms, self.confirm_poll_timeout_ms)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }
}
