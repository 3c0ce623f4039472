//! Shared records for the dmsweep deletion engine.
//!
//! Everything that crosses a surface boundary lives here: the persisted
//! [`DeletionState`], the pending [`Command`], the [`Progress`] payload carried by
//! worker events, and the identifiers used to correlate surfaces and bridge requests.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

/// Shared error type for the engine crates.
#[derive(Debug, Error, Clone)]
pub enum SweepError {
    #[error("{message}")]
    Message { message: String },
}

impl SweepError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SurfaceId(pub String);

impl SurfaceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SurfaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of one deletion run.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DeletionStatus {
    #[default]
    Idle,
    Starting,
    Running,
    Paused,
    Done,
}

impl DeletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionStatus::Idle => "idle",
            DeletionStatus::Starting => "starting",
            DeletionStatus::Running => "running",
            DeletionStatus::Paused => "paused",
            DeletionStatus::Done => "done",
        }
    }

    /// A worker surface is (or should be) driving the page.
    pub fn is_active(&self) -> bool {
        matches!(self, DeletionStatus::Starting | DeletionStatus::Running)
    }
}

impl fmt::Display for DeletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters reported by the worker with every event.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Progress {
    pub deleted: u32,
    pub total: u32,
    pub status_text: String,
}

impl Progress {
    pub fn new(deleted: u32, total: u32, status_text: impl Into<String>) -> Self {
        Self {
            deleted,
            total,
            status_text: status_text.into(),
        }
    }
}

/// The persisted record shared by the control surface, the coordinator and the worker.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "camelCase", default))]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeletionState {
    pub status: DeletionStatus,
    pub deleted: u32,
    pub total: u32,
    pub status_text: String,
}

impl DeletionState {
    pub fn idle() -> Self {
        Self::default()
    }

    /// Record for a run that is about to start. `known_total` never drops below
    /// the baseline.
    pub fn starting(baseline_deleted: u32, known_total: u32, status_text: impl Into<String>) -> Self {
        Self {
            status: DeletionStatus::Starting,
            deleted: baseline_deleted,
            total: known_total.max(baseline_deleted),
            status_text: status_text.into(),
        }
    }

    pub fn from_progress(status: DeletionStatus, progress: &Progress) -> Self {
        Self {
            status,
            deleted: progress.deleted,
            total: progress.total,
            status_text: progress.status_text.clone(),
        }
    }

    pub fn progress(&self) -> Progress {
        Progress::new(self.deleted, self.total, self.status_text.clone())
    }

    /// Move to `paused` keeping the counters, as after a lost worker surface.
    pub fn paused_with(&self, status_text: impl Into<String>) -> Self {
        Self {
            status: DeletionStatus::Paused,
            deleted: self.deleted,
            total: self.total,
            status_text: status_text.into(),
        }
    }
}

/// A single pending directive. Overwritten, never queued.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Command {
    Start,
    Pause,
    Resume,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Pause => "pause",
            Command::Resume => "resume",
        }
    }

    /// Commands that let a paused worker continue.
    pub fn releases_pause(&self) -> bool {
        matches!(self, Command::Start | Command::Resume)
    }
}

impl FromStr for Command {
    type Err = SweepError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Command::Start),
            "pause" => Ok(Command::Pause),
            "resume" => Ok(Command::Resume),
            other => Err(SweepError::new(format!("unknown command '{other}'"))),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_parsing_is_case_insensitive() {
        assert_eq!("Resume".parse::<Command>().unwrap(), Command::Resume);
        assert_eq!(" pause ".parse::<Command>().unwrap(), Command::Pause);
        assert!("stop".parse::<Command>().is_err());
    }

    #[test]
    fn pause_keeps_counters() {
        let running = DeletionState::from_progress(
            DeletionStatus::Running,
            &Progress::new(4, 9, "Deleting... (5/9)"),
        );
        let paused = running.paused_with("Window closed. Resume to continue.");
        assert_eq!(paused.status, DeletionStatus::Paused);
        assert_eq!((paused.deleted, paused.total), (4, 9));
    }

    #[test]
    fn active_statuses() {
        assert!(DeletionStatus::Starting.is_active());
        assert!(DeletionStatus::Running.is_active());
        assert!(!DeletionStatus::Paused.is_active());
        assert!(!DeletionStatus::Done.is_active());
    }

    #[test]
    fn starting_record_keeps_the_known_total() {
        let resumed = DeletionState::starting(1, 3, "Starting...");
        assert_eq!((resumed.deleted, resumed.total), (1, 3));
        let stale = DeletionState::starting(4, 3, "Starting...");
        assert_eq!((stale.deleted, stale.total), (4, 4));
        assert_eq!(DeletionState::starting(0, 0, "Starting...").total, 0);
    }

    #[cfg(feature = "serde-full")]
    #[test]
    fn state_uses_camel_case_keys() {
        let state = DeletionState::from_progress(
            DeletionStatus::Done,
            &Progress::new(3, 3, "3 conversations deleted successfully!"),
        );
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["status"], "done");
        assert_eq!(value["statusText"], "3 conversations deleted successfully!");

        let partial: DeletionState = serde_json::from_str(r#"{"status":"idle"}"#).unwrap();
        assert_eq!(partial, DeletionState::idle());
    }
}
