//! Messages exchanged between the control surface, the coordinator and the worker.

use dmsweep_core_types::{DeletionStatus, Progress};
use serde::{Deserialize, Serialize};

/// Which hop a message travels on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    ControlToCoordinator,
    CoordinatorToWorker,
    WorkerToCoordinator,
}

/// Fire-and-forget message. The wire name is the `action` tag.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SurfaceMessage {
    StartDelete,
    StopDelete,
    ResumeDelete,
    CloseDelete,
    GetStatus,
    Pause,
    Resume,
    ProgressUpdate(Progress),
    DeletePaused(Progress),
    DeleteComplete(Progress),
}

impl SurfaceMessage {
    pub fn name(&self) -> &'static str {
        match self {
            SurfaceMessage::StartDelete => "start_delete",
            SurfaceMessage::StopDelete => "stop_delete",
            SurfaceMessage::ResumeDelete => "resume_delete",
            SurfaceMessage::CloseDelete => "close_delete",
            SurfaceMessage::GetStatus => "get_status",
            SurfaceMessage::Pause => "pause",
            SurfaceMessage::Resume => "resume",
            SurfaceMessage::ProgressUpdate(_) => "progress_update",
            SurfaceMessage::DeletePaused(_) => "delete_paused",
            SurfaceMessage::DeleteComplete(_) => "delete_complete",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            SurfaceMessage::StartDelete
            | SurfaceMessage::StopDelete
            | SurfaceMessage::ResumeDelete
            | SurfaceMessage::CloseDelete
            | SurfaceMessage::GetStatus => Direction::ControlToCoordinator,
            SurfaceMessage::Pause | SurfaceMessage::Resume => Direction::CoordinatorToWorker,
            SurfaceMessage::ProgressUpdate(_)
            | SurfaceMessage::DeletePaused(_)
            | SurfaceMessage::DeleteComplete(_) => Direction::WorkerToCoordinator,
        }
    }

    pub fn progress(&self) -> Option<&Progress> {
        match self {
            SurfaceMessage::ProgressUpdate(progress)
            | SurfaceMessage::DeletePaused(progress)
            | SurfaceMessage::DeleteComplete(progress) => Some(progress),
            _ => None,
        }
    }

    /// Persisted status implied by a worker event.
    pub fn implied_status(&self) -> Option<DeletionStatus> {
        match self {
            SurfaceMessage::ProgressUpdate(_) => Some(DeletionStatus::Running),
            SurfaceMessage::DeletePaused(_) => Some(DeletionStatus::Paused),
            SurfaceMessage::DeleteComplete(_) => Some(DeletionStatus::Done),
            _ => None,
        }
    }

    /// Build the worker event for a status/progress pair.
    pub fn from_worker(status: DeletionStatus, progress: Progress) -> Self {
        match status {
            DeletionStatus::Paused => SurfaceMessage::DeletePaused(progress),
            DeletionStatus::Done => SurfaceMessage::DeleteComplete(progress),
            _ => SurfaceMessage::ProgressUpdate(progress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_uses_action_tag() {
        let msg = SurfaceMessage::DeletePaused(Progress::new(2, 5, "Paused (2/5)"));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["action"], "delete_paused");
        assert_eq!(value["deleted"], 2);
        assert_eq!(value["statusText"], "Paused (2/5)");

        let parsed: SurfaceMessage =
            serde_json::from_str(r#"{"action":"resume_delete"}"#).unwrap();
        assert_eq!(parsed, SurfaceMessage::ResumeDelete);
        assert_eq!(parsed.name(), "resume_delete");
    }

    #[test]
    fn worker_events_map_to_statuses() {
        let progress = Progress::new(1, 1, "x");
        for status in [
            DeletionStatus::Running,
            DeletionStatus::Paused,
            DeletionStatus::Done,
        ] {
            let msg = SurfaceMessage::from_worker(status, progress.clone());
            assert_eq!(msg.direction(), Direction::WorkerToCoordinator);
            assert_eq!(msg.implied_status(), Some(status));
        }
        assert_eq!(SurfaceMessage::Pause.direction(), Direction::CoordinatorToWorker);
        assert!(SurfaceMessage::GetStatus.progress().is_none());
    }
}
