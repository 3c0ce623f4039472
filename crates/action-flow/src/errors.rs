//! Cycle failure types

use crate::types::CycleStep;
use thiserror::Error;

/// Why a cycle did not delete anything
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleFailure {
    #[error("no conversation found")]
    NoConversation,

    #[error("info control not found")]
    InfoControlNotFound,

    #[error("delete control not found")]
    DeleteControlNotFound,

    #[error("confirm control not found")]
    ConfirmControlNotFound,

    /// A click on a resolved element did not go through
    #[error("{} failed: {reason}", .step.name())]
    ActionFailed { step: CycleStep, reason: String },

    /// The worker surface is gone
    #[error("surface closed during {}", .step.name())]
    SurfaceClosed { step: CycleStep },
}

impl CycleFailure {
    /// Step at which the cycle stopped
    pub fn step(&self) -> CycleStep {
        match self {
            CycleFailure::NoConversation => CycleStep::LocateConversation,
            CycleFailure::InfoControlNotFound => CycleStep::LocateInfo,
            CycleFailure::DeleteControlNotFound => CycleStep::LocateDelete,
            CycleFailure::ConfirmControlNotFound => CycleStep::LocateConfirm,
            CycleFailure::ActionFailed { step, .. } | CycleFailure::SurfaceClosed { step } => *step,
        }
    }

    pub fn is_surface_closed(&self) -> bool {
        matches!(self, CycleFailure::SurfaceClosed { .. })
    }

    /// 0=low, 1=medium, 2=high, 3=critical
    pub fn severity(&self) -> u8 {
        match self {
            CycleFailure::SurfaceClosed { .. } => 3,
            CycleFailure::ActionFailed { .. } => 2,
            CycleFailure::NoConversation => 0,
            _ => 1,
        }
    }
}
