//! Error types for action primitives

use cdp_adapter::{AdapterError, AdapterErrorKind};
use thiserror::Error;

/// Failure modes of a single UI action
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Navigation timed out waiting for page load
    #[error("Navigation timeout: {0}")]
    NavTimeout(String),

    /// Wait operation timed out
    #[error("Wait timeout: {0}")]
    WaitTimeout(String),

    /// Operation was cancelled or interrupted
    #[error("Operation interrupted: {0}")]
    Interrupted(String),

    /// Element handle no longer resolves in the page
    #[error("Anchor not found: {0}")]
    AnchorNotFound(String),

    /// The surface hosting the page is gone
    #[error("Surface closed: {0}")]
    SurfaceClosed(String),

    /// CDP communication or protocol error
    #[error("CDP I/O error: {0}")]
    CdpIo(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ActionError {
    /// Worth another attempt within the same cycle
    pub fn is_retryable(&self) -> bool {
        matches!(self, ActionError::WaitTimeout(_) | ActionError::CdpIo(_))
    }

    /// 0=low, 1=medium, 2=high, 3=critical
    pub fn severity(&self) -> u8 {
        match self {
            ActionError::Internal(_) | ActionError::SurfaceClosed(_) => 3,
            ActionError::NavTimeout(_) | ActionError::CdpIo(_) => 2,
            ActionError::WaitTimeout(_) | ActionError::AnchorNotFound(_) => 1,
            ActionError::Interrupted(_) => 0,
        }
    }

    pub fn is_surface_closed(&self) -> bool {
        matches!(self, ActionError::SurfaceClosed(_))
    }
}

impl From<AdapterError> for ActionError {
    fn from(err: AdapterError) -> Self {
        let message = err.to_string();
        match err.kind {
            AdapterErrorKind::TargetNotFound => ActionError::AnchorNotFound(message),
            AdapterErrorKind::NavTimeout => ActionError::NavTimeout(message),
            AdapterErrorKind::SurfaceClosed => ActionError::SurfaceClosed(message),
            AdapterErrorKind::CdpIo => ActionError::CdpIo(message),
            AdapterErrorKind::Internal => ActionError::Internal(message),
        }
    }
}
