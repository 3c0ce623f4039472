//! Error types for locator system

use thiserror::Error;

/// Locator error enumeration
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// Element not found with any strategy
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Probe returned something that is not the expected shape
    #[error("Malformed probe result from '{probe}': {reason}")]
    MalformedProbe { probe: String, reason: String },

    /// CDP communication error
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Surface went away mid-probe
    #[error("Surface closed: {0}")]
    SurfaceClosed(String),

    /// Label table could not be loaded
    #[error("Label table error: {0}")]
    LabelTable(String),
}

impl LocatorError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LocatorError::CdpError(_) | LocatorError::MalformedProbe { .. }
        )
    }

    /// 0=low, 1=medium, 2=high, 3=critical
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::SurfaceClosed(_) => 3,
            LocatorError::CdpError(_) | LocatorError::LabelTable(_) => 2,
            LocatorError::ElementNotFound(_) | LocatorError::MalformedProbe { .. } => 1,
        }
    }
}

impl From<cdp_adapter::AdapterError> for LocatorError {
    fn from(err: cdp_adapter::AdapterError) -> Self {
        if err.is_surface_closed() {
            LocatorError::SurfaceClosed(err.to_string())
        } else {
            LocatorError::CdpError(err.to_string())
        }
    }
}
