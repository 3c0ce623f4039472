//! Seams between the engine and a browser page.

use std::sync::Arc;

use async_trait::async_trait;
use dmsweep_core_types::SurfaceId;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::AdapterError;

/// Minimal page operations the engine needs. Everything DOM-specific is
/// expressed as a script handed to [`PageDriver::evaluate`].
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Evaluate an expression in the page, awaiting promises, returning the value by JSON.
    async fn evaluate(&self, expression: &str) -> Result<Value, AdapterError>;
    async fn navigate(&self, url: &str) -> Result<(), AdapterError>;
    async fn current_url(&self) -> Result<String, AdapterError>;
    /// Dispatch a trusted mouse click on the first element matching `selector`.
    async fn click(&self, selector: &str) -> Result<(), AdapterError>;
}

/// A browser window hosting one page.
#[async_trait]
pub trait Surface: Send + Sync {
    fn id(&self) -> &SurfaceId;
    fn driver(&self) -> Arc<dyn PageDriver>;
    /// Cancelled once the window is gone, whoever closed it.
    fn closed_token(&self) -> CancellationToken;
    async fn close(&self) -> Result<(), AdapterError>;

    fn is_closed(&self) -> bool {
        self.closed_token().is_cancelled()
    }
}

/// Opens surfaces. The coordinator owns exactly one host.
#[async_trait]
pub trait SurfaceHost: Send + Sync {
    async fn open_surface(&self, url: &str) -> Result<Arc<dyn Surface>, AdapterError>;
    async fn shutdown(&self);
}
