//! Failure recovery

use crate::types::{CycleConfig, CycleStep, Recovery};
use action_locator::{ElementLocator, LocatorTarget};
use action_primitives::{ActionPrimitives, ExecCtx, Settle};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which cleanup a failure at `step` needs
pub fn recovery_for(step: CycleStep) -> Recovery {
    match step {
        CycleStep::LocateConversation | CycleStep::OpenConversation => Recovery::None,
        CycleStep::LocateInfo
        | CycleStep::OpenInfo
        | CycleStep::LocateDelete
        | CycleStep::ClickDelete => Recovery::NavigateBack,
        CycleStep::LocateConfirm | CycleStep::ClickConfirm => Recovery::DismissDialog,
    }
}

/// Recovery handler trait
#[async_trait]
pub trait RecoveryHandler: Send + Sync {
    /// Run the recovery; returns whether the page accepted it.
    async fn recover(&self, ctx: &ExecCtx, recovery: Recovery) -> bool;
}

/// Back control first, history second; Escape for dialogs.
pub struct DefaultRecoveryHandler {
    locator: Arc<dyn ElementLocator>,
    primitives: Arc<dyn ActionPrimitives>,
    config: CycleConfig,
}

impl DefaultRecoveryHandler {
    pub fn new(
        locator: Arc<dyn ElementLocator>,
        primitives: Arc<dyn ActionPrimitives>,
        config: CycleConfig,
    ) -> Self {
        Self {
            locator,
            primitives,
            config,
        }
    }

    async fn navigate_back(&self, ctx: &ExecCtx) -> bool {
        let settle = Settle::Range(self.config.back_settle);
        if let Some(back) = self.locator.locate(LocatorTarget::BackControl).await {
            let report = self.primitives.click(ctx, &back.handle, settle).await;
            if report.ok {
                debug!("Returned through back control");
                return true;
            }
            if report.surface_closed() {
                return false;
            }
        }
        let report = self.primitives.navigate_back(ctx, settle).await;
        if !report.ok {
            warn!(reason = ?report.reason(), "History back failed");
        }
        report.ok
    }
}

#[async_trait]
impl RecoveryHandler for DefaultRecoveryHandler {
    async fn recover(&self, ctx: &ExecCtx, recovery: Recovery) -> bool {
        match recovery {
            Recovery::None => true,
            Recovery::NavigateBack => {
                info!("Recovering: navigate back");
                self.navigate_back(ctx).await
            }
            Recovery::DismissDialog => {
                info!("Recovering: dismiss dialog");
                let report = self
                    .primitives
                    .press_escape(ctx, Settle::Range(self.config.escape_settle))
                    .await;
                report.ok
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovery_matches_what_is_open() {
        assert_eq!(recovery_for(CycleStep::LocateConversation), Recovery::None);
        assert_eq!(recovery_for(CycleStep::LocateInfo), Recovery::NavigateBack);
        assert_eq!(recovery_for(CycleStep::LocateDelete), Recovery::NavigateBack);
        assert_eq!(recovery_for(CycleStep::LocateConfirm), Recovery::DismissDialog);
    }
}
