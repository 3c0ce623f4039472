//! Cycle executor implementation

use crate::errors::CycleFailure;
use crate::strategies::{recovery_for, DefaultRecoveryHandler, RecoveryHandler};
use crate::types::*;
use action_locator::{ElementLocator, LocatorTarget, Resolution};
use action_primitives::{ActionPrimitives, ExecCtx, Settle};
use async_trait::async_trait;
use std::sync::Arc;
use stealth::DelayKey;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Deletes whatever conversation is currently on top of the list
#[async_trait]
pub trait DeletionCycle: Send + Sync {
    async fn delete_top_conversation(&self) -> CycleOutcome;
}

/// Cycle over a locator and the action primitives
pub struct DefaultDeletionCycle {
    locator: Arc<dyn ElementLocator>,
    primitives: Arc<dyn ActionPrimitives>,
    recovery: Arc<dyn RecoveryHandler>,
    config: CycleConfig,
    cancel: CancellationToken,
}

impl DefaultDeletionCycle {
    pub fn new(
        locator: Arc<dyn ElementLocator>,
        primitives: Arc<dyn ActionPrimitives>,
        config: CycleConfig,
    ) -> Self {
        let recovery = Arc::new(DefaultRecoveryHandler::new(
            locator.clone(),
            primitives.clone(),
            config,
        ));
        Self {
            locator,
            primitives,
            recovery,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight actions once `token` fires
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    fn build_exec_ctx(&self) -> ExecCtx {
        ExecCtx::new(self.config.action_timeout(), self.cancel.child_token())
    }

    async fn click(&self, step: CycleStep, target: &Resolution, settle: Settle) -> Result<(), CycleFailure> {
        let report = self
            .primitives
            .click(&self.build_exec_ctx(), &target.handle, settle)
            .await;
        if report.ok {
            debug!(step = step.name(), strategy = target.strategy, latency_ms = report.latency_ms, "Step done");
            return Ok(());
        }
        if report.surface_closed() {
            return Err(CycleFailure::SurfaceClosed { step });
        }
        Err(CycleFailure::ActionFailed {
            step,
            reason: report.reason().unwrap_or_else(|| "unknown".to_string()),
        })
    }

    async fn run(&self) -> Result<(), CycleFailure> {
        let paced = Settle::Paced(DelayKey::ClickDelay);

        let row = self
            .locator
            .locate(LocatorTarget::TopConversation)
            .await
            .ok_or(CycleFailure::NoConversation)?;
        self.click(CycleStep::OpenConversation, &row, paced).await?;

        let info = self
            .locator
            .locate(LocatorTarget::InfoControl)
            .await
            .ok_or(CycleFailure::InfoControlNotFound)?;
        self.click(CycleStep::OpenInfo, &info, paced).await?;

        let delete = self
            .locator
            .await_target(LocatorTarget::DeleteControl, self.config.delete_poll())
            .await
            .ok_or(CycleFailure::DeleteControlNotFound)?;
        self.click(CycleStep::ClickDelete, &delete, paced).await?;

        let confirm = self
            .locator
            .await_target(LocatorTarget::ConfirmControl, self.config.confirm_poll())
            .await
            .ok_or(CycleFailure::ConfirmControlNotFound)?;
        self.click(CycleStep::ClickConfirm, &confirm, paced).await
    }
}

#[async_trait]
impl DeletionCycle for DefaultDeletionCycle {
    async fn delete_top_conversation(&self) -> CycleOutcome {
        match self.run().await {
            Ok(()) => {
                info!("Conversation deleted");
                CycleOutcome::deleted()
            }
            Err(failure) => {
                warn!(
                    step = failure.step().name(),
                    reason = %failure,
                    severity = failure.severity(),
                    "Cycle failed"
                );
                if !failure.is_surface_closed() {
                    let recovery = recovery_for(failure.step());
                    if !self.recovery.recover(&self.build_exec_ctx(), recovery).await {
                        warn!(?recovery, "Recovery did not complete");
                    }
                }
                CycleOutcome::failed(failure)
            }
        }
    }
}
