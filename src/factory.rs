//! Builds the worker stack for a freshly opened surface.

use std::sync::Arc;

use action_flow::DefaultDeletionCycle;
use action_locator::{DomElementLocator, ElementLocator, LabelTable};
use action_primitives::{ActionPrimitives, DefaultActionPrimitives};
use async_trait::async_trait;
use cdp_adapter::Surface;
use dmsweep_state_center::PersistedState;
use stealth::{Pacer, PacingPolicy, ProfileCatalog, SpeedProfileName};
use tracing::{info, warn};

use crate::bridge::{BridgeClient, BridgeHandler, HybridTotalEstimator};
use crate::config::Config;
use crate::worker::{WorkerContext, WorkerLoop, WorkerParts};

#[async_trait]
pub trait WorkerFactory: Send + Sync {
    async fn build(&self, surface: Arc<dyn Surface>, ctx: WorkerContext) -> WorkerLoop;
}

/// Resolve the persisted speed preference; unset or unknown means `normal`.
pub async fn load_policy(state: &PersistedState, catalog: &ProfileCatalog) -> PacingPolicy {
    let raw = match state.speed_profile().await {
        Ok(raw) => raw,
        Err(err) => {
            warn!(error = %err, "reading speed preference failed");
            None
        }
    };
    let name = SpeedProfileName::parse_or_default(raw.as_deref());
    info!(profile = %name, "Speed profile loaded");
    PacingPolicy::new(catalog.resolve(name))
}

/// Real stack: DOM locator, CDP-backed primitives, the default cycle.
pub struct DefaultWorkerFactory {
    config: Config,
    labels: Arc<LabelTable>,
    catalog: ProfileCatalog,
    pacer: Arc<dyn Pacer>,
}

impl DefaultWorkerFactory {
    pub fn new(
        config: Config,
        labels: Arc<LabelTable>,
        catalog: ProfileCatalog,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        Self {
            config,
            labels,
            catalog,
            pacer,
        }
    }
}

#[async_trait]
impl WorkerFactory for DefaultWorkerFactory {
    async fn build(&self, surface: Arc<dyn Surface>, ctx: WorkerContext) -> WorkerLoop {
        let driver = surface.driver();
        let policy = Arc::new(load_policy(&ctx.state, &self.catalog).await);
        let locator: Arc<dyn ElementLocator> = Arc::new(DomElementLocator::new(
            driver.clone(),
            self.labels.clone(),
            self.pacer.clone(),
        ));
        let primitives: Arc<dyn ActionPrimitives> = Arc::new(DefaultActionPrimitives::new(
            driver.clone(),
            policy.clone(),
            self.pacer.clone(),
        ));
        let cycle = Arc::new(
            DefaultDeletionCycle::new(locator.clone(), primitives.clone(), self.config.worker.cycle)
                .with_cancel_token(ctx.closed.clone()),
        );

        let parts = WorkerParts {
            locator: locator.clone(),
            cycle: cycle.clone(),
            primitives,
            policy,
            pacer: self.pacer.clone(),
        };
        let worker = WorkerLoop::new(parts, ctx, self.config.worker.clone());
        if !self.config.bridge.hybrid_total {
            return worker;
        }

        let handler = Arc::new(BridgeHandler::new(driver, locator, cycle));
        let client = BridgeClient::spawn(handler, self.config.bridge.request_timeout());
        worker.with_total_estimator(Arc::new(HybridTotalEstimator::new(
            client,
            self.config.bridge.max_inbox_pages,
        )))
    }
}
