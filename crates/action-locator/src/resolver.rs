//! Element locator with fallback chain orchestration

use crate::{errors::LocatorError, labels::LabelTable, probe, strategies::*, types::*};
use action_primitives::{await_condition, PollConfig};
use async_trait::async_trait;
use cdp_adapter::PageDriver;
use serde_json::Value;
use std::sync::Arc;
use stealth::Pacer;
use tracing::{debug, info, warn};

/// Element locator trait. Lookups never fail; a miss is `None` or zero.
#[async_trait]
pub trait ElementLocator: Send + Sync {
    /// Resolve a target once, walking its fallback chain.
    async fn locate(&self, target: LocatorTarget) -> Option<Resolution>;

    /// Resolve a target with a bounded poll.
    async fn await_target(&self, target: LocatorTarget, poll: PollConfig) -> Option<Resolution>;

    /// Rendered conversation rows outside any dialog.
    async fn count_conversations(&self) -> u32;

    /// Whether the page shows one of the empty-inbox placeholders.
    async fn is_inbox_empty(&self) -> bool;

    /// Visible chats, by thread links first and list rows second.
    async fn count_chats(&self) -> u32;
}

/// Locator backed by in-page probes.
pub struct DomElementLocator {
    driver: Arc<dyn PageDriver>,
    labels: Arc<LabelTable>,
    pacer: Arc<dyn Pacer>,
}

impl DomElementLocator {
    pub fn new(driver: Arc<dyn PageDriver>, labels: Arc<LabelTable>, pacer: Arc<dyn Pacer>) -> Self {
        Self {
            driver,
            labels,
            pacer,
        }
    }

    fn nonce() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    async fn probe(&self, name: &str, script: &str) -> Result<Vec<Candidate>, LocatorError> {
        match self.driver.evaluate(script).await? {
            Value::Null => Ok(Vec::new()),
            value => serde_json::from_value(value).map_err(|err| LocatorError::MalformedProbe {
                probe: name.to_string(),
                reason: err.to_string(),
            }),
        }
    }

    async fn probe_number(&self, script: &str) -> Result<u32, LocatorError> {
        let value = self.driver.evaluate(script).await?;
        Ok(value.as_u64().unwrap_or(0).min(u32::MAX as u64) as u32)
    }

    async fn info_candidates(&self, strategy: InfoStrategy) -> Result<Vec<Candidate>, LocatorError> {
        let nonce = Self::nonce();
        match strategy {
            InfoStrategy::AriaLabel => {
                self.probe(probe::INFO_LABELS, &probe::info_labels(&nonce, &self.labels.info))
                    .await
            }
            InfoStrategy::HeaderIcon => {
                self.probe(probe::HEADER_ICONS, &probe::header_icons(&nonce)).await
            }
            InfoStrategy::TopBandIcon => {
                self.probe(probe::ICON_CONTROLS, &probe::icon_controls(&nonce)).await
            }
        }
    }

    /// Resolve a target, surfacing probe failures.
    pub async fn try_locate(&self, target: LocatorTarget) -> Result<Resolution, LocatorError> {
        let nonce = Self::nonce();
        let found = match target {
            LocatorTarget::TopConversation => {
                let rows = self.probe(probe::ROWS, &probe::rows(&nonce)).await?;
                select_top_row(&rows).map(|c| Resolution::from_candidate(target, c, "row-scan"))
            }
            LocatorTarget::InfoControl => {
                let mut resolved = None;
                for strategy in InfoStrategy::fallback_chain() {
                    let candidates = self.info_candidates(*strategy).await?;
                    if let Some(candidate) = select_info(*strategy, &candidates) {
                        resolved = Some(Resolution::from_candidate(target, candidate, strategy.name()));
                        break;
                    }
                    debug!(strategy = strategy.name(), candidates = candidates.len(), "info strategy missed");
                }
                resolved
            }
            LocatorTarget::DeleteControl => {
                let candidates = self
                    .probe(probe::TEXT_CONTROLS, &probe::text_controls(&nonce, &self.labels.delete))
                    .await?;
                select_text_match(&candidates, &self.labels)
                    .map(|c| Resolution::from_candidate(target, c, "exact-text"))
            }
            LocatorTarget::ConfirmControl => {
                let candidates = self
                    .probe(probe::DIALOG_BUTTONS, &probe::dialog_buttons(&nonce))
                    .await?;
                select_confirm(&candidates, &self.labels)
                    .map(|c| Resolution::from_candidate(target, c, "dialog-button"))
            }
            LocatorTarget::BackControl => {
                let candidates = self
                    .probe(probe::BACK_CONTROLS, &probe::back_controls(&nonce, &self.labels.back))
                    .await?;
                select_back(&candidates).map(|c| Resolution::from_candidate(target, c, "back-label"))
            }
        };
        found.ok_or_else(|| LocatorError::ElementNotFound(target.name().to_string()))
    }
}

#[async_trait]
impl ElementLocator for DomElementLocator {
    async fn locate(&self, target: LocatorTarget) -> Option<Resolution> {
        match self.try_locate(target).await {
            Ok(resolution) => {
                info!(target = target.name(), strategy = resolution.strategy, "Element resolved");
                Some(resolution)
            }
            Err(LocatorError::ElementNotFound(_)) => {
                debug!(target = target.name(), "Element not found");
                None
            }
            Err(err) => {
                warn!(
                    target = target.name(),
                    error = %err,
                    severity = err.severity(),
                    retryable = err.is_retryable(),
                    "Locator probe failed"
                );
                None
            }
        }
    }

    async fn await_target(&self, target: LocatorTarget, poll: PollConfig) -> Option<Resolution> {
        await_condition(self.pacer.as_ref(), poll, || self.locate(target)).await
    }

    async fn count_conversations(&self) -> u32 {
        match self.probe(probe::ROWS, &probe::rows(&Self::nonce())).await {
            Ok(rows) => count_rows(&rows),
            Err(err) => {
                warn!(error = %err, "Row count failed");
                0
            }
        }
    }

    async fn is_inbox_empty(&self) -> bool {
        match self.driver.evaluate(&probe::empty_inbox(&self.labels.empty_inbox)).await {
            Ok(value) => value.as_bool().unwrap_or(false),
            Err(err) => {
                warn!(error = %err, "Empty-inbox probe failed");
                false
            }
        }
    }

    async fn count_chats(&self) -> u32 {
        match self.probe_number(&probe::thread_links()).await {
            Ok(links) if links > 0 => return links,
            Ok(_) => {}
            Err(err) => warn!(error = %err, "Thread link count failed"),
        }
        match self.probe_number(&probe::role_rows()).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "Row fallback count failed");
                0
            }
        }
    }
}
