//! Core types for the locator

use action_primitives::ElementHandle;
use serde::{Deserialize, Serialize};

/// Semantic targets the deletion cycle asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorTarget {
    TopConversation,
    InfoControl,
    DeleteControl,
    ConfirmControl,
    BackControl,
}

impl LocatorTarget {
    pub fn name(&self) -> &'static str {
        match self {
            LocatorTarget::TopConversation => "top conversation",
            LocatorTarget::InfoControl => "info control",
            LocatorTarget::DeleteControl => "delete control",
            LocatorTarget::ConfirmControl => "confirm control",
            LocatorTarget::BackControl => "back control",
        }
    }
}

/// Info control strategies, tried in [`InfoStrategy::fallback_chain`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoStrategy {
    /// Accessible label, exact then substring
    AriaLabel,
    /// Last icon control inside the header
    HeaderIcon,
    /// Rightmost icon control inside the top band
    TopBandIcon,
}

impl InfoStrategy {
    pub fn fallback_chain() -> &'static [InfoStrategy] {
        &[
            InfoStrategy::AriaLabel,
            InfoStrategy::HeaderIcon,
            InfoStrategy::TopBandIcon,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            InfoStrategy::AriaLabel => "aria-label",
            InfoStrategy::HeaderIcon => "header-icon",
            InfoStrategy::TopBandIcon => "top-band-icon",
        }
    }
}

/// What a probe observed about one element. Missing fields read as false/zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CandidateMetadata {
    pub visible: bool,
    pub in_dialog: bool,
    pub has_avatar: bool,
    pub has_time_marker: bool,
    pub top: f64,
    pub right: f64,
    pub text: String,
    pub label: String,
    /// Index into the probed label list, for label-driven probes.
    pub label_index: Option<usize>,
    pub exact: bool,
}

/// One stamped element reported by a probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub token: String,
    #[serde(flatten)]
    pub metadata: CandidateMetadata,
}

impl Candidate {
    pub fn new(token: impl Into<String>, metadata: CandidateMetadata) -> Self {
        Self {
            token: token.into(),
            metadata,
        }
    }

    /// Selector addressing the stamped element.
    pub fn selector(&self) -> String {
        format!("[{}=\"{}\"]", crate::probe::PROBE_ATTRIBUTE, self.token)
    }
}

/// A resolved element plus the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub target: LocatorTarget,
    pub handle: ElementHandle,
    pub strategy: &'static str,
}

impl Resolution {
    pub fn from_candidate(target: LocatorTarget, candidate: &Candidate, strategy: &'static str) -> Self {
        Self {
            target,
            handle: ElementHandle::new(candidate.selector(), target.name()),
            strategy,
        }
    }
}
