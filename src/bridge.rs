//! In-page bridge: request/response calls into the worker page, correlated
//! by request id and bounded by a timeout.

use std::sync::Arc;
use std::time::Duration;

use action_flow::DeletionCycle;
use action_locator::ElementLocator;
use async_trait::async_trait;
use cdp_adapter::scripted::PROBE_PREFIX;
use cdp_adapter::PageDriver;
use dashmap::DashMap;
use dmsweep_core_types::RequestId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::worker::TotalEstimator;

pub const RESPONSE_TYPE: &str = "DMSWEEP_RESPONSE";
pub const INBOX_ENDPOINT: &str = "/api/v1/direct_v2/inbox/";
pub const IG_APP_ID: &str = "936619743392459";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("HTTP {0}")]
    Http(u16),
    #[error("Request timed out")]
    Timeout,
    #[error("{0}")]
    Remote(String),
    #[error("Malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BridgeAction {
    FetchInbox {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cursor: Option<String>,
    },
    DeleteTopChat,
    CountChats,
}

impl BridgeAction {
    pub fn name(&self) -> &'static str {
        match self {
            BridgeAction::FetchInbox { .. } => "fetch_inbox",
            BridgeAction::DeleteTopChat => "delete_top_chat",
            BridgeAction::CountChats => "count_chats",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeRequest {
    pub request_id: RequestId,
    #[serde(flatten)]
    pub action: BridgeAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub request_id: RequestId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

impl BridgeResponse {
    fn new(request_id: RequestId, success: bool) -> Self {
        Self {
            kind: RESPONSE_TYPE.to_string(),
            request_id,
            success,
            data: None,
            error: None,
            count: None,
        }
    }

    pub fn failure(request_id: RequestId, error: impl Into<String>) -> Self {
        let mut response = Self::new(request_id, false);
        response.error = Some(error.into());
        response
    }

    fn into_result(self) -> Result<Self, BridgeError> {
        if self.success {
            return Ok(self);
        }
        let error = self.error.unwrap_or_else(|| "unknown bridge error".to_string());
        match error.strip_prefix("HTTP ").and_then(|s| s.parse().ok()) {
            Some(status) => Err(BridgeError::Http(status)),
            None if error == BridgeError::Timeout.to_string() => Err(BridgeError::Timeout),
            None => Err(BridgeError::Remote(error)),
        }
    }
}

/// One page of the inbox listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboxPage {
    #[serde(default)]
    pub threads: Vec<Value>,
    #[serde(default)]
    pub oldest_cursor: Option<String>,
    #[serde(default)]
    pub has_older: bool,
}

impl InboxPage {
    /// Accepts either the raw endpoint body or its `inbox` object.
    pub fn from_body(body: &Value) -> Result<Self, BridgeError> {
        let inbox = body.get("inbox").unwrap_or(body);
        serde_json::from_value(inbox.clone()).map_err(|err| BridgeError::Malformed(err.to_string()))
    }
}

pub fn fetch_inbox_script(cursor: Option<&str>) -> String {
    let cursor = cursor
        .map(|c| Value::String(c.to_string()).to_string())
        .unwrap_or_else(|| "null".to_string());
    format!(
        r#"{PROBE_PREFIX}fetch-inbox
(async () => {{
  const cursor = {cursor};
  let url = '{INBOX_ENDPOINT}?persistentBadging=true&folder=&limit=20&thread_message_limit=1';
  if (cursor) url += '&cursor=' + encodeURIComponent(cursor);
  const csrf = (document.cookie.match(/csrftoken=([^;]+)/) || [])[1] || '';
  const claim = sessionStorage.getItem('www-claim-v2') || '0';
  const resp = await fetch(url, {{
    method: 'GET',
    headers: {{
      'x-csrftoken': csrf,
      'x-ig-app-id': '{IG_APP_ID}',
      'x-requested-with': 'XMLHttpRequest',
      'x-ig-www-claim': claim,
    }},
    credentials: 'include',
  }});
  if (!resp.ok) return {{ ok: false, status: resp.status }};
  return {{ ok: true, status: resp.status, body: await resp.json() }};
}})()"#
    )
}

/// Page side of the bridge.
pub struct BridgeHandler {
    driver: Arc<dyn PageDriver>,
    locator: Arc<dyn ElementLocator>,
    cycle: Arc<dyn DeletionCycle>,
}

impl BridgeHandler {
    pub fn new(
        driver: Arc<dyn PageDriver>,
        locator: Arc<dyn ElementLocator>,
        cycle: Arc<dyn DeletionCycle>,
    ) -> Self {
        Self {
            driver,
            locator,
            cycle,
        }
    }

    pub async fn handle(&self, request: BridgeRequest) -> BridgeResponse {
        let id = request.request_id;
        match request.action {
            BridgeAction::FetchInbox { cursor } => match self.fetch_inbox(cursor.as_deref()).await {
                Ok(data) => {
                    let mut response = BridgeResponse::new(id, true);
                    response.data = Some(data);
                    response
                }
                Err(err) => BridgeResponse::failure(id, err.to_string()),
            },
            BridgeAction::DeleteTopChat => {
                let outcome = self.cycle.delete_top_conversation().await;
                let mut response = BridgeResponse::new(id, outcome.success);
                response.error = outcome.reason();
                response
            }
            BridgeAction::CountChats => {
                let mut response = BridgeResponse::new(id, true);
                response.count = Some(self.locator.count_chats().await);
                response
            }
        }
    }

    async fn fetch_inbox(&self, cursor: Option<&str>) -> Result<Value, BridgeError> {
        let reply = self
            .driver
            .evaluate(&fetch_inbox_script(cursor))
            .await
            .map_err(|err| BridgeError::Remote(err.to_string()))?;
        if reply.get("ok").and_then(Value::as_bool) != Some(true) {
            let status = reply.get("status").and_then(Value::as_u64).unwrap_or(0);
            return Err(BridgeError::Http(status as u16));
        }
        reply
            .get("body")
            .cloned()
            .ok_or_else(|| BridgeError::Malformed("missing body".to_string()))
    }
}

type Pending = Arc<DashMap<RequestId, oneshot::Sender<BridgeResponse>>>;

/// Caller side of the bridge. Every request resolves or times out.
#[derive(Clone)]
pub struct BridgeClient {
    requests: mpsc::Sender<BridgeRequest>,
    pending: Pending,
    timeout: Duration,
}

impl BridgeClient {
    /// Spawn the page-side task and return a client bound to it.
    pub fn spawn(handler: Arc<BridgeHandler>, timeout: Duration) -> Self {
        let (tx, mut rx) = mpsc::channel::<BridgeRequest>(16);
        let pending: Pending = Arc::new(DashMap::new());
        let responses = pending.clone();
        let _server: JoinHandle<()> = tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let handler = handler.clone();
                let responses = responses.clone();
                tokio::spawn(async move {
                    let response = handler.handle(request).await;
                    match responses.remove(&response.request_id) {
                        Some((_, waiter)) => {
                            let _ = waiter.send(response);
                        }
                        None => debug!(request_id = %response.request_id, "late bridge response dropped"),
                    }
                });
            }
        });
        Self {
            requests: tx,
            pending,
            timeout,
        }
    }

    pub async fn request(&self, action: BridgeAction) -> BridgeResponse {
        let request_id = RequestId::new();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id.clone(), tx);
        debug!(request_id = %request_id, action = action.name(), "bridge request");

        let request = BridgeRequest {
            request_id: request_id.clone(),
            action,
        };
        if self.requests.send(request).await.is_err() {
            self.pending.remove(&request_id);
            return BridgeResponse::failure(request_id, "bridge closed");
        }
        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => BridgeResponse::failure(request_id, "bridge closed"),
            Err(_) => {
                self.pending.remove(&request_id);
                warn!(request_id = %request_id, "bridge request timed out");
                BridgeResponse::failure(request_id, BridgeError::Timeout.to_string())
            }
        }
    }

    pub async fn fetch_inbox(&self, cursor: Option<String>) -> Result<InboxPage, BridgeError> {
        let response = self
            .request(BridgeAction::FetchInbox { cursor })
            .await
            .into_result()?;
        let data = response
            .data
            .ok_or_else(|| BridgeError::Malformed("missing data".to_string()))?;
        InboxPage::from_body(&data)
    }

    pub async fn count_chats(&self) -> Result<u32, BridgeError> {
        let response = self.request(BridgeAction::CountChats).await.into_result()?;
        Ok(response.count.unwrap_or(0))
    }

    pub async fn delete_top_chat(&self) -> Result<(), BridgeError> {
        self.request(BridgeAction::DeleteTopChat)
            .await
            .into_result()
            .map(|_| ())
    }
}

/// Sums thread counts over a bounded number of inbox pages.
pub struct HybridTotalEstimator {
    client: BridgeClient,
    max_pages: u32,
}

impl HybridTotalEstimator {
    pub fn new(client: BridgeClient, max_pages: u32) -> Self {
        Self {
            client,
            max_pages: max_pages.max(1),
        }
    }
}

#[async_trait]
impl TotalEstimator for HybridTotalEstimator {
    async fn estimate_total(&self) -> Option<u32> {
        let mut total = 0u32;
        let mut cursor = None;
        for page_no in 0..self.max_pages {
            let page = match self.client.fetch_inbox(cursor.take()).await {
                Ok(page) => page,
                Err(err) => {
                    warn!(error = %err, page = page_no, "inbox listing failed");
                    return None;
                }
            };
            total = total.saturating_add(page.threads.len() as u32);
            if !page.has_older || page.oldest_cursor.is_none() {
                break;
            }
            cursor = page.oldest_cursor;
        }
        info!(total, "inbox listing total");
        Some(total)
    }
}
