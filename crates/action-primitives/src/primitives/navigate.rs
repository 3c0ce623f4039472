//! Navigate primitive - load a URL or step back in history

use crate::{errors::ActionError, primitives::DefaultActionPrimitives, types::ExecCtx};
use cdp_adapter::scripted::PROBE_PREFIX;
use tracing::info;

/// Navigate the surface to `url`.
pub async fn execute_navigate(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    url: &str,
) -> Result<(), ActionError> {
    info!(action_id = %ctx.action_id, url = %url, "Executing navigate primitive");

    if url.is_empty() {
        return Err(ActionError::Internal("URL cannot be empty".to_string()));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") && !url.starts_with("about:") {
        return Err(ActionError::Internal(format!("Invalid URL scheme: {}", url)));
    }

    ctx.bound(async {
        primitives.driver().navigate(url).await?;
        Ok::<_, ActionError>(())
    })
    .await
}

/// Step back one history entry.
pub async fn execute_history_back(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
) -> Result<(), ActionError> {
    info!(action_id = %ctx.action_id, "Executing history back");
    let script = format!("{PROBE_PREFIX}history-back\n(() => {{ history.back(); return true; }})()");
    ctx.bound(async {
        primitives.driver().evaluate(&script).await?;
        Ok::<_, ActionError>(())
    })
    .await
}
