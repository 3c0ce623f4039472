//! Escape primitive - dismiss the open dialog

use crate::{errors::ActionError, primitives::DefaultActionPrimitives, types::ExecCtx};
use cdp_adapter::scripted::PROBE_PREFIX;
use tracing::info;

pub async fn execute_escape(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
) -> Result<(), ActionError> {
    info!(action_id = %ctx.action_id, "Executing escape primitive");
    ctx.bound(async {
        primitives.driver().evaluate(&escape_expression()).await?;
        Ok::<_, ActionError>(())
    })
    .await
}

pub(crate) fn escape_expression() -> String {
    format!(
        "{PROBE_PREFIX}escape\n(() => {{ \
         const init = {{ key: 'Escape', code: 'Escape', keyCode: 27, which: 27, bubbles: true }}; \
         const target = document.activeElement || document.body || document; \
         target.dispatchEvent(new KeyboardEvent('keydown', init)); \
         document.dispatchEvent(new KeyboardEvent('keydown', init)); \
         return true; }})()"
    )
}
