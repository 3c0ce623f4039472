//! Click primitive - trusted click with a script fallback

use crate::{errors::ActionError, primitives::DefaultActionPrimitives, types::{ElementHandle, ExecCtx}};
use cdp_adapter::scripted::PROBE_PREFIX;
use tracing::{debug, info, warn};

/// Execute click primitive
///
/// Steps:
/// 1. Check context; the driver calls below stay bounded by it
/// 2. Dispatch a trusted mouse click on the handle's selector
/// 3. If the element exists but the mouse click could not land, call the
///    element's own `click()` instead
pub async fn execute_click(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    target: &ElementHandle,
) -> Result<(), ActionError> {
    info!(
        action_id = %ctx.action_id,
        target = %target,
        "Executing click primitive"
    );

    if target.selector.trim().is_empty() {
        return Err(ActionError::AnchorNotFound(format!(
            "empty selector for {}",
            target.description
        )));
    }

    ctx.bound(async {
        match primitives.driver().click(&target.selector).await {
            Ok(()) => {
                debug!(action_id = %ctx.action_id, "trusted click dispatched");
                Ok(())
            }
            Err(err) if err.is_surface_closed() => Err(err.into()),
            Err(err) => {
                warn!(
                    action_id = %ctx.action_id,
                    error = %err,
                    "trusted click failed; falling back to script click"
                );
                script_click(primitives, &target.selector).await
            }
        }
    })
    .await
}

async fn script_click(
    primitives: &DefaultActionPrimitives,
    selector: &str,
) -> Result<(), ActionError> {
    let value = primitives
        .driver()
        .evaluate(&script_click_expression(selector))
        .await?;
    if value.as_bool().unwrap_or(false) {
        Ok(())
    } else {
        Err(ActionError::AnchorNotFound(format!(
            "no element matches {selector}"
        )))
    }
}

pub(crate) fn script_click_expression(selector: &str) -> String {
    let selector = serde_json::Value::String(selector.to_string()).to_string();
    format!(
        "{PROBE_PREFIX}click\n(() => {{ const el = document.querySelector({selector}); if (!el) return false; el.click(); return true; }})()"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_click_escapes_selector() {
        let script = script_click_expression(r#"[data-x="a"]"#);
        assert!(script.starts_with("// probe:click"));
        assert!(script.contains(r#"document.querySelector("[data-x=\"a\"]")"#));
    }
}
