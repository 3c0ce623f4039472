//! In-page probe scripts.
//!
//! A probe only observes: it stamps every candidate with a
//! `data-dmsweep-probe` token and reports plain metadata. The choice between
//! candidates is made by [`crate::strategies`].

use cdp_adapter::scripted::PROBE_PREFIX;
use serde_json::Value;

pub const PROBE_ATTRIBUTE: &str = "data-dmsweep-probe";

pub const ROWS: &str = "rows";
pub const INFO_LABELS: &str = "info-labels";
pub const HEADER_ICONS: &str = "header-icons";
pub const ICON_CONTROLS: &str = "icon-controls";
pub const TEXT_CONTROLS: &str = "text-controls";
pub const DIALOG_BUTTONS: &str = "dialog-buttons";
pub const BACK_CONTROLS: &str = "back-controls";
pub const THREAD_LINKS: &str = "thread-links";
pub const ROLE_ROWS: &str = "role-rows";
pub const EMPTY_INBOX: &str = "empty-inbox";

const PRELUDE: &str = r#"
const ATTR = 'data-dmsweep-probe';
document.querySelectorAll('[' + ATTR + ']').forEach((el) => el.removeAttribute(ATTR));
const visible = (el) => !!el && (el.offsetParent !== null || el.getClientRects().length > 0);
const inDialog = (el) => !!el.closest('div[role="dialog"]');
const clickable = (el) => el.closest('[role="button"]') || el.closest('button');
const out = [];
const stamp = (el, meta) => {
  let token = el.getAttribute(ATTR);
  if (!token) {
    token = NONCE + '-' + out.length;
    el.setAttribute(ATTR, token);
  }
  out.push(Object.assign({ token }, meta));
};
"#;

const ROWS_BODY: &str = r#"
document.querySelectorAll('div[role="button"][tabindex="0"]').forEach((row) => {
  stamp(row, {
    visible: row.offsetParent !== null,
    inDialog: inDialog(row),
    hasAvatar: !!row.querySelector('img[width="56"], img[height="56"], canvas'),
    hasTimeMarker: !!row.querySelector('time, abbr'),
  });
});
"#;

const INFO_LABELS_BODY: &str = r#"
const labelled = Array.from(document.querySelectorAll('svg[aria-label]'));
LABELS.forEach((label, labelIndex) => {
  let exact = true;
  let svg = labelled.find((s) => s.getAttribute('aria-label') === label);
  if (!svg) {
    exact = false;
    svg = labelled.find((s) => (s.getAttribute('aria-label') || '').includes(label));
  }
  if (!svg) return;
  const control = clickable(svg) || svg.parentElement;
  if (!control) return;
  stamp(control, { visible: visible(control), label, labelIndex, exact });
});
"#;

const HEADER_ICONS_BODY: &str = r#"
const header = document.querySelector('header') || document.querySelector('[role="banner"]');
if (header) {
  header.querySelectorAll('[role="button"] svg, button svg').forEach((svg) => {
    const control = clickable(svg);
    if (control) stamp(control, { visible: visible(control) });
  });
}
"#;

const ICON_CONTROLS_BODY: &str = r#"
document.querySelectorAll('[role="button"] svg, button svg').forEach((svg) => {
  const control = clickable(svg);
  if (!control) return;
  const rect = control.getBoundingClientRect();
  stamp(control, { visible: visible(control), top: rect.top, right: rect.right });
});
"#;

const TEXT_CONTROLS_BODY: &str = r#"
document
  .querySelectorAll('span, button, div[role="button"], div[role="listitem"], div[role="menuitem"]')
  .forEach((el) => {
    const text = (el.textContent || '').trim();
    if (!LABELS.includes(text)) return;
    const target =
      el.closest('[role="button"]') ||
      el.closest('[role="menuitem"]') ||
      el.closest('[role="listitem"]') ||
      el;
    stamp(target, { visible: visible(el), text, exact: true });
  });
"#;

const DIALOG_BUTTONS_BODY: &str = r#"
const dialog = document.querySelector('div[role="dialog"]');
if (dialog) {
  dialog.querySelectorAll('button').forEach((button) => {
    stamp(button, { visible: visible(button), inDialog: true, text: (button.textContent || '').trim() });
  });
}
"#;

const BACK_CONTROLS_BODY: &str = r#"
LABELS.forEach((label, labelIndex) => {
  document.querySelectorAll('svg[aria-label]').forEach((svg) => {
    if (svg.getAttribute('aria-label') !== label) return;
    const control = clickable(svg);
    if (control) stamp(control, { visible: visible(control), label, labelIndex, exact: true });
  });
});
"#;

fn stamped(name: &str, nonce: &str, labels: Option<&[String]>, body: &str) -> String {
    let nonce = Value::String(nonce.to_string());
    let labels = labels
        .map(labels_literal)
        .unwrap_or_else(|| "[]".to_string());
    format!(
        "{PROBE_PREFIX}{name}\n(() => {{\nconst NONCE = {nonce};\nconst LABELS = {labels};\n{PRELUDE}{body}\nreturn out;\n}})()"
    )
}

fn labels_literal(labels: &[String]) -> String {
    Value::Array(labels.iter().cloned().map(Value::String).collect()).to_string()
}

pub fn rows(nonce: &str) -> String {
    stamped(ROWS, nonce, None, ROWS_BODY)
}

pub fn info_labels(nonce: &str, labels: &[String]) -> String {
    stamped(INFO_LABELS, nonce, Some(labels), INFO_LABELS_BODY)
}

pub fn header_icons(nonce: &str) -> String {
    stamped(HEADER_ICONS, nonce, None, HEADER_ICONS_BODY)
}

pub fn icon_controls(nonce: &str) -> String {
    stamped(ICON_CONTROLS, nonce, None, ICON_CONTROLS_BODY)
}

pub fn text_controls(nonce: &str, labels: &[String]) -> String {
    stamped(TEXT_CONTROLS, nonce, Some(labels), TEXT_CONTROLS_BODY)
}

pub fn dialog_buttons(nonce: &str) -> String {
    stamped(DIALOG_BUTTONS, nonce, None, DIALOG_BUTTONS_BODY)
}

pub fn back_controls(nonce: &str, labels: &[String]) -> String {
    stamped(BACK_CONTROLS, nonce, Some(labels), BACK_CONTROLS_BODY)
}

/// Number of visible thread links outside any dialog.
pub fn thread_links() -> String {
    format!(
        "{PROBE_PREFIX}{THREAD_LINKS}\n(() => Array.from(document.querySelectorAll('a[href*=\"/direct/t/\"]'))\
         .filter((a) => (a.offsetParent !== null || a.getClientRects().length > 0) && !a.closest('div[role=\"dialog\"]'))\
         .length)()"
    )
}

/// Number of visible list-like rows carrying an image or canvas.
pub fn role_rows() -> String {
    format!(
        "{PROBE_PREFIX}{ROLE_ROWS}\n(() => Array.from(document.querySelectorAll('[role=\"listitem\"], [role=\"option\"], [role=\"row\"], [role=\"button\"][tabindex=\"0\"]'))\
         .filter((el) => el.offsetParent !== null && !el.closest('div[role=\"dialog\"]') && !!el.querySelector('img, canvas'))\
         .length)()"
    )
}

pub fn empty_inbox(labels: &[String]) -> String {
    let labels = labels_literal(labels);
    format!(
        "{PROBE_PREFIX}{EMPTY_INBOX}\n(() => {{ const text = document.body ? document.body.innerText || '' : ''; \
         return {labels}.some((label) => text.includes(label)); }})()"
    )
}
