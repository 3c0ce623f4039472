use std::sync::Arc;

use action_locator::{DomElementLocator, ElementLocator, LabelTable, LocatorTarget};
use action_primitives::PollConfig;
use cdp_adapter::scripted::ScriptedDriver;
use serde_json::json;
use stealth::RecordingPacer;

fn locator() -> (Arc<ScriptedDriver>, Arc<RecordingPacer>, DomElementLocator) {
    let driver = ScriptedDriver::new("https://www.instagram.com/direct/inbox/");
    let pacer = RecordingPacer::new();
    let locator = DomElementLocator::new(driver.clone(), Arc::new(LabelTable::default()), pacer.clone());
    (driver, pacer, locator)
}

#[tokio::test]
async fn top_row_resolves_to_stamped_selector() {
    let (driver, _pacer, locator) = locator();
    driver.respond(
        "rows",
        json!([
            {"token": "x-0", "visible": true, "inDialog": true, "hasAvatar": true},
            {"token": "x-1", "visible": true, "hasTimeMarker": true},
            {"token": "x-2", "visible": true, "hasAvatar": true}
        ]),
    );

    let found = locator.locate(LocatorTarget::TopConversation).await.unwrap();
    assert_eq!(found.handle.selector, r#"[data-dmsweep-probe="x-1"]"#);
    assert_eq!(locator.count_conversations().await, 2);
}

#[tokio::test]
async fn info_control_walks_the_fallback_chain() {
    let (driver, _pacer, locator) = locator();
    driver
        .respond("info-labels", json!([{"token": "a-0", "visible": false, "labelIndex": 0, "exact": true}]))
        .respond("header-icons", json!([]))
        .respond(
            "icon-controls",
            json!([
                {"token": "c-0", "visible": true, "top": 12.0, "right": 200.0},
                {"token": "c-1", "visible": true, "top": 14.0, "right": 430.0}
            ]),
        );

    let found = locator.locate(LocatorTarget::InfoControl).await.unwrap();
    assert_eq!(found.strategy, "top-band-icon");
    assert_eq!(found.handle.selector, r#"[data-dmsweep-probe="c-1"]"#);
    assert_eq!(driver.evaluations_of("header-icons"), 1);
}

#[tokio::test]
async fn confirm_poll_is_bounded() {
    let (driver, pacer, locator) = locator();
    driver.respond("dialog-buttons", json!([{"token": "d-0", "inDialog": true, "text": "Cancel"}]));

    let missing = locator
        .await_target(LocatorTarget::ConfirmControl, PollConfig::from_millis(250, 3000))
        .await;
    assert!(missing.is_none());
    assert_eq!(pacer.total().as_millis(), 3000);
    assert_eq!(driver.evaluations_of("dialog-buttons"), 13);
}

#[tokio::test]
async fn delete_control_appears_on_later_poll() {
    let (driver, _pacer, locator) = locator();
    driver
        .respond("text-controls", json!([]))
        .respond("text-controls", json!([{"token": "t-0", "visible": true, "text": "Delete chat"}]));

    let found = locator
        .await_target(LocatorTarget::DeleteControl, PollConfig::default())
        .await
        .unwrap();
    assert_eq!(found.strategy, "exact-text");
    assert_eq!(driver.evaluations_of("text-controls"), 2);
}

#[tokio::test]
async fn counts_and_emptiness_degrade_to_defaults() {
    let (driver, _pacer, locator) = locator();
    assert!(!locator.is_inbox_empty().await);
    assert_eq!(locator.count_chats().await, 0);

    driver.respond("thread-links", json!(0)).respond("role-rows", json!(7));
    assert_eq!(locator.count_chats().await, 7);

    driver.respond("empty-inbox", json!(true));
    assert!(locator.is_inbox_empty().await);

    driver.respond("rows", json!("garbage"));
    assert!(locator.locate(LocatorTarget::TopConversation).await.is_none());

    driver.close();
    assert!(locator.locate(LocatorTarget::ConfirmControl).await.is_none());
    assert_eq!(locator.count_conversations().await, 0);
}
