//! Contract tests against a real Chromium binary. Ignored by default because they
//! need Chrome/Chromium on the host machine.

use std::env;
use std::time::Duration;

use cdp_adapter::scripted::{probe_marker, DriverCall, ScriptedDriver, ScriptedSurface};
use cdp_adapter::{CdpConfig, ChromiumHost, PageDriver, Surface, SurfaceHost};
use serde_json::json;

fn contract_enabled() -> bool {
    env::var("DMSWEEP_CDP_CONTRACT")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn contract_config() -> (CdpConfig, tempfile::TempDir) {
    let profile = tempfile::tempdir().expect("create temporary chrome profile");
    let cfg = CdpConfig {
        headless: true,
        user_data_dir: profile.path().into(),
        ..CdpConfig::default()
    };
    (cfg, profile)
}

#[tokio::test]
#[ignore = "requires Chrome/Chromium; set DMSWEEP_CDP_CONTRACT=1"]
async fn contract_evaluate_and_close() {
    if !contract_enabled() {
        eprintln!("skipping CDP contract test (DMSWEEP_CDP_CONTRACT not enabled)");
        return;
    }

    let (cfg, _profile) = contract_config();
    let host = ChromiumHost::new(cfg);
    let surface = host
        .open_surface("about:blank")
        .await
        .expect("open surface");
    let driver = surface.driver();

    let value = driver
        .evaluate("(() => { document.body.innerHTML = '<button id=\"b\">ok</button>'; return 1 + 1; })()")
        .await
        .expect("evaluate");
    assert_eq!(value, json!(2));

    let awaited = driver
        .evaluate("new Promise((resolve) => setTimeout(() => resolve('late'), 50))")
        .await
        .expect("await promise");
    assert_eq!(awaited, json!("late"));

    driver.click("#b").await.expect("click");

    surface.close().await.expect("close surface");
    tokio::time::timeout(Duration::from_secs(5), surface.closed_token().cancelled())
        .await
        .expect("closed token fires");
    assert!(driver.evaluate("1").await.unwrap_err().is_surface_closed());

    host.shutdown().await;
}

#[tokio::test]
async fn scripted_driver_replays_queued_answers() {
    let driver = ScriptedDriver::new("https://www.instagram.com/direct/inbox/");
    driver
        .respond("rows", json!(3))
        .respond("rows", json!(2));

    assert_eq!(probe_marker("// probe:rows\n(() => 1)()"), Some("rows"));
    assert_eq!(driver.evaluate("// probe:rows\n1").await.unwrap(), json!(3));
    assert_eq!(driver.evaluate("// probe:rows\n1").await.unwrap(), json!(2));
    assert_eq!(driver.evaluate("// probe:rows\n1").await.unwrap(), json!(2));
    assert_eq!(driver.evaluate("1 + 1").await.unwrap(), json!(null));

    driver.navigate("https://example.com/").await.unwrap();
    assert_eq!(driver.current_url().await.unwrap(), "https://example.com/");
    assert_eq!(driver.evaluations_of("rows"), 3);
    assert!(driver
        .calls()
        .contains(&DriverCall::Navigate("https://example.com/".into())));

    let surface = ScriptedSurface::new(driver.clone());
    assert!(!surface.is_closed());
    surface.close().await.unwrap();
    assert!(surface.is_closed());
    assert!(driver.current_url().await.unwrap_err().is_surface_closed());
}
