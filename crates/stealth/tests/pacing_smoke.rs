use std::io::Write;
use std::time::Duration;

use stealth::config::load_bundle_from_path;
use stealth::{
    delay_from_profile, DelayKey, PacingPolicy, ProfileCatalog, RecordingPacer, SpeedProfile,
    SpeedProfileName, TokioPacer,
};

#[tokio::test(start_paused = true)]
async fn tokio_pacer_advances_virtual_time() {
    let policy = PacingPolicy::with_seed(SpeedProfile::slow(), 3);
    let started = tokio::time::Instant::now();
    let slept = delay_from_profile(&policy, &TokioPacer, DelayKey::ClickDelay).await;
    assert!(started.elapsed() >= slept);
    assert!(slept >= Duration::from_millis(1500));
    assert!(slept <= Duration::from_millis(2500));
}

#[tokio::test]
async fn recording_pacer_keeps_every_request() {
    let policy = PacingPolicy::with_seed(SpeedProfile::fast(), 9);
    let pacer = RecordingPacer::new();
    for key in [DelayKey::ClickDelay, DelayKey::AfterDelete, DelayKey::PauseDuration] {
        delay_from_profile(&policy, pacer.as_ref(), key).await;
    }
    let sleeps = pacer.sleeps();
    assert_eq!(sleeps.len(), 3);
    assert!(sleeps[2] >= Duration::from_millis(3000));
    assert_eq!(pacer.total(), sleeps.iter().sum::<Duration>());
}

#[test]
fn bundle_file_feeds_catalog() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"profiles":[{{"name":"normal","click_delay":{{"min_ms":1,"max_ms":2}},
        "after_delete":{{"min_ms":3,"max_ms":4}},"pause_every":2,
        "pause_duration":{{"min_ms":5,"max_ms":6}}}}]}}"#
    )
    .unwrap();

    let bundle = load_bundle_from_path(file.path()).unwrap();
    let catalog = ProfileCatalog::with_bundle(bundle);
    let normal = catalog.resolve(SpeedProfileName::Normal);
    assert_eq!(normal.pause_every, 2);
    assert_eq!(normal.click_delay.max_ms, 2);
}
