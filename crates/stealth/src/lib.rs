//! Speed profiles and randomized pacing.
//!
//! A [`SpeedProfileName`] resolves to an immutable [`SpeedProfile`] through a
//! [`ProfileCatalog`]. The [`PacingPolicy`] draws uniformly random delays from the
//! profile's inclusive ranges and applies the natural-pause cadence; the actual
//! waiting goes through a [`Pacer`] so loops can be driven without real sleeps.

pub mod config;

pub use crate::config::{ConfigError, DelayRange, SpeedProfile, SpeedProfileBundle};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StealthError {
    #[error("unknown speed profile '{0}'")]
    UnknownProfile(String),
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedProfileName {
    Slow,
    #[default]
    Normal,
    Fast,
}

impl SpeedProfileName {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeedProfileName::Slow => "slow",
            SpeedProfileName::Normal => "normal",
            SpeedProfileName::Fast => "fast",
        }
    }

    /// Unset or unrecognized preferences fall back to `normal`.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw.map(str::parse::<SpeedProfileName>) {
            Some(Ok(name)) => name,
            Some(Err(err)) => {
                debug!(%err, "falling back to normal speed profile");
                SpeedProfileName::Normal
            }
            None => SpeedProfileName::Normal,
        }
    }

    /// Profiles fast enough to be worth a warning.
    pub fn is_risky(&self) -> bool {
        matches!(self, SpeedProfileName::Fast)
    }
}

impl FromStr for SpeedProfileName {
    type Err = StealthError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "slow" => Ok(SpeedProfileName::Slow),
            "normal" => Ok(SpeedProfileName::Normal),
            "fast" => Ok(SpeedProfileName::Fast),
            _ => Err(StealthError::UnknownProfile(raw.to_string())),
        }
    }
}

impl fmt::Display for SpeedProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which range of a profile a delay is drawn from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DelayKey {
    ClickDelay,
    AfterDelete,
    PauseDuration,
}

impl DelayKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            DelayKey::ClickDelay => "click_delay",
            DelayKey::AfterDelete => "after_delete",
            DelayKey::PauseDuration => "pause_duration",
        }
    }
}

/// Built-in profiles plus any bundle overrides, keyed by name.
#[derive(Clone, Debug)]
pub struct ProfileCatalog {
    profiles: HashMap<String, SpeedProfile>,
}

impl Default for ProfileCatalog {
    fn default() -> Self {
        let mut profiles = HashMap::new();
        for profile in [
            SpeedProfile::slow(),
            SpeedProfile::normal(),
            SpeedProfile::fast(),
        ] {
            profiles.insert(profile.name.clone(), profile);
        }
        Self { profiles }
    }
}

impl ProfileCatalog {
    pub fn with_bundle(bundle: SpeedProfileBundle) -> Self {
        let mut catalog = Self::default();
        for profile in bundle.profiles {
            catalog.profiles.insert(profile.name.clone(), profile);
        }
        catalog
    }

    pub fn resolve(&self, name: SpeedProfileName) -> SpeedProfile {
        self.profiles
            .get(name.as_str())
            .cloned()
            .unwrap_or_else(|| match name {
                SpeedProfileName::Slow => SpeedProfile::slow(),
                SpeedProfileName::Normal => SpeedProfile::normal(),
                SpeedProfileName::Fast => SpeedProfile::fast(),
            })
    }
}

/// Draws delays for one worker run.
pub struct PacingPolicy {
    profile: SpeedProfile,
    rng: Mutex<StdRng>,
}

impl PacingPolicy {
    pub fn new(profile: SpeedProfile) -> Self {
        Self {
            profile,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(profile: SpeedProfile, seed: u64) -> Self {
        Self {
            profile,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn profile(&self) -> &SpeedProfile {
        &self.profile
    }

    pub fn range(&self, key: DelayKey) -> DelayRange {
        match key {
            DelayKey::ClickDelay => self.profile.click_delay,
            DelayKey::AfterDelete => self.profile.after_delete,
            DelayKey::PauseDuration => self.profile.pause_duration,
        }
    }

    pub fn draw(&self, key: DelayKey) -> Duration {
        self.draw_range(self.range(key))
    }

    /// Uniform draw within the inclusive bounds. An inverted range collapses to its minimum.
    pub fn draw_range(&self, range: DelayRange) -> Duration {
        let ms = if range.max_ms <= range.min_ms {
            range.min_ms
        } else {
            self.rng.lock().gen_range(range.min_ms..=range.max_ms)
        };
        Duration::from_millis(ms)
    }

    pub fn is_natural_pause(&self, deleted: u32) -> bool {
        deleted > 0 && deleted % self.profile.pause_every.max(1) == 0
    }

    /// Delay after the `deleted`-th successful deletion.
    pub fn after_delete_delay(&self, deleted: u32) -> (DelayKey, Duration) {
        let key = if self.is_natural_pause(deleted) {
            DelayKey::PauseDuration
        } else {
            DelayKey::AfterDelete
        };
        (key, self.draw(key))
    }
}

/// Where pacing delays are spent.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested sleeps and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }

    pub fn total(&self) -> Duration {
        self.sleeps.lock().iter().sum()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        tokio::task::yield_now().await;
    }
}

/// Sleep a random duration from `key`'s range and report what was slept.
pub async fn delay_from_profile(policy: &PacingPolicy, pacer: &dyn Pacer, key: DelayKey) -> Duration {
    let duration = policy.draw(key);
    debug!(key = key.as_str(), delay_ms = duration.as_millis() as u64, "pacing");
    pacer.sleep(duration).await;
    duration
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_preference_falls_back_to_normal() {
        assert_eq!(SpeedProfileName::parse_or_default(None), SpeedProfileName::Normal);
        assert_eq!(
            SpeedProfileName::parse_or_default(Some("ludicrous")),
            SpeedProfileName::Normal
        );
        assert_eq!(
            SpeedProfileName::parse_or_default(Some("SLOW")),
            SpeedProfileName::Slow
        );
        assert!(SpeedProfileName::Fast.is_risky());
    }

    #[test]
    fn draws_stay_within_inclusive_bounds() {
        let policy = PacingPolicy::with_seed(SpeedProfile::normal(), 7);
        for _ in 0..500 {
            let ms = policy.draw(DelayKey::ClickDelay).as_millis() as u64;
            assert!((500..=900).contains(&ms), "{ms} outside click range");
        }
        let fixed = policy.draw_range(DelayRange::fixed(2500));
        assert_eq!(fixed, Duration::from_millis(2500));
    }

    #[test]
    fn seeded_policies_agree() {
        let a = PacingPolicy::with_seed(SpeedProfile::slow(), 42);
        let b = PacingPolicy::with_seed(SpeedProfile::slow(), 42);
        let left: Vec<_> = (0..16).map(|_| a.draw(DelayKey::AfterDelete)).collect();
        let right: Vec<_> = (0..16).map(|_| b.draw(DelayKey::AfterDelete)).collect();
        assert_eq!(left, right);
    }

    #[test]
    fn natural_pause_follows_modulus() {
        let policy = PacingPolicy::with_seed(SpeedProfile::normal(), 1);
        assert!(!policy.is_natural_pause(0));
        assert!(!policy.is_natural_pause(11));
        assert!(policy.is_natural_pause(12));
        assert!(policy.is_natural_pause(24));

        let (key, delay) = policy.after_delete_delay(12);
        assert_eq!(key, DelayKey::PauseDuration);
        assert!(SpeedProfile::normal().pause_duration.contains(delay.as_millis() as u64));

        let (key, delay) = policy.after_delete_delay(5);
        assert_eq!(key, DelayKey::AfterDelete);
        assert!(SpeedProfile::normal().after_delete.contains(delay.as_millis() as u64));
    }

    #[test]
    fn catalog_applies_bundle_overrides() {
        let mut fast = SpeedProfile::fast();
        fast.pause_every = 3;
        let catalog = ProfileCatalog::with_bundle(SpeedProfileBundle {
            profiles: vec![fast],
        });
        assert_eq!(catalog.resolve(SpeedProfileName::Fast).pause_every, 3);
        assert_eq!(catalog.resolve(SpeedProfileName::Slow).pause_every, 8);
    }
}
