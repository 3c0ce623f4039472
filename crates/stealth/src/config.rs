//! Speed profile definitions and bundle loading.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to deserialize profile bundle: {0}")]
    Deserialize(String),
    #[error("invalid profile '{name}': {reason}")]
    Invalid { name: String, reason: String },
}

/// Inclusive millisecond range.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn fixed(ms: u64) -> Self {
        Self::new(ms, ms)
    }

    pub fn contains(&self, ms: u64) -> bool {
        (self.min_ms..=self.max_ms).contains(&ms)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SpeedProfile {
    pub name: String,
    pub click_delay: DelayRange,
    pub after_delete: DelayRange,
    #[serde(default = "SpeedProfile::default_pause_every")]
    pub pause_every: u32,
    pub pause_duration: DelayRange,
}

impl SpeedProfile {
    fn default_pause_every() -> u32 {
        12
    }

    pub fn slow() -> Self {
        Self {
            name: "slow".into(),
            click_delay: DelayRange::new(1500, 2500),
            after_delete: DelayRange::new(2500, 4000),
            pause_every: 8,
            pause_duration: DelayRange::new(6000, 12000),
        }
    }

    pub fn normal() -> Self {
        Self {
            name: "normal".into(),
            click_delay: DelayRange::new(500, 900),
            after_delete: DelayRange::new(1000, 1800),
            pause_every: Self::default_pause_every(),
            pause_duration: DelayRange::new(4000, 7000),
        }
    }

    pub fn fast() -> Self {
        Self {
            name: "fast".into(),
            click_delay: DelayRange::new(300, 600),
            after_delete: DelayRange::new(500, 900),
            pause_every: 15,
            pause_duration: DelayRange::new(3000, 5000),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        for (key, range) in [
            ("click_delay", self.click_delay),
            ("after_delete", self.after_delete),
            ("pause_duration", self.pause_duration),
        ] {
            if range.min_ms > range.max_ms {
                return Err(invalid(&format!("{key} min exceeds max")));
            }
        }
        if self.pause_every == 0 {
            return Err(invalid("pause_every must be positive"));
        }
        Ok(())
    }
}

/// Optional overrides for the built-in profiles.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SpeedProfileBundle {
    #[serde(default)]
    pub profiles: Vec<SpeedProfile>,
}

pub fn load_bundle_from_reader<R: Read>(mut reader: R) -> Result<SpeedProfileBundle, ConfigError> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;
    parse_bundle_str(&buf)
}

pub fn load_bundle_from_path(path: impl AsRef<Path>) -> Result<SpeedProfileBundle, ConfigError> {
    let file = File::open(path.as_ref())?;
    load_bundle_from_reader(file)
}

pub fn parse_bundle_str(raw: &str) -> Result<SpeedProfileBundle, ConfigError> {
    let bundle: SpeedProfileBundle = match serde_json::from_str(raw) {
        Ok(bundle) => bundle,
        Err(json_err) => serde_yaml::from_str(raw).map_err(|yaml_err| {
            ConfigError::Deserialize(format!(
                "json error: {}; yaml error: {}",
                json_err, yaml_err
            ))
        })?,
    };
    for profile in &bundle.profiles {
        profile.validate()?;
    }
    Ok(bundle)
}
