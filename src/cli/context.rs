use std::path::{Path, PathBuf};
use std::sync::Arc;

use action_locator::LabelTable;
use anyhow::{Context, Result};
use dmsweep_state_center::{JsonFileStateStore, PersistedState};
use stealth::{config::load_bundle_from_path, ProfileCatalog};
use tracing::info;

use crate::config::Config;

pub struct CliContext {
    config: Arc<Config>,
    config_path: PathBuf,
}

impl CliContext {
    pub fn new(config: Config, config_path: PathBuf) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
        }
    }

    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Persisted run state shared with every other invocation.
    pub fn open_state(&self) -> Result<PersistedState> {
        let path = &self.config.state_file;
        let store = JsonFileStateStore::open(path)
            .with_context(|| format!("Failed to open state file {}", path.display()))?;
        Ok(PersistedState::new(Arc::new(store)))
    }

    pub fn load_labels(&self) -> Result<LabelTable> {
        match &self.config.labels_file {
            Some(path) => {
                let labels = LabelTable::load_from_path(path)
                    .with_context(|| format!("Failed to load labels from {}", path.display()))?;
                info!("Loaded control labels from: {}", path.display());
                Ok(labels)
            }
            None => Ok(LabelTable::default()),
        }
    }

    pub fn load_catalog(&self) -> Result<ProfileCatalog> {
        match &self.config.speed_bundle_file {
            Some(path) => {
                let bundle = load_bundle_from_path(path).with_context(|| {
                    format!("Failed to load speed profiles from {}", path.display())
                })?;
                info!("Loaded speed profiles from: {}", path.display());
                Ok(ProfileCatalog::with_bundle(bundle))
            }
            None => Ok(ProfileCatalog::default()),
        }
    }
}
