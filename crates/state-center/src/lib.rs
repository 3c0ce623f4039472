use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dmsweep_core_types::{Command, DeletionState, SweepError};
use parking_lot::Mutex;
use serde_json::{to_writer_pretty, Map, Value};
use tracing::{debug, warn};

/// Key holding the shared [`DeletionState`].
pub const DELETION_STATE_KEY: &str = "deletionState";
/// Key holding the single pending [`Command`].
pub const PENDING_COMMAND_KEY: &str = "pendingCommand";
/// Key holding the user's speed profile preference.
pub const SPEED_PROFILE_KEY: &str = "speedProfile";

/// Process-wide key-value store shared by every surface.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, SweepError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), SweepError>;
    async fn remove(&self, key: &str) -> Result<(), SweepError>;
}

/// Volatile store for tests and single-process runs.
#[derive(Default)]
pub struct InMemoryStateStore {
    entries: DashMap<String, Value>,
}

impl InMemoryStateStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, SweepError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), SweepError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), SweepError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store backed by a pretty-printed JSON object on disk. Every write replaces
/// the whole file through a temp file and a rename, so a later process (or a
/// restarted run) sees either the old record or the new one. The file being
/// replaced is kept as `<name>.bak`.
pub struct JsonFileStateStore {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl JsonFileStateStore {
    /// Open the file at `path`. An unreadable file falls back to its backup,
    /// then to an empty store.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let entries = match read_object(&path)? {
            Some(map) => map,
            None => match read_object(&backup_path(&path))? {
                Some(map) => {
                    warn!(path = %path.display(), "state file unreadable; recovered from backup");
                    map
                }
                None => Map::new(),
            },
        };
        debug!(path = %path.display(), keys = entries.len(), "opened state file");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_snapshot(&self, entries: &Map<String, Value>) -> io::Result<()> {
        let temp = self.path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&temp)?);
            to_writer_pretty(&mut writer, entries)
                .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        match fs::rename(&self.path, backup_path(&self.path)) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        fs::rename(&temp, &self.path)
    }

    /// Apply `change` to a copy and keep it only once it is on disk.
    fn mutate(&self, change: impl FnOnce(&mut Map<String, Value>)) -> Result<(), SweepError> {
        let mut guard = self.entries.lock();
        let mut next = guard.clone();
        change(&mut next);
        self.write_snapshot(&next).map_err(|err| {
            SweepError::new(format!(
                "failed to write state file {}: {}",
                self.path.display(),
                err
            ))
        })?;
        *guard = next;
        Ok(())
    }
}

fn backup_path(path: &Path) -> PathBuf {
    path.with_extension("bak")
}

/// `None` when the file is missing, empty or not a JSON object.
fn read_object(path: &Path) -> io::Result<Option<Map<String, Value>>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(_) | Err(_) => {
            warn!(path = %path.display(), "state file is not a JSON object");
            Ok(None)
        }
    }
}

#[async_trait]
impl StateStore for JsonFileStateStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, SweepError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), SweepError> {
        self.mutate(|map| {
            map.insert(key.to_string(), value);
        })
    }

    async fn remove(&self, key: &str) -> Result<(), SweepError> {
        self.mutate(|map| {
            map.remove(key);
        })
    }
}

/// Typed accessor over the three persisted keys. All cross-reload state goes
/// through here; nothing reads the store with raw keys.
#[derive(Clone)]
pub struct PersistedState {
    store: Arc<dyn StateStore>,
}

impl PersistedState {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(InMemoryStateStore::new())
    }

    pub fn store(&self) -> Arc<dyn StateStore> {
        self.store.clone()
    }

    /// Current record; `idle` when absent or malformed.
    pub async fn deletion_state(&self) -> Result<DeletionState, SweepError> {
        let Some(raw) = self.store.get(DELETION_STATE_KEY).await? else {
            return Ok(DeletionState::idle());
        };
        match serde_json::from_value(raw) {
            Ok(state) => Ok(state),
            Err(err) => {
                warn!(?err, "malformed deletion state; treating as idle");
                Ok(DeletionState::idle())
            }
        }
    }

    pub async fn set_deletion_state(&self, state: &DeletionState) -> Result<(), SweepError> {
        let value = serde_json::to_value(state)
            .map_err(|err| SweepError::new(format!("serialize deletion state: {err}")))?;
        self.store.set(DELETION_STATE_KEY, value).await
    }

    /// Read-modify-write without isolation; callers own disjoint fields.
    pub async fn update_deletion_state<F>(&self, apply: F) -> Result<DeletionState, SweepError>
    where
        F: FnOnce(&mut DeletionState) + Send,
    {
        let mut state = self.deletion_state().await?;
        apply(&mut state);
        self.set_deletion_state(&state).await?;
        Ok(state)
    }

    pub async fn reset(&self) -> Result<(), SweepError> {
        self.set_deletion_state(&DeletionState::idle()).await
    }

    pub async fn pending_command(&self) -> Result<Option<Command>, SweepError> {
        let Some(raw) = self.store.get(PENDING_COMMAND_KEY).await? else {
            return Ok(None);
        };
        Ok(raw.as_str().and_then(|value| value.parse().ok()))
    }

    pub async fn set_pending_command(&self, command: Command) -> Result<(), SweepError> {
        self.store
            .set(PENDING_COMMAND_KEY, Value::String(command.as_str().to_string()))
            .await
    }

    pub async fn clear_pending_command(&self) -> Result<(), SweepError> {
        self.store.remove(PENDING_COMMAND_KEY).await
    }

    pub async fn speed_profile(&self) -> Result<Option<String>, SweepError> {
        Ok(self
            .store
            .get(SPEED_PROFILE_KEY)
            .await?
            .and_then(|value| value.as_str().map(|s| s.to_string())))
    }

    pub async fn set_speed_profile(&self, name: &str) -> Result<(), SweepError> {
        self.store
            .set(SPEED_PROFILE_KEY, Value::String(name.to_string()))
            .await
    }
}
