//! Offline page driver for tests. Scripts are matched by their leading
//! `// probe:<name>` marker and answered from a per-marker queue.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use dmsweep_core_types::SurfaceId;
use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::driver::{PageDriver, Surface, SurfaceHost};
use crate::error::{AdapterError, AdapterErrorKind};

/// Marker prefix recognised by [`probe_marker`].
pub const PROBE_PREFIX: &str = "// probe:";

/// Extract the probe name from a script, if it carries one.
pub fn probe_marker(expression: &str) -> Option<&str> {
    let rest = expression.trim_start().strip_prefix(PROBE_PREFIX)?;
    Some(rest.lines().next().unwrap_or_default().trim())
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DriverCall {
    Evaluate(String),
    Navigate(String),
    Click(String),
}

#[derive(Default)]
struct ScriptState {
    url: String,
    responses: HashMap<String, VecDeque<Value>>,
    calls: Vec<DriverCall>,
}

/// Driver whose answers are queued up front. The last queued answer for a
/// marker repeats; unknown markers evaluate to `null`.
#[derive(Default)]
pub struct ScriptedDriver {
    state: Mutex<ScriptState>,
    closed: CancellationToken,
}

impl ScriptedDriver {
    pub fn new(url: impl Into<String>) -> Arc<Self> {
        let driver = Self::default();
        driver.state.lock().url = url.into();
        Arc::new(driver)
    }

    pub fn respond(&self, marker: &str, value: Value) -> &Self {
        self.state
            .lock()
            .responses
            .entry(marker.to_string())
            .or_default()
            .push_back(value);
        self
    }

    pub fn set_url(&self, url: impl Into<String>) {
        self.state.lock().url = url.into();
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().calls.clone()
    }

    pub fn evaluations_of(&self, marker: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, DriverCall::Evaluate(m) if m == marker))
            .count()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                DriverCall::Click(selector) => Some(selector.clone()),
                _ => None,
            })
            .collect()
    }

    /// Make every further call fail as if the window had been closed.
    pub fn close(&self) {
        self.closed.cancel();
    }

    fn check_open(&self) -> Result<(), AdapterError> {
        if self.closed.is_cancelled() {
            return Err(AdapterError::surface_closed());
        }
        Ok(())
    }
}

#[async_trait]
impl PageDriver for ScriptedDriver {
    async fn evaluate(&self, expression: &str) -> Result<Value, AdapterError> {
        self.check_open()?;
        let marker = probe_marker(expression).unwrap_or_default().to_string();
        let mut state = self.state.lock();
        state.calls.push(DriverCall::Evaluate(marker.clone()));
        let Some(queue) = state.responses.get_mut(&marker) else {
            return Ok(Value::Null);
        };
        let value = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(value.unwrap_or(Value::Null))
    }

    async fn navigate(&self, url: &str) -> Result<(), AdapterError> {
        self.check_open()?;
        let mut state = self.state.lock();
        state.calls.push(DriverCall::Navigate(url.to_string()));
        state.url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AdapterError> {
        self.check_open()?;
        Ok(self.state.lock().url.clone())
    }

    async fn click(&self, selector: &str) -> Result<(), AdapterError> {
        self.check_open()?;
        if selector.trim().is_empty() {
            return Err(AdapterError::new(AdapterErrorKind::TargetNotFound));
        }
        self.state
            .lock()
            .calls
            .push(DriverCall::Click(selector.to_string()));
        Ok(())
    }
}

/// Surface wrapper around a [`ScriptedDriver`].
pub struct ScriptedSurface {
    id: SurfaceId,
    driver: Arc<ScriptedDriver>,
}

impl ScriptedSurface {
    pub fn new(driver: Arc<ScriptedDriver>) -> Arc<Self> {
        Arc::new(Self {
            id: SurfaceId::new(),
            driver,
        })
    }

    pub fn scripted(&self) -> Arc<ScriptedDriver> {
        self.driver.clone()
    }
}

#[async_trait]
impl Surface for ScriptedSurface {
    fn id(&self) -> &SurfaceId {
        &self.id
    }

    fn driver(&self) -> Arc<dyn PageDriver> {
        self.driver.clone()
    }

    fn closed_token(&self) -> CancellationToken {
        self.driver.closed.clone()
    }

    async fn close(&self) -> Result<(), AdapterError> {
        self.driver.close();
        Ok(())
    }
}

type Prepare = Box<dyn Fn(&ScriptedDriver) + Send + Sync>;

/// Host that hands out [`ScriptedSurface`]s, each primed by `prepare`.
pub struct ScriptedHost {
    prepare: Prepare,
    opened: Mutex<Vec<Arc<ScriptedSurface>>>,
}

impl ScriptedHost {
    pub fn new(prepare: impl Fn(&ScriptedDriver) + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            prepare: Box::new(prepare),
            opened: Mutex::new(Vec::new()),
        })
    }

    pub fn surfaces(&self) -> Vec<Arc<ScriptedSurface>> {
        self.opened.lock().clone()
    }

    pub fn last(&self) -> Option<Arc<ScriptedSurface>> {
        self.opened.lock().last().cloned()
    }
}

#[async_trait]
impl SurfaceHost for ScriptedHost {
    async fn open_surface(&self, url: &str) -> Result<Arc<dyn Surface>, AdapterError> {
        let driver = ScriptedDriver::new(url);
        (self.prepare)(&driver);
        let surface = ScriptedSurface::new(driver);
        self.opened.lock().push(surface.clone());
        Ok(surface)
    }

    async fn shutdown(&self) {
        for surface in self.opened.lock().iter() {
            surface.scripted().close();
        }
    }
}
