//! Chromium-backed surfaces driven through chromiumoxide.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::target::EventTargetDestroyed;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use dashmap::DashMap;
use dmsweep_core_types::SurfaceId;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::driver::{PageDriver, Surface, SurfaceHost};
use crate::error::{AdapterError, AdapterErrorKind};

type CloseTokens = Arc<DashMap<String, CancellationToken>>;

struct BrowserRuntime {
    browser: Browser,
    handler_task: JoinHandle<()>,
    watch_task: JoinHandle<()>,
}

impl BrowserRuntime {
    fn is_alive(&self) -> bool {
        !self.handler_task.is_finished()
    }
}

/// Launches one browser on demand and opens a window per surface.
pub struct ChromiumHost {
    cfg: CdpConfig,
    runtime: Mutex<Option<BrowserRuntime>>,
    close_tokens: CloseTokens,
}

impl ChromiumHost {
    pub fn new(cfg: CdpConfig) -> Self {
        Self {
            cfg,
            runtime: Mutex::new(None),
            close_tokens: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> &CdpConfig {
        &self.cfg
    }

    fn browser_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
        if !cfg.executable.as_os_str().is_empty() && !cfg.executable.exists() {
            return Err(AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!(
                    "chrome executable not found at {}",
                    cfg.executable.display()
                ))
                .with_data(json!({
                    "expected": cfg.executable,
                    "hint": "Set DMSWEEP_CHROME to the full path of chrome/chromium."
                })));
        }

        let profile_dir = if cfg.user_data_dir.is_absolute() {
            cfg.user_data_dir.clone()
        } else {
            let cwd = std::env::current_dir().map_err(|err| {
                AdapterError::new(AdapterErrorKind::Internal)
                    .with_hint(format!("failed to resolve cwd for user-data-dir: {err}"))
            })?;
            cwd.join(&cfg.user_data_dir)
        };
        fs::create_dir_all(&profile_dir).map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("failed to ensure user-data-dir: {err}"))
        })?;

        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_millis(cfg.default_deadline_ms))
            .launch_timeout(Duration::from_secs(20))
            .window_size(cfg.window_width, cfg.window_height)
            .viewport(None);

        if !cfg.headless {
            builder = builder.with_head();
        }

        if std::env::var("DMSWEEP_DISABLE_SANDBOX")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
        {
            builder = builder.no_sandbox();
        }

        let mut args = vec![
            "--disable-background-timer-throttling".to_string(),
            "--disable-backgrounding-occluded-windows".to_string(),
            "--disable-renderer-backgrounding".to_string(),
            "--disable-breakpad".to_string(),
            "--disable-default-apps".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-popup-blocking".to_string(),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--password-store=basic".to_string(),
            "--use-mock-keychain".to_string(),
            format!("--window-position={},{}", cfg.window_left, cfg.window_top),
        ];
        if cfg.headless {
            args.push("--headless=new".to_string());
            args.push("--mute-audio".to_string());
        }
        builder = builder.args(args);

        if !cfg.executable.as_os_str().is_empty() {
            builder = builder.chrome_executable(cfg.executable.clone());
        }
        builder = builder.user_data_dir(profile_dir);

        builder.build().map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("browser config error: {err}"))
        })
    }

    async fn launch(&self) -> Result<BrowserRuntime, AdapterError> {
        let config = Self::browser_config(&self.cfg)?;
        let (browser, mut handler) = Browser::launch(config).await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!("failed to launch chromium: {err}"))
        })?;

        let tokens = self.close_tokens.clone();
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(target: "cdp-adapter", ?err, "chromium handler reported error");
                }
            }
            // Browser process gone: every surface is closed.
            for entry in tokens.iter() {
                entry.value().cancel();
            }
            tokens.clear();
        });

        let mut destroyed = browser
            .event_listener::<EventTargetDestroyed>()
            .await
            .map_err(|err| AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string()))?;
        let tokens = self.close_tokens.clone();
        let watch_task = tokio::spawn(async move {
            while let Some(event) = destroyed.next().await {
                if let Some((target, token)) = tokens.remove(event.target_id.inner()) {
                    debug!(target: "cdp-adapter", %target, "surface target destroyed");
                    token.cancel();
                }
            }
        });

        info!(
            target: "cdp-adapter",
            headless = self.cfg.headless,
            width = self.cfg.window_width,
            height = self.cfg.window_height,
            "chromium launched"
        );

        Ok(BrowserRuntime {
            browser,
            handler_task,
            watch_task,
        })
    }
}

#[async_trait]
impl SurfaceHost for ChromiumHost {
    async fn open_surface(&self, url: &str) -> Result<Arc<dyn Surface>, AdapterError> {
        let mut guard = self.runtime.lock().await;
        let alive = guard.as_ref().map(BrowserRuntime::is_alive).unwrap_or(false);
        if !alive {
            if let Some(stale) = guard.take() {
                stale.watch_task.abort();
            }
            *guard = Some(self.launch().await?);
        }
        let runtime = guard
            .as_ref()
            .ok_or_else(|| AdapterError::new(AdapterErrorKind::Internal).with_hint("no browser runtime"))?;

        let page = runtime.browser.new_page(url).await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!("failed to open surface: {err}"))
                .retriable(true)
        })?;

        let closed = CancellationToken::new();
        let target = page.target_id().inner().clone();
        self.close_tokens.insert(target.clone(), closed.clone());

        let surface = ChromiumSurface {
            id: SurfaceId::new(),
            page: Arc::new(ChromiumPage {
                page,
                closed: closed.clone(),
                deadline: Duration::from_millis(self.cfg.default_deadline_ms),
            }),
            closed,
        };
        info!(target: "cdp-adapter", surface = %surface.id, %target, %url, "surface opened");
        Ok(Arc::new(surface))
    }

    async fn shutdown(&self) {
        let Some(mut runtime) = self.runtime.lock().await.take() else {
            return;
        };
        if let Err(err) = runtime.browser.close().await {
            warn!(target: "cdp-adapter", ?err, "browser close failed");
        }
        if let Err(err) = runtime.browser.wait().await {
            warn!(target: "cdp-adapter", ?err, "browser wait failed");
        }
        runtime.watch_task.abort();
        runtime.handler_task.abort();
        for entry in self.close_tokens.iter() {
            entry.value().cancel();
        }
        self.close_tokens.clear();
    }
}

struct ChromiumSurface {
    id: SurfaceId,
    page: Arc<ChromiumPage>,
    closed: CancellationToken,
}

#[async_trait]
impl Surface for ChromiumSurface {
    fn id(&self) -> &SurfaceId {
        &self.id
    }

    fn driver(&self) -> Arc<dyn PageDriver> {
        self.page.clone()
    }

    fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    async fn close(&self) -> Result<(), AdapterError> {
        if self.closed.is_cancelled() {
            return Ok(());
        }
        let result = self.page.page.clone().close().await;
        self.closed.cancel();
        result.map_err(|err| self.page.map_cdp_error(err))
    }
}

struct ChromiumPage {
    page: Page,
    closed: CancellationToken,
    deadline: Duration,
}

impl ChromiumPage {
    fn map_cdp_error(&self, err: CdpError) -> AdapterError {
        if self.closed.is_cancelled() {
            return AdapterError::surface_closed().with_hint(err.to_string());
        }
        AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string())
    }

    fn ensure_open(&self) -> Result<(), AdapterError> {
        if self.closed.is_cancelled() {
            return Err(AdapterError::surface_closed());
        }
        Ok(())
    }

    fn timed_out(&self, what: &str) -> AdapterError {
        AdapterError::new(AdapterErrorKind::NavTimeout)
            .with_hint(format!("{what} exceeded {}ms", self.deadline.as_millis()))
            .retriable(true)
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn evaluate(&self, expression: &str) -> Result<Value, AdapterError> {
        self.ensure_open()?;
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|err| AdapterError::new(AdapterErrorKind::Internal).with_hint(err))?;
        let result = tokio::time::timeout(self.deadline, self.page.evaluate_expression(params))
            .await
            .map_err(|_| self.timed_out("evaluate"))?
            .map_err(|err| self.map_cdp_error(err))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn navigate(&self, url: &str) -> Result<(), AdapterError> {
        self.ensure_open()?;
        tokio::time::timeout(self.deadline, self.page.goto(url))
            .await
            .map_err(|_| self.timed_out("navigation"))?
            .map_err(|err| self.map_cdp_error(err))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AdapterError> {
        self.ensure_open()?;
        let url = self
            .page
            .url()
            .await
            .map_err(|err| self.map_cdp_error(err))?;
        Ok(url.unwrap_or_default())
    }

    async fn click(&self, selector: &str) -> Result<(), AdapterError> {
        self.ensure_open()?;
        let element = self.page.find_element(selector).await.map_err(|err| {
            if self.closed.is_cancelled() {
                return AdapterError::surface_closed();
            }
            AdapterError::new(AdapterErrorKind::TargetNotFound)
                .with_hint(format!("{selector}: {err}"))
        })?;
        tokio::time::timeout(self.deadline, element.click())
            .await
            .map_err(|_| self.timed_out("click"))?
            .map_err(|err| self.map_cdp_error(err))?;
        Ok(())
    }
}
