//! Chromium sessions over CDP.

use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    chromiumoxide::{
        Browser, BrowserConfig as CdpBrowserConfig, Page,
        cdp::browser_protocol::{
            emulation::{SetDeviceMetricsOverrideParams, SetTouchEmulationEnabledParams},
            fetch::{
                ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams,
                RequestId, RequestPattern, RequestStage,
            },
            network::ErrorReason,
            page::{EventDomContentEventFired, NavigateParams},
            security::SetIgnoreCertificateErrorsParams,
        },
        handler::viewport::Viewport,
    },
    futures::{StreamExt, stream::BoxStream},
    tempfile::TempDir,
    tokio::{sync::Mutex, task::JoinHandle},
    tracing::{debug, info, warn},
};

use crate::{
    detect,
    error::BrowserError,
    session::{BrowserSession, SessionLauncher},
    types::{BrowserConfig, PausedRequest, Verdict},
};

/// Switches that keep a throwaway session quiet: no background work,
/// extensions, sync, crash reporting, or popups.
pub const HARDENING_ARGS: &[&str] = &[
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-client-side-phishing-detection",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-gesture-typing",
    "--disable-hang-monitor",
    "--disable-infobars",
    "--disable-notifications",
    "--disable-popup-blocking",
    "--disable-prompt-on-repost",
    "--disable-renderer-backgrounding",
    "--disable-speech-api",
    "--disable-sync",
    "--disable-translate",
];

const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Launches one local Chromium per session.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    config: BrowserConfig,
}

impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    fn viewport(&self) -> Viewport {
        Viewport {
            width: self.config.viewport_width,
            height: self.config.viewport_height,
            device_scale_factor: Some(self.config.device_scale_factor),
            emulating_mobile: self.config.mobile,
            is_landscape: self.config.landscape,
            has_touch: self.config.has_touch,
        }
    }

    fn cdp_config(&self, profile: &TempDir) -> Result<CdpBrowserConfig, BrowserError> {
        let found = detect::locate(self.config.chrome_path.as_deref())?;

        let mut builder = CdpBrowserConfig::builder();
        if !self.config.headless {
            builder = builder.with_head();
        }
        if self.config.no_sandbox {
            builder = builder.no_sandbox();
        }

        builder = builder
            .chrome_executable(found.path)
            .user_data_dir(profile.path())
            .viewport(self.viewport())
            .request_timeout(self.config.launch_timeout)
            .arg("--ignore-certificate-errors");

        for arg in HARDENING_ARGS {
            builder = builder.arg(*arg);
        }
        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        builder
            .build()
            .map_err(|e| BrowserError::LaunchFailed(format!("invalid browser config: {e}")))
    }

    /// Per-page device profile, stealth and TLS tolerance.
    async fn prepare_page(&self, page: &Page) -> Result<(), BrowserError> {
        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(self.config.viewport_width)
            .height(self.config.viewport_height)
            .device_scale_factor(self.config.device_scale_factor)
            .mobile(self.config.mobile)
            .build()
            .map_err(BrowserError::LaunchFailed)?;
        page.execute(metrics).await?;
        page.execute(SetTouchEmulationEnabledParams::new(self.config.has_touch))
            .await?;
        page.execute(SetIgnoreCertificateErrorsParams::new(true))
            .await?;

        match &self.config.user_agent {
            Some(ua) => page.enable_stealth_mode_with_agent(ua).await?,
            None => page.enable_stealth_mode().await?,
        }
        Ok(())
    }
}

impl Default for ChromeLauncher {
    fn default() -> Self {
        Self::new(BrowserConfig::default())
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>, BrowserError> {
        let profile = tempfile::Builder::new()
            .prefix("snare-profile-")
            .tempdir()
            .map_err(|e| BrowserError::LaunchFailed(format!("profile dir: {e}")))?;
        let config = self.cdp_config(&profile)?;

        let (mut browser, mut handler) =
            tokio::time::timeout(self.config.launch_timeout, Browser::launch(config))
                .await
                .map_err(|_| {
                    BrowserError::LaunchFailed(format!(
                        "browser did not start within {}ms",
                        self.config.launch_timeout.as_millis()
                    ))
                })?
                .map_err(|e| {
                    BrowserError::LaunchFailed(format!("{e}\n\n{}", detect::install_hint()))
                })?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler error");
                }
            }
            debug!("browser event handler exited");
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                let _ = browser.kill().await;
                return Err(BrowserError::LaunchFailed(format!("new page: {e}")));
            },
        };

        if let Err(e) = self.prepare_page(&page).await {
            handler_task.abort();
            let _ = browser.kill().await;
            return Err(e);
        }

        info!(
            viewport_width = self.config.viewport_width,
            viewport_height = self.config.viewport_height,
            mobile = self.config.mobile,
            headless = self.config.headless,
            "browser session launched"
        );

        Ok(Arc::new(ChromeSession {
            browser: Mutex::new(Some(browser)),
            page,
            handler: Mutex::new(Some(handler_task)),
            _profile: profile,
        }))
    }
}

/// A live Chromium process with one page.
pub struct ChromeSession {
    browser: Mutex<Option<Browser>>,
    page: Page,
    handler: Mutex<Option<JoinHandle<()>>>,
    _profile: TempDir,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn paused_requests(
        &self,
    ) -> Result<BoxStream<'static, PausedRequest>, BrowserError> {
        let events = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|e| BrowserError::InterceptionSetup(e.to_string()))?;

        let pattern = RequestPattern::builder()
            .url_pattern("*")
            .request_stage(RequestStage::Request)
            .build();
        self.page
            .execute(EnableParams::builder().pattern(pattern).build())
            .await
            .map_err(|e| BrowserError::InterceptionSetup(e.to_string()))?;

        Ok(events
            .map(|event| PausedRequest {
                request_id: event.request_id.inner().clone(),
                url: event.request.url.clone(),
                resource_type: event.resource_type.as_ref().to_string(),
            })
            .boxed())
    }

    async fn settle(&self, request_id: &str, verdict: Verdict) -> Result<(), BrowserError> {
        let id = RequestId::new(request_id);
        match verdict {
            Verdict::Continue => {
                self.page.execute(ContinueRequestParams::new(id)).await?;
            },
            Verdict::Abort => {
                self.page
                    .execute(FailRequestParams::new(id, ErrorReason::BlockedByClient))
                    .await?;
            },
        }
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let mut dom_ready = self
            .page
            .event_listener::<EventDomContentEventFired>()
            .await?;

        let response = self
            .page
            .execute(NavigateParams::new(url))
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;
        if let Some(error) = response.result.error_text.as_ref() {
            return Err(BrowserError::NavigationFailed(error.clone()));
        }

        match dom_ready.next().await {
            Some(_) => Ok(()),
            None => Err(BrowserError::BrowserClosed),
        }
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };

        let closed = tokio::time::timeout(CLOSE_GRACE, async {
            browser.close().await?;
            browser
                .wait()
                .await
                .map_err(|e| BrowserError::Cdp(e.to_string()))?;
            Ok::<_, BrowserError>(())
        })
        .await;

        let result = match closed {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!(error = %e, "graceful browser close failed, killing");
                let _ = browser.kill().await;
                Err(e)
            },
            Err(_) => {
                warn!("browser did not exit in time, killing");
                let _ = browser.kill().await;
                Ok(())
            },
        };

        if let Some(handler) = self.handler.lock().await.take() {
            handler.abort();
        }
        debug!("browser session closed");
        result
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        // Browser's own Drop kills the child process.
        if let Some(handler) = self.handler.get_mut().take() {
            handler.abort();
        }
    }
}
