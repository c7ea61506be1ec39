//! Chromium-backed engine implementation, driven over CDP.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    EventResponseReceived, Headers, ResourceType, SetCacheDisabledParams,
    SetExtraHttpHeadersParams,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::engine::{
    BrowserEngine, EngineError, EngineLauncher, EnginePage, PageMetadata, PageSettings,
};

/// Headless launch flags of the production deployment.
const CHROMIUM_ARGS: [&str; 6] = [
    "--disable-dev-shm-usage",
    "--disable-setuid-sandbox",
    "--no-zygote",
    "--disable-gpu",
    "--disable-audio-output",
    "--single-process",
];

/// Applied until `prepare` installs the request's timeout.
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Grace period for the document response event to arrive after the load
/// event fired.
const METADATA_GRACE: Duration = Duration::from_secs(1);

fn engine_error(error: impl std::fmt::Display) -> EngineError {
    EngineError::Engine(error.to_string())
}

fn operation_timed_out(operation: &str) -> EngineError {
    EngineError::Engine(format!(
        "ERR_TIMED_OUT: {operation} did not complete within the page timeout"
    ))
}

/// Launches one headless Chromium instance per `launch` call.
pub struct ChromiumLauncher {
    executable: String,
}

impl ChromiumLauncher {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

#[async_trait]
impl EngineLauncher for ChromiumLauncher {
    async fn launch(&self) -> anyhow::Result<Arc<dyn BrowserEngine>> {
        Ok(Arc::new(ChromiumEngine::launch(&self.executable).await?))
    }
}

/// One long-lived headless Chromium instance.
pub struct ChromiumEngine {
    browser: Mutex<Browser>,
    event_loop: JoinHandle<()>,
}

impl ChromiumEngine {
    pub async fn launch(executable: &str) -> anyhow::Result<Self> {
        let config = BrowserConfig::builder()
            .chrome_executable(executable)
            .no_sandbox()
            .args(CHROMIUM_ARGS.to_vec())
            .build()
            .map_err(|e| anyhow::anyhow!(e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch chromium")?;

        // The handler stream must be drained for the browser to make progress.
        let event_loop = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(event_error) = event {
                    debug!(error = %event_error, "chromium event loop error");
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            event_loop,
        })
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn open_page(&self) -> Result<Box<dyn EnginePage>, EngineError> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(engine_error)?;
        Ok(Box::new(ChromiumPage {
            page,
            default_timeout: DEFAULT_OPERATION_TIMEOUT,
        }))
    }

    async fn close(&self) -> Result<(), EngineError> {
        let mut browser = self.browser.lock().await;
        browser.close().await.map_err(engine_error)?;
        browser.wait().await.map_err(engine_error)?;
        self.event_loop.abort();
        Ok(())
    }
}

struct ChromiumPage {
    page: Page,
    default_timeout: Duration,
}

#[async_trait]
impl EnginePage for ChromiumPage {
    async fn prepare(&mut self, settings: &PageSettings) -> Result<(), EngineError> {
        self.default_timeout = settings.default_timeout;

        self.page
            .set_user_agent(settings.user_agent.as_str())
            .await
            .map_err(engine_error)?;

        self.page
            .execute(SetCacheDisabledParams::new(true))
            .await
            .map_err(engine_error)?;

        let (width, height) = settings.viewport;
        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(width as i64)
            .height(height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(EngineError::Engine)?;
        self.page.execute(metrics).await.map_err(engine_error)?;

        if !settings.http_headers.is_empty() {
            let headers =
                serde_json::to_value(&settings.http_headers).map_err(engine_error)?;
            self.page
                .execute(SetExtraHttpHeadersParams::new(Headers::new(headers)))
                .await
                .map_err(engine_error)?;
        }

        Ok(())
    }

    async fn navigate(
        &mut self,
        endpoint: &str,
        timeout_after: Duration,
        cancel: &CancellationToken,
    ) -> Result<PageMetadata, EngineError> {
        // Subscribe before navigating so the document response is not missed.
        let mut responses = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(engine_error)?;

        let (metadata_tx, metadata_rx) = tokio::sync::oneshot::channel();
        let capture = tokio::spawn(async move {
            let mut sender = Some(metadata_tx);
            while let Some(event) = responses.next().await {
                // Redirect hops surface on the request side; the first
                // document response is the final one.
                if event.r#type != ResourceType::Document {
                    continue;
                }
                if let Some(sender) = sender.take() {
                    let _ = sender.send(document_metadata(&event));
                }
                break;
            }
        });

        let navigation = async {
            self.page.goto(endpoint).await.map_err(engine_error)?;
            self.page
                .wait_for_navigation()
                .await
                .map_err(engine_error)?;
            Ok::<(), EngineError>(())
        };

        let navigated = tokio::select! {
            outcome = timeout(timeout_after, navigation) => match outcome {
                Ok(outcome) => outcome,
                Err(_) => Err(EngineError::NavigationTimeout(
                    timeout_after.as_millis() as u64,
                )),
            },
            _ = cancel.cancelled() => Err(EngineError::Aborted),
        };

        let metadata = match navigated {
            Ok(()) => match timeout(METADATA_GRACE, metadata_rx).await {
                Ok(Ok(metadata)) => Ok(metadata),
                _ => Err(EngineError::Engine(
                    "navigation completed but no document response was observed".to_string(),
                )),
            },
            Err(navigate_error) => Err(navigate_error),
        };

        capture.abort();
        metadata
    }

    async fn rendered_content(&mut self) -> Result<Vec<u8>, EngineError> {
        let content = timeout(self.default_timeout, self.page.content())
            .await
            .map_err(|_| operation_timed_out("reading the rendered content"))?
            .map_err(engine_error)?;
        Ok(content.into_bytes())
    }

    async fn screenshot_jpeg(&mut self, quality: u8) -> Result<Vec<u8>, EngineError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Jpeg)
            .quality(quality as i64)
            .build();
        timeout(self.default_timeout, self.page.screenshot(params))
            .await
            .map_err(|_| operation_timed_out("capturing the screenshot"))?
            .map_err(engine_error)
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        self.page.clone().close().await.map_err(engine_error)
    }
}

fn document_metadata(event: &EventResponseReceived) -> PageMetadata {
    let http_headers = event
        .response
        .headers
        .inner()
        .as_object()
        .map(|headers| {
            headers
                .iter()
                .map(|(name, value)| {
                    (name.clone(), value.as_str().unwrap_or_default().to_string())
                })
                .collect()
        })
        .unwrap_or_default();

    PageMetadata {
        http_code: event.response.status as u16,
        http_headers,
        remote_ip_address: event.response.remote_ip_address.clone(),
    }
}
