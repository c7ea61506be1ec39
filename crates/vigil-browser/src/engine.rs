//! Browser engine capability surface.
//!
//! The pool and handles drive the engine through these traits so the fetch
//! protocol can be tested with a scripted fake (controlled status codes,
//! induced delays, induced failures) without launching a real browser.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Failure signals surfaced by an engine implementation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The page did not reach its load event within the navigation timeout.
    #[error("page load exceeded the {0}ms timeout")]
    NavigationTimeout(u64),

    /// The caller cancelled the fetch while the navigation was in flight.
    #[error("the navigation was aborted")]
    Aborted,

    /// Any other engine failure, carrying the raw description. For Chromium
    /// this includes the `net::ERR_*` signature the classifier matches on.
    #[error("{0}")]
    Engine(String),
}

/// Page settings applied before navigation.
#[derive(Debug, Clone)]
pub struct PageSettings {
    /// Default bound for every page operation, from the request timeout.
    pub default_timeout: Duration,
    pub user_agent: String,
    pub viewport: (u32, u32),
    /// Extra request headers, applied to every request the page issues.
    pub http_headers: HashMap<String, String>,
}

/// Metadata read from the navigation response.
#[derive(Debug, Clone)]
pub struct PageMetadata {
    pub http_code: u16,
    pub http_headers: HashMap<String, String>,
    /// Remote IP the socket actually connected to.
    pub remote_ip_address: Option<String>,
}

/// One long-lived browser instance.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Open a fresh page on this instance.
    async fn open_page(&self) -> Result<Box<dyn EnginePage>, EngineError>;

    /// Tear down the underlying browser instance.
    async fn close(&self) -> Result<(), EngineError>;
}

/// A single page on a browser instance.
#[async_trait]
pub trait EnginePage: Send {
    async fn prepare(&mut self, settings: &PageSettings) -> Result<(), EngineError>;

    /// Navigate to `endpoint` and wait for the load event, bounded by
    /// `timeout` and interruptible through `cancel`.
    async fn navigate(
        &mut self,
        endpoint: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<PageMetadata, EngineError>;

    /// Serialized rendered content of the current document.
    async fn rendered_content(&mut self) -> Result<Vec<u8>, EngineError>;

    async fn screenshot_jpeg(&mut self, quality: u8) -> Result<Vec<u8>, EngineError>;

    async fn close(&mut self) -> Result<(), EngineError>;
}

/// Launches engine instances for the pool.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(&self) -> anyhow::Result<Arc<dyn BrowserEngine>>;
}
