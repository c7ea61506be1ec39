//! Scripted fake engine and resolver shared by the integration tests.
#![allow(dead_code)] // not every test binary uses every helper

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use vigil_browser::dns::DnsResolver;
use vigil_browser::engine::{
    BrowserEngine, EngineError, EngineLauncher, EnginePage, PageMetadata, PageSettings,
};

/// What the fake navigation does once its delay elapses.
#[derive(Clone, Copy)]
pub enum NavigateOutcome {
    Respond { status: u16 },
    FailWith(&'static str),
}

/// Scripted behavior for every page an engine opens.
#[derive(Clone, Copy)]
pub struct FakeScript {
    pub navigate: NavigateOutcome,
    pub navigation_delay: Duration,
    pub open_page_failure: Option<&'static str>,
    pub content_failure: Option<&'static str>,
    pub screenshot_failure: Option<&'static str>,
    pub close_failure: Option<&'static str>,
    pub remote_ip: &'static str,
}

impl Default for FakeScript {
    fn default() -> Self {
        Self {
            navigate: NavigateOutcome::Respond { status: 200 },
            navigation_delay: Duration::ZERO,
            open_page_failure: None,
            content_failure: None,
            screenshot_failure: None,
            close_failure: None,
            remote_ip: "93.184.216.34",
        }
    }
}

/// Counters observed by the tests, shared across all engines a launcher
/// produces.
#[derive(Default)]
pub struct FakeStats {
    pub open_pages: AtomicUsize,
    pub max_open_pages: AtomicUsize,
    pub pages_closed: AtomicUsize,
    pub engines_closed: AtomicUsize,
    pub navigations: AtomicUsize,
    pub last_settings: Mutex<Option<PageSettings>>,
}

pub struct FakeEngine {
    id: usize,
    script: FakeScript,
    stats: Arc<FakeStats>,
}

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn open_page(&self) -> Result<Box<dyn EnginePage>, EngineError> {
        if let Some(message) = self.script.open_page_failure {
            return Err(EngineError::Engine(message.to_string()));
        }
        let open = self.stats.open_pages.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_open_pages.fetch_max(open, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            engine_id: self.id,
            script: self.script,
            stats: self.stats.clone(),
            closed: false,
        }))
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.stats.engines_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakePage {
    engine_id: usize,
    script: FakeScript,
    stats: Arc<FakeStats>,
    closed: bool,
}

#[async_trait]
impl EnginePage for FakePage {
    async fn prepare(&mut self, settings: &PageSettings) -> Result<(), EngineError> {
        *self.stats.last_settings.lock().unwrap() = Some(settings.clone());
        Ok(())
    }

    async fn navigate(
        &mut self,
        _endpoint: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<PageMetadata, EngineError> {
        self.stats.navigations.fetch_add(1, Ordering::SeqCst);
        let load = tokio::time::sleep(self.script.navigation_delay);
        let deadline = tokio::time::sleep(timeout);
        tokio::select! {
            _ = cancel.cancelled() => Err(EngineError::Aborted),
            _ = deadline => Err(EngineError::NavigationTimeout(timeout.as_millis() as u64)),
            _ = load => match self.script.navigate {
                NavigateOutcome::Respond { status } => Ok(PageMetadata {
                    http_code: status,
                    http_headers: HashMap::from([
                        ("content-type".to_string(), "text/html".to_string()),
                        ("x-engine-id".to_string(), self.engine_id.to_string()),
                    ]),
                    remote_ip_address: Some(self.script.remote_ip.to_string()),
                }),
                NavigateOutcome::FailWith(message) => {
                    Err(EngineError::Engine(message.to_string()))
                }
            },
        }
    }

    async fn rendered_content(&mut self) -> Result<Vec<u8>, EngineError> {
        match self.script.content_failure {
            Some(message) => Err(EngineError::Engine(message.to_string())),
            None => Ok(b"<html><body>ok</body></html>".to_vec()),
        }
    }

    async fn screenshot_jpeg(&mut self, _quality: u8) -> Result<Vec<u8>, EngineError> {
        match self.script.screenshot_failure {
            Some(message) => Err(EngineError::Engine(message.to_string())),
            None => Ok(vec![0xff, 0xd8, 0xff, 0xe0]),
        }
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        if !self.closed {
            self.closed = true;
            self.stats.open_pages.fetch_sub(1, Ordering::SeqCst);
            self.stats.pages_closed.fetch_add(1, Ordering::SeqCst);
        }
        match self.script.close_failure {
            Some(message) => Err(EngineError::Engine(message.to_string())),
            None => Ok(()),
        }
    }
}

/// Launches scripted engines, optionally failing a specific launch.
pub struct FakeLauncher {
    script: FakeScript,
    pub stats: Arc<FakeStats>,
    launched: AtomicUsize,
    fail_launch_number: Option<usize>,
}

impl FakeLauncher {
    pub fn new(script: FakeScript) -> Self {
        Self {
            script,
            stats: Arc::new(FakeStats::default()),
            launched: AtomicUsize::new(0),
            fail_launch_number: None,
        }
    }

    /// Fail the nth launch (1-based) instead of producing an engine.
    pub fn failing_on(script: FakeScript, launch_number: usize) -> Self {
        Self {
            fail_launch_number: Some(launch_number),
            ..Self::new(script)
        }
    }
}

#[async_trait]
impl EngineLauncher for FakeLauncher {
    async fn launch(&self) -> anyhow::Result<Arc<dyn BrowserEngine>> {
        let id = self.launched.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_launch_number == Some(id) {
            anyhow::bail!("engine launch {id} failed");
        }
        Ok(Arc::new(FakeEngine {
            id,
            script: self.script,
            stats: self.stats.clone(),
        }))
    }
}

/// Resolver returning a fixed address list, or failing when given none.
pub struct FakeResolver {
    addresses: Option<Vec<&'static str>>,
}

impl FakeResolver {
    pub fn with_addresses(addresses: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            addresses: Some(addresses),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { addresses: None })
    }
}

#[async_trait]
impl DnsResolver for FakeResolver {
    async fn resolve(&self, host: &str) -> anyhow::Result<Vec<String>> {
        match &self.addresses {
            Some(addresses) => Ok(addresses.iter().map(|ip| ip.to_string()).collect()),
            None => anyhow::bail!("resolution failed for {host}"),
        }
    }
}
