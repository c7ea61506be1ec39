//! Round-robin pool of browser handles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vigil_core::types::HttpRequest;

use crate::dns::DnsResolver;
use crate::engine::EngineLauncher;
use crate::handle::BrowserHandle;

const SELF_TEST_TIMEOUT_MS: u64 = 10_000;

/// Per-instance pool options.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Pages allowed open at once on a single instance.
    pub max_open_pages: usize,
}

/// A fixed set of browser handles with round-robin dispatch.
///
/// Handles are provisioned once at creation and live until `close`. The
/// dispatch cursor is the only pool-wide mutable state; round-robin spreads
/// load across instances, while per-fetch admission control lives in each
/// handle's gate.
pub struct BrowserPool {
    handles: Vec<BrowserHandle>,
    next_handle: AtomicUsize,
}

impl BrowserPool {
    /// Launch `num_browsers` instances concurrently and wrap each in a
    /// handle. Any launch failure fails pool creation as a whole.
    pub async fn create(
        num_browsers: usize,
        options: BrowserOptions,
        launcher: &dyn EngineLauncher,
        resolver: Arc<dyn DnsResolver>,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(num_browsers > 0, "the pool needs at least one browser instance");
        info!(
            num_browsers,
            max_open_pages = options.max_open_pages,
            "Creating browser pool"
        );

        let engines = try_join_all((0..num_browsers).map(|_| launcher.launch())).await?;
        let handles = engines
            .into_iter()
            .map(|engine| BrowserHandle::new(engine, resolver.clone(), options.max_open_pages))
            .collect();

        Ok(Self {
            handles,
            next_handle: AtomicUsize::new(0),
        })
    }

    /// Next handle in round-robin order. Safe to call from many tasks at
    /// once; every cursor value has exactly one winner.
    pub fn get_browser(&self) -> &BrowserHandle {
        let index = self.next_handle.fetch_add(1, Ordering::SeqCst) % self.handles.len();
        &self.handles[index]
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Fetch a known-good URL through every handle, logging outcomes.
    /// Failures are logged, never raised.
    pub async fn self_test(&self, url: &str) {
        info!("Testing all browsers in the pool");
        for handle in &self.handles {
            let response = handle
                .fetch_page(
                    HttpRequest {
                        endpoint: url.to_string(),
                        request_timeout_ms: SELF_TEST_TIMEOUT_MS,
                        http_headers: HashMap::new(),
                    },
                    CancellationToken::new(),
                )
                .await;
            info!(
                http_code = ?response.http_code,
                error = ?response.error,
                error_message = ?response.error_message,
                "Browser self-test completed"
            );
        }
    }

    /// Close every underlying browser instance concurrently.
    pub async fn close(&self) {
        let closings = join_all(self.handles.iter().map(|handle| handle.engine().close())).await;
        for closed in closings {
            if let Err(close_error) = closed {
                warn!(error = %close_error, "failed to close a browser instance");
            }
        }
    }
}
