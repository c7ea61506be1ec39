//! Per-instance admission control for open pages.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tracing::warn;

/// Seconds of waiting after which a stall warning is emitted.
const STALL_WARNING_SECS: [u64; 2] = [30, 60];

/// Counting permit set bounding how many pages may be open concurrently on
/// one browser instance.
///
/// Waiting has no hard timeout: slow callers queue rather than fail, and
/// operators are warned once the wait gets long.
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Acquire one permit, warning after 30 and 60 seconds of waiting.
    ///
    /// Only errors when the semaphore is closed, which never happens while
    /// the owning handle is alive.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        let acquire = self.permits.clone().acquire_owned();
        tokio::pin!(acquire);

        let mut waited = 0;
        for stall_at in STALL_WARNING_SECS {
            match timeout(Duration::from_secs(stall_at - waited), &mut acquire).await {
                Ok(permit) => return permit,
                Err(_) => {
                    waited = stall_at;
                    warn!(
                        waited_secs = stall_at,
                        "A fetch has been blocked for {stall_at} seconds waiting for a browser \
                         permit. Raise max_concurrent_pages_per_browser to allow more \
                         concurrent pages."
                    );
                }
            }
        }

        acquire.await
    }
}
