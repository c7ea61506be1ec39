//! One browser instance plus its admission gate: the fetch protocol.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use url::Url;

use vigil_core::types::{HttpErrorKind, HttpRequest, HttpResponse, Screenshot};

use crate::classifier::classify;
use crate::dns::DnsResolver;
use crate::engine::{BrowserEngine, EngineError, EnginePage, PageSettings};
use crate::gate::AdmissionGate;

/// Fixed desktop user-agent presented to endpoints.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                              (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Viewport applied to every page.
pub const VIEWPORT: (u32, u32) = (1280, 800);

const SCREENSHOT_JPEG_QUALITY: u8 = 80;

/// A long-lived browser instance with its admission gate.
///
/// Created once at pool construction, destroyed only at pool shutdown;
/// never recreated lazily. The gate's permit count is the only mutable
/// state shared across concurrent fetches on this handle.
pub struct BrowserHandle {
    engine: Arc<dyn BrowserEngine>,
    gate: AdmissionGate,
    resolver: Arc<dyn DnsResolver>,
}

impl BrowserHandle {
    pub(crate) fn new(
        engine: Arc<dyn BrowserEngine>,
        resolver: Arc<dyn DnsResolver>,
        max_open_pages: usize,
    ) -> Self {
        Self {
            engine,
            gate: AdmissionGate::new(max_open_pages),
            resolver,
        }
    }

    pub(crate) fn engine(&self) -> &Arc<dyn BrowserEngine> {
        &self.engine
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Fetch `endpoint` through this instance and report everything
    /// observed: status, headers, timing, addresses, rendered content and a
    /// screenshot.
    ///
    /// Total: every failure is recovered into the response's `error` fields,
    /// never propagated. Evidence captured before a late failure is
    /// preserved. The permit is released exactly once on every exit path,
    /// including when opening the page itself fails.
    pub async fn fetch_page(
        &self,
        request: HttpRequest,
        cancel: CancellationToken,
    ) -> HttpResponse {
        let permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            // The gate only closes when the handle is torn down mid-call.
            Err(_) => {
                return HttpResponse::from_error(
                    HttpErrorKind::Unknown,
                    "the browser instance is shutting down",
                );
            }
        };

        let mut response = HttpResponse::default();
        let mut page: Option<Box<dyn EnginePage>> = None;

        let fetched = self
            .run_fetch(&request, &cancel, &mut response, &mut page)
            .await;

        if let Err(fetch_error) = fetched {
            let classification = classify(&fetch_error);
            if classification.is_recognized() {
                debug!(
                    endpoint = %request.endpoint,
                    error = %fetch_error,
                    "recognized failure while fetching a page"
                );
            } else {
                error!(
                    endpoint = %request.endpoint,
                    error = %fetch_error,
                    "unrecognized failure while fetching a page"
                );
            }
            response.set_error(classification.kind, classification.message);
        }

        // Best-effort close; a close failure takes priority for visibility.
        if let Some(mut page) = page {
            if let Err(close_error) = page.close().await {
                error!(
                    endpoint = %request.endpoint,
                    error = %close_error,
                    "error while closing a page"
                );
                response.set_error(
                    HttpErrorKind::Unknown,
                    "An unknown error occurred while closing the page",
                );
            }
        }

        drop(permit);
        response
    }

    /// Steps 2–5 of the fetch: open, configure, navigate, collect evidence.
    /// Populates `response` incrementally so a late failure leaves earlier
    /// evidence in place; `page_slot` hands the page back for cleanup even
    /// when a step fails.
    async fn run_fetch(
        &self,
        request: &HttpRequest,
        cancel: &CancellationToken,
        response: &mut HttpResponse,
        page_slot: &mut Option<Box<dyn EnginePage>>,
    ) -> Result<(), EngineError> {
        let timeout = Duration::from_millis(request.request_timeout_ms);
        let page = page_slot.insert(self.engine.open_page().await?);

        page.prepare(&PageSettings {
            default_timeout: timeout,
            user_agent: USER_AGENT.to_string(),
            viewport: VIEWPORT,
            http_headers: request.http_headers.clone(),
        })
        .await?;

        // The measured window covers navigation only, not permit-wait, and
        // is recorded whether or not the navigation succeeded.
        let started = Instant::now();
        let navigated = page.navigate(&request.endpoint, timeout, cancel).await;
        response.response_time_ms = started.elapsed().as_millis() as u64;
        let metadata = navigated?;

        response.http_headers = metadata.http_headers;
        response.response_ip_address = metadata.remote_ip_address;
        response.http_code = Some(metadata.http_code);
        if metadata.http_code >= 400 {
            // A bad status is an error, but evidence collection continues.
            response.set_error(
                HttpErrorKind::HttpCode,
                format!("Invalid HTTP code {}", metadata.http_code),
            );
        }

        let body = page.rendered_content().await?;
        response.response_body_size_bytes = body.len() as u64;
        response.response_body_content = Some(body);

        let screenshot = page.screenshot_jpeg(SCREENSHOT_JPEG_QUALITY).await?;
        response.screenshot = Some(Screenshot::jpeg(screenshot));

        let connected_ip = response.response_ip_address.clone();
        response.resolved_ip_addresses = self
            .resolve_endpoint_addresses(&request.endpoint, connected_ip.as_deref())
            .await;

        Ok(())
    }

    /// Resolve all addresses for the endpoint's hostname. Resolution fails
    /// independently of the fetch: on error, fall back to the address the
    /// browser actually connected to.
    async fn resolve_endpoint_addresses(
        &self,
        endpoint: &str,
        connected_ip: Option<&str>,
    ) -> Vec<String> {
        let fallback = || connected_ip.iter().map(|ip| ip.to_string()).collect();

        let host = match Url::parse(endpoint)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
        {
            Some(host) => host,
            None => return fallback(),
        };

        match self.resolver.resolve(&host).await {
            Ok(addresses) => addresses,
            Err(resolve_error) => {
                debug!(
                    host = %host,
                    error = %resolve_error,
                    "error while resolving endpoint addresses"
                );
                fallback()
            }
        }
    }
}
