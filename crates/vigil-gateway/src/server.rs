//! Axum server exposing the page-execution RPC.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use vigil_browser::BrowserPool;
use vigil_core::types::{HttpRequest, HttpResponse};

/// Shared gateway state.
pub struct GatewayState {
    pub pool: BrowserPool,
}

/// Start the gateway HTTP server, serving until ctrl-c.
pub async fn start_gateway(state: Arc<GatewayState>, bind: &str, port: u16) -> anyhow::Result<()> {
    let app = router(state);

    let addr = format!("{bind}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Routes, separated out so tests can serve them on an ephemeral port.
pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/v1/execute-http-request", post(execute_http_request))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The single unary RPC: always a well-formed response, never a fault
/// status. Callers distinguish success from failure solely via the
/// response's `error` field.
async fn execute_http_request(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<HttpRequest>,
) -> Json<HttpResponse> {
    #[cfg(feature = "metrics")]
    let started = std::time::Instant::now();

    let response = state
        .pool
        .get_browser()
        .fetch_page(request, CancellationToken::new())
        .await;

    #[cfg(feature = "metrics")]
    crate::metrics::record_fetch(&response, started.elapsed().as_secs_f64());

    Json(response)
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "browsers": state.pool.len(),
    }))
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Shutdown signal received");
}
