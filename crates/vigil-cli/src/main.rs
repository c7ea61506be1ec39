use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use vigil_browser::chromium::ChromiumLauncher;
use vigil_browser::dns::{DnsResolver, HickoryDnsResolver};
use vigil_browser::{BrowserOptions, BrowserPool};
use vigil_core::config::Config;
use vigil_core::types::{HttpRequest, HttpResponse};
use vigil_gateway::GatewayState;

#[derive(Parser)]
#[command(
    name = "vigil-browser",
    about = "Rendered-page execution service for Vigil uptime monitoring",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the browser pool and the gateway server
    Serve {
        /// Port to listen on (default: 50051)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Fetch a single endpoint and print the response as JSON
    Check {
        /// URL to fetch
        url: String,

        /// Navigation timeout in milliseconds
        #[arg(long, default_value_t = 10_000)]
        timeout_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("vigil.json5"));
    let config = Config::load(&config_path)?;

    match cli.command {
        Commands::Serve { port } => serve(&config, port).await,
        Commands::Check { url, timeout_ms } => check(&config, url, timeout_ms).await,
    }
}

async fn serve(config: &Config, port: Option<u16>) -> anyhow::Result<()> {
    #[cfg(feature = "metrics")]
    let _prometheus = vigil_gateway::metrics::install_prometheus_recorder();

    let port = port.unwrap_or_else(|| config.gateway_port());

    tracing::info!("Initializing browser pool");
    let pool = create_pool(config, config.max_concurrent_browsers()).await?;

    if config.startup_self_test() {
        pool.self_test(&config.self_test_url()).await;
    }

    let state = Arc::new(GatewayState { pool });
    vigil_gateway::start_gateway(state.clone(), &config.gateway_bind(), port).await?;

    state.pool.close().await;
    Ok(())
}

async fn check(config: &Config, url: String, timeout_ms: u64) -> anyhow::Result<()> {
    let pool = create_pool(config, 1).await?;

    let response = pool
        .get_browser()
        .fetch_page(
            HttpRequest {
                endpoint: url,
                request_timeout_ms: timeout_ms,
                http_headers: HashMap::new(),
            },
            CancellationToken::new(),
        )
        .await;

    pool.close().await;
    println!("{}", render_response(&response)?);
    Ok(())
}

async fn create_pool(config: &Config, num_browsers: usize) -> anyhow::Result<BrowserPool> {
    let launcher = ChromiumLauncher::new(config.chromium_executable());
    let resolver: Arc<dyn DnsResolver> = Arc::new(HickoryDnsResolver::new());
    BrowserPool::create(
        num_browsers,
        BrowserOptions {
            max_open_pages: config.max_concurrent_pages_per_browser(),
        },
        &launcher,
        resolver,
    )
    .await
}

/// Pretty-print a response, eliding the screenshot to its byte length.
fn render_response(response: &HttpResponse) -> anyhow::Result<String> {
    let mut value = serde_json::to_value(response)?;
    if let Some(screenshot) = response.screenshot.as_ref() {
        value["screenshot"] = serde_json::json!({
            "content_type": screenshot.content_type,
            "size_bytes": screenshot.data.len(),
        });
    }
    Ok(serde_json::to_string_pretty(&value)?)
}
