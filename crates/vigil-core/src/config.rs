//! Configuration loading and validation.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level Vigil browser-service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Number of browser instances the pool launches at startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_browsers: Option<usize>,

    /// Pages allowed open at once on a single browser instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_pages_per_browser: Option<usize>,

    /// Path to the Chromium binary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chromium_executable: Option<String>,

    /// Fetch a known-good URL through every handle after pool creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_self_test: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_test_url: Option<String>,
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::VigilError::Io)?;
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::VigilError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Gateway bind address.
    pub fn gateway_bind(&self) -> String {
        self.gateway
            .as_ref()
            .and_then(|g| g.bind.clone())
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    /// Gateway port.
    pub fn gateway_port(&self) -> u16 {
        self.gateway.as_ref().and_then(|g| g.port).unwrap_or(50051)
    }

    /// Number of browser instances in the pool.
    pub fn max_concurrent_browsers(&self) -> usize {
        self.browser
            .as_ref()
            .and_then(|b| b.max_concurrent_browsers)
            .unwrap_or(2)
    }

    /// Pages allowed open at once per browser instance.
    pub fn max_concurrent_pages_per_browser(&self) -> usize {
        self.browser
            .as_ref()
            .and_then(|b| b.max_concurrent_pages_per_browser)
            .unwrap_or(40)
    }

    /// Chromium binary path.
    pub fn chromium_executable(&self) -> String {
        self.browser
            .as_ref()
            .and_then(|b| b.chromium_executable.clone())
            .unwrap_or_else(|| "/usr/bin/chromium".to_string())
    }

    /// Whether to fetch a known-good URL through every handle at startup.
    pub fn startup_self_test(&self) -> bool {
        self.browser
            .as_ref()
            .and_then(|b| b.startup_self_test)
            .unwrap_or(true)
    }

    /// URL used by the startup self-test.
    pub fn self_test_url(&self) -> String {
        self.browser
            .as_ref()
            .and_then(|b| b.self_test_url.clone())
            .unwrap_or_else(|| "https://www.google.com".to_string())
    }
}

fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}
