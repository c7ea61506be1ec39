//! DNS capability: resolve a hostname to its addresses.

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;

/// Resolves all A records for a hostname. Failures here are independent of
/// any fetch; callers fall back rather than treat them as fetch errors.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    async fn resolve(&self, host: &str) -> anyhow::Result<Vec<String>>;
}

/// Resolver backed by hickory-dns with the default upstream configuration.
pub struct HickoryDnsResolver {
    resolver: TokioAsyncResolver,
}

impl HickoryDnsResolver {
    pub fn new() -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(
                ResolverConfig::default(),
                ResolverOpts::default(),
            ),
        }
    }
}

impl Default for HickoryDnsResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DnsResolver for HickoryDnsResolver {
    async fn resolve(&self, host: &str) -> anyhow::Result<Vec<String>> {
        let lookup = self.resolver.ipv4_lookup(host).await?;
        Ok(lookup.iter().map(|record| record.to_string()).collect())
    }
}
