//! Upstream resolvers.
//!
//! Every upstream answers a domain with a [`Record`], successful or not. A
//! failure is data, never an `Err` or a panic, so single-flight waiters are
//! always released with something to cache.

mod doh;
mod httpdns;
mod system;

pub use doh::DohJsonUpstream;
pub use httpdns::HttpDnsUpstream;
pub use system::SystemUpstream;

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::ResolveError;
use crate::record::Record;

/// Anything that can resolve a domain to A records.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Resolve `domain` (normalized, no trailing dot).
    async fn query(&self, domain: &str) -> Record;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<U: Upstream + ?Sized> Upstream for Arc<U> {
    async fn query(&self, domain: &str) -> Record {
        (**self).query(domain).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Tries `primary`, and `secondary` only when the primary answer failed.
pub struct Fallback<P, S> {
    primary: P,
    secondary: S,
}

impl<P, S> Fallback<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl<P, S> Upstream for Fallback<P, S>
where
    P: Upstream,
    S: Upstream,
{
    async fn query(&self, domain: &str) -> Record {
        let record = self.primary.query(domain).await;
        match &record.failure {
            None => record,
            Some(e) => {
                debug!(
                    domain,
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    error = %e,
                    "primary upstream failed, falling back"
                );
                self.secondary.query(domain).await
            }
        }
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}

/// Build the shared HTTP client for the HTTP-based upstreams.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ResolveError> {
    Ok(reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(timeout)
        .pool_max_idle_per_host(4)
        .build()?)
}

/// Bound `fut` by `timeout` regardless of what the client enforces itself.
pub(crate) async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T, ResolveError>
where
    F: Future<Output = Result<T, ResolveError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| ResolveError::Timeout(timeout))?
}
