//! Fallback to the operating system's resolver.

use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

use super::{Upstream, with_timeout};
use crate::error::ResolveError;
use crate::record::{OVERRIDE_TTL_SECS, Record};

/// Resolves via `getaddrinfo` through `tokio::net::lookup_host`.
///
/// The OS gives no TTL, so answers are kept for a fixed period.
pub struct SystemUpstream {
    timeout: Duration,
}

impl SystemUpstream {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Keep the distinct IPv4 addresses in lookup order. A host with only IPv6
/// addresses has no `A` answer and becomes an empty failure.
fn into_record(domain: &str, addrs: impl IntoIterator<Item = IpAddr>) -> Record {
    let mut records: Vec<IpAddr> = Vec::new();
    for ip in addrs.into_iter().filter(IpAddr::is_ipv4) {
        if !records.contains(&ip) {
            records.push(ip);
        }
    }
    Record::resolved(domain, records, OVERRIDE_TTL_SECS.into())
}

#[async_trait]
impl Upstream for SystemUpstream {
    async fn query(&self, domain: &str) -> Record {
        let lookup = async {
            let addrs = tokio::net::lookup_host((domain, 0)).await?;
            Ok::<_, ResolveError>(addrs.map(|a| a.ip()).collect::<Vec<_>>())
        };

        match with_timeout(self.timeout, lookup).await {
            Ok(addrs) => into_record(domain, addrs),
            Err(e) => {
                debug!(domain, error = %e, "system lookup failed");
                Record::failed(domain, e)
            }
        }
    }

    fn name(&self) -> &'static str {
        "system"
    }
}
