//! DNS query resolution logic.
//!
//! Handles the core query processing pipeline:
//! 1. Static overrides from hosts files
//! 2. Cache lookup
//! 3. Upstream resolution, one in flight per domain, written back to the cache
//!
//! Transports handle the actual I/O, the resolver handles decisions.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tokio::time::Instant;

use crate::cache::RecordCache;
use crate::dedup::Group;
use crate::hosts::HostTable;
use crate::record::{Record, normalize};
use crate::upstream::Upstream;

/// Where a resolution came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Override,
    Cache,
    Upstream,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Override => "override",
            Source::Cache => "cache",
            Source::Upstream => "upstream",
        }
    }
}

/// The record answering one query, and how it was found.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub record: Arc<Record>,
    pub source: Source,
}

/// One `A` answer handed to the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub domain: String,
    pub addr: Ipv4Addr,
    pub ttl: u32,
}

impl Resolution {
    /// IPv4 answers with the TTL left at `now`. Failed records have none.
    pub fn answers(&self, now: Instant) -> Vec<Answer> {
        if self.record.is_failure() {
            return Vec::new();
        }
        let ttl = self.record.remaining_ttl(now);
        self.record
            .records
            .iter()
            .filter_map(|ip| match ip {
                IpAddr::V4(addr) => Some(Answer {
                    domain: self.record.domain.clone(),
                    addr: *addr,
                    ttl,
                }),
                IpAddr::V6(_) => None,
            })
            .collect()
    }
}

/// Resolver handles DNS query processing decisions.
///
/// Shared by every transport task; holds no per-query state.
pub struct Resolver {
    hosts: Arc<HostTable>,
    cache: Arc<RecordCache>,
    group: Arc<Group<String, Arc<Record>>>,
    upstream: Arc<dyn Upstream>,
}

impl Resolver {
    pub fn new(
        hosts: Arc<HostTable>,
        cache: Arc<RecordCache>,
        group: Arc<Group<String, Arc<Record>>>,
        upstream: Arc<dyn Upstream>,
    ) -> Self {
        Self {
            hosts,
            cache,
            group,
            upstream,
        }
    }

    /// Resolve `domain` to a record.
    ///
    /// Never fails: upstream errors come back as a negative record, which is
    /// cached like any other so repeated queries do not hammer upstream.
    pub async fn resolve(&self, domain: &str) -> Resolution {
        let domain = normalize(domain);

        if let Some(addr) = self.hosts.lookup(&domain) {
            return Resolution {
                record: Arc::new(Record::pinned(&domain, addr)),
                source: Source::Override,
            };
        }

        if let Some(record) = self.cache.get(&domain) {
            return Resolution {
                record,
                source: Source::Cache,
            };
        }

        let (upstream, cache, name) = (&self.upstream, &self.cache, domain.as_str());
        let record = self
            .group
            .work(&domain, || async move {
                let record = Arc::new(upstream.query(name).await);
                cache.put(Arc::clone(&record));
                record
            })
            .await;

        Resolution {
            record,
            source: Source::Upstream,
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn override_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn upstream_name(&self) -> &'static str {
        self.upstream.name()
    }
}
