//! DNS proxy orchestration.
//!
//! Builds the shared components, binds the transport and runs the proxy
//! until Ctrl-C.

use clap::ValueEnum;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::RecordCache;
use crate::dedup::Group;
use crate::error::ResolveError;
use crate::hosts::{HostReloadJob, HostTable, Hosts};
use crate::resolver::Resolver;
use crate::stats::Stats;
use crate::transport::udp::UdpTransport;
use crate::upstream::{DohJsonUpstream, Fallback, HttpDnsUpstream, SystemUpstream, Upstream};

/// Which upstream answers cache misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UpstreamKind {
    /// DNS-over-HTTPS JSON API
    Doh,
    /// Plaintext HTTP DNS service
    Httpdns,
    /// Operating system resolver
    System,
}

/// Configuration for the DNS proxy.
pub struct ProxyConfig {
    /// Local address to bind (e.g., 0.0.0.0:53)
    pub bind_addr: SocketAddr,
    /// Hosts files, earlier files win on conflicts
    pub hosts_files: Vec<PathBuf>,
    pub upstream: UpstreamKind,
    /// Retry failed upstream answers through the OS resolver
    pub fallback_system: bool,
    pub upstream_timeout: Duration,
    pub reload_interval: Duration,
    pub doh_url: String,
    pub httpdns_url: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 53)),
            hosts_files: vec![PathBuf::from("/etc/hosts")],
            upstream: UpstreamKind::Httpdns,
            fallback_system: false,
            upstream_timeout: Duration::from_secs(3),
            reload_interval: Duration::from_secs(5),
            doh_url: DohJsonUpstream::DEFAULT_URL.to_string(),
            httpdns_url: HttpDnsUpstream::DEFAULT_URL.to_string(),
        }
    }
}

/// Build the configured upstream, wrapped in a system fallback if asked.
pub fn build_upstream(config: &ProxyConfig) -> Result<Arc<dyn Upstream>, ResolveError> {
    let timeout = config.upstream_timeout;
    let primary: Arc<dyn Upstream> = match config.upstream {
        UpstreamKind::Doh => Arc::new(DohJsonUpstream::new(config.doh_url.clone(), timeout)?),
        UpstreamKind::Httpdns => {
            Arc::new(HttpDnsUpstream::new(config.httpdns_url.clone(), timeout)?)
        }
        UpstreamKind::System => Arc::new(SystemUpstream::new(timeout)),
    };

    if config.fallback_system && config.upstream != UpstreamKind::System {
        return Ok(Arc::new(Fallback::new(primary, SystemUpstream::new(timeout))));
    }
    Ok(primary)
}

/// Run the DNS proxy with the given configuration.
///
/// Returns an error if the listener cannot be bound; otherwise runs until
/// Ctrl-C, then stops the background tasks.
pub async fn run(config: ProxyConfig) -> io::Result<()> {
    let udp = UdpTransport::bind(config.bind_addr).await?;
    let upstream = build_upstream(&config).map_err(io::Error::other)?;

    let shutdown = CancellationToken::new();
    let hosts = Arc::new(HostTable::new(Hosts::load(&config.hosts_files[..])));
    let cache = RecordCache::start(shutdown.child_token());
    let resolver = Arc::new(Resolver::new(
        Arc::clone(&hosts),
        cache,
        Arc::new(Group::new()),
        upstream,
    ));
    let stats = Arc::new(Stats::new());

    info!(
        bind = %config.bind_addr,
        upstream = resolver.upstream_name(),
        overrides = resolver.override_count(),
        "DNS proxy listening"
    );

    HostReloadJob::new(hosts, config.hosts_files)
        .with_interval(config.reload_interval)
        .with_cancellation(shutdown.child_token())
        .start();
    let transport = udp.start(
        Arc::clone(&resolver),
        Arc::clone(&stats),
        shutdown.child_token(),
    );

    // Print stats every minute
    let stats_shutdown = shutdown.child_token();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        interval.tick().await; // Skip first immediate tick
        loop {
            tokio::select! {
                _ = stats_shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            let snapshot = stats.snapshot_and_reset();
            info!(
                cache = resolver.cache_len(),
                requests = snapshot.requests,
                overrides = snapshot.overrides,
                cached = snapshot.cached,
                upstream = snapshot.upstream,
                failed = snapshot.failed,
                unsupported = snapshot.unsupported,
                avg_response_ms = snapshot.avg_response_ms,
                "stats"
            );
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    shutdown.cancel();
    join_task("UDP transport", transport).await;

    Ok(())
}

/// Wait for a background task, logging instead of propagating a panic.
async fn join_task(name: &str, handle: JoinHandle<()>) {
    if let Err(e) = handle.await {
        warn!(task = name, error = %e, "background task failed");
    }
}
