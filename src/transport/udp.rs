//! UDP transport for DNS queries.
//!
//! One receive loop; every parsed query is resolved on its own task so a
//! slow upstream never holds up queries for other domains.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{MAX_DNS_PACKET_SIZE, log_query, log_unsupported};
use crate::dns::{DnsQuery, DnsResponse};
use crate::resolver::Resolver;
use crate::stats::Stats;

/// UDP transport for the DNS proxy.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Bind the listening socket.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);

        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Start the receive loop; it exits when `shutdown` is cancelled.
    pub fn start(
        self,
        resolver: Arc<Resolver>,
        stats: Arc<Stats>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(run(self.socket, resolver, stats, shutdown))
    }
}

async fn run(
    socket: Arc<UdpSocket>,
    resolver: Arc<Resolver>,
    stats: Arc<Stats>,
    shutdown: CancellationToken,
) {
    let mut buf = [0u8; MAX_DNS_PACKET_SIZE];

    loop {
        let (len, src) = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("UDP transport: shutting down");
                return;
            }
            result = socket.recv_from(&mut buf) => match result {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "UDP recv error");
                    continue;
                }
            },
        };

        let Some(query) = DnsQuery::parse(&buf[..len]) else {
            debug!(client = %src, len, "dropping malformed query");
            continue;
        };

        tokio::spawn(handle_query(
            Arc::clone(&socket),
            Arc::clone(&resolver),
            Arc::clone(&stats),
            query,
            src,
        ));
    }
}

async fn handle_query(
    socket: Arc<UdpSocket>,
    resolver: Arc<Resolver>,
    stats: Arc<Stats>,
    query: DnsQuery,
    src: SocketAddr,
) {
    let start = Instant::now();

    if !query.wants_a() {
        let response = DnsResponse::new(&query, &[]).to_bytes();
        if let Err(e) = socket.send_to(&response, src).await {
            warn!(client = %src, domain = %query.domain, error = %e, "UDP response error");
        }
        let elapsed = start.elapsed();
        stats.record_unsupported(elapsed);
        log_unsupported(src, resolver.cache_len(), &query.domain, query.qtype, elapsed);
        return;
    }

    let resolution = resolver.resolve(&query.domain).await;
    let answers = resolution.answers(Instant::now());
    let response = DnsResponse::new(&query, &answers).to_bytes();

    if let Err(e) = socket.send_to(&response, src).await {
        warn!(client = %src, domain = %query.domain, error = %e, "UDP response error");
    }

    let elapsed = start.elapsed();
    stats.record(resolution.source, resolution.record.is_failure(), elapsed);
    log_query(src, resolver.cache_len(), &query.domain, &resolution, elapsed);
}
