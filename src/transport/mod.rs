//! Transport layer for the DNS proxy.
//!
//! Receives DNS queries from clients, hands each one to the resolver on its
//! own task, and writes the encoded reply back.

pub mod udp;

/// Maximum size of a DNS packet (with some headroom).
pub const MAX_DNS_PACKET_SIZE: usize = 4096;

use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

use crate::resolver::Resolution;

/// Emit the per-query line: client, cache size, TTL or error, latency,
/// domain and answers.
pub fn log_query(
    client: SocketAddr,
    cache_len: usize,
    domain: &str,
    resolution: &Resolution,
    elapsed: Duration,
) {
    let latency_ms = elapsed.as_secs_f64() * 1000.0;
    let record = &resolution.record;
    match &record.failure {
        Some(e) => info!(
            client = %client.ip(),
            cache = cache_len,
            error = %e,
            latency_ms,
            domain,
            source = resolution.source.as_str(),
            "query failed"
        ),
        None => info!(
            client = %client.ip(),
            cache = cache_len,
            ttl = record.ttl_secs,
            latency_ms,
            domain,
            answers = ?record.records,
            source = resolution.source.as_str(),
            "query answered"
        ),
    }
}

/// Per-query line for a question answered empty without resolution.
pub fn log_unsupported(
    client: SocketAddr,
    cache_len: usize,
    domain: &str,
    qtype: u16,
    elapsed: Duration,
) {
    info!(
        client = %client.ip(),
        cache = cache_len,
        latency_ms = elapsed.as_secs_f64() * 1000.0,
        domain,
        qtype,
        "query type not resolved"
    );
}
