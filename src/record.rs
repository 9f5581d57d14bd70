//! Resolution records held by the cache.

use std::net::IpAddr;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::ResolveError;

/// Shortest TTL a record may carry, also used for negative entries.
pub const MIN_TTL_SECS: u32 = 3;
/// Longest TTL a record may carry.
pub const MAX_TTL_SECS: u32 = 3600;
/// TTL of answers synthesized from the static override table.
pub const OVERRIDE_TTL_SECS: u32 = 600;

/// One resolved answer set for one domain.
#[derive(Debug)]
pub struct Record {
    pub domain: String,
    pub records: Vec<IpAddr>,
    pub ttl_secs: u32,
    pub expires_at: Instant,
    pub failure: Option<ResolveError>,
}

impl Record {
    /// Build a successful record. `ttl_secs` is whatever upstream asserted.
    ///
    /// An empty address list is not a valid success and becomes a
    /// [`ResolveError::Empty`] failure.
    pub fn resolved(domain: &str, records: Vec<IpAddr>, ttl_secs: i64) -> Self {
        if records.is_empty() {
            return Self::failed(domain, ResolveError::Empty);
        }
        let ttl_secs = clamp_ttl(ttl_secs);
        Self {
            domain: normalize(domain),
            records,
            ttl_secs,
            expires_at: Instant::now() + Duration::from_secs(ttl_secs.into()),
            failure: None,
        }
    }

    /// Build a negative entry, valid for [`MIN_TTL_SECS`].
    pub fn failed(domain: &str, error: ResolveError) -> Self {
        Self {
            domain: normalize(domain),
            records: Vec::new(),
            ttl_secs: MIN_TTL_SECS,
            expires_at: Instant::now() + Duration::from_secs(MIN_TTL_SECS.into()),
            failure: Some(error),
        }
    }

    /// Answer synthesized from a static override; skips clamping.
    pub fn pinned(domain: &str, addr: IpAddr) -> Self {
        Self {
            domain: normalize(domain),
            records: vec![addr],
            ttl_secs: OVERRIDE_TTL_SECS,
            expires_at: Instant::now() + Duration::from_secs(OVERRIDE_TTL_SECS.into()),
            failure: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }

    /// Seconds left before expiry, saturating at zero.
    pub fn remaining_ttl(&self, now: Instant) -> u32 {
        let left = self.expires_at.saturating_duration_since(now).as_secs();
        u32::try_from(left).unwrap_or(u32::MAX)
    }
}

/// Clamp an upstream TTL into `[MIN_TTL_SECS, MAX_TTL_SECS]`.
///
/// Non-positive TTLs are an upstream anomaly and map to the minimum.
pub fn clamp_ttl(ttl_secs: i64) -> u32 {
    if ttl_secs <= 0 {
        return MIN_TTL_SECS;
    }
    ttl_secs.clamp(MIN_TTL_SECS.into(), MAX_TTL_SECS.into()) as u32
}

/// Canonical domain form: ASCII lowercase without the trailing root dot.
pub fn normalize(domain: &str) -> String {
    domain.trim_end_matches('.').to_ascii_lowercase()
}
