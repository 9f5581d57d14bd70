//! Upstream resolution errors.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Why an upstream failed to produce an answer for a domain.
///
/// Every variant ends up inside a negative-cached [`Record`](crate::record::Record);
/// none of them abort the query pipeline.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("upstream answered with DNS status {0}")]
    DnsStatus(u32),

    #[error("malformed upstream payload: {0}")]
    Malformed(String),

    #[error("upstream returned no records")]
    Empty,

    #[error("system lookup failed: {0}")]
    Lookup(#[from] io::Error),
}
