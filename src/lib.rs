//! ttldns - a caching DNS proxy.
//!
//! Answers from static overrides, then a TTL-bounded cache, and on a miss
//! performs exactly one upstream resolution per domain no matter how many
//! clients ask at once.

pub mod cache;
pub mod dedup;
pub mod dns;
pub mod error;
pub mod hosts;
pub mod proxy;
pub mod record;
pub mod resolver;
pub mod stats;
pub mod transport;
pub mod upstream;
