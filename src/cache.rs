//! Domain record cache with TTL-based expiration.
//!
//! Lookups go through a hash map; a min-heap keyed by expiry schedules
//! removal from a single background worker instead of one timer per entry.

use rustc_hash::FxHashMap;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::record::Record;

/// How often the eviction worker re-checks when nothing is about to expire.
pub const EVICT_POLL: Duration = Duration::from_secs(1);

struct CacheEntry {
    record: Arc<Record>,
    generation: u64,
}

/// Heap entry. Never updated after push; `generation` ties it to the map
/// entry that was live when it was pushed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Expiry {
    expires_at: Instant,
    generation: u64,
    domain: String,
}

#[derive(Default)]
struct Inner {
    entries: FxHashMap<String, CacheEntry>,
    index: BinaryHeap<Reverse<Expiry>>,
    next_generation: u64,
}

impl Inner {
    /// Drop the map entry for `due.domain` if it is still the one `due` was
    /// pushed for. A refreshed entry has a newer generation and survives.
    fn evict(&mut self, due: &Expiry) -> bool {
        match self.entries.get(&due.domain) {
            Some(entry) if entry.generation == due.generation => {
                self.entries.remove(&due.domain);
                true
            }
            _ => false,
        }
    }
}

enum Step {
    /// Nothing due within the poll interval.
    Idle,
    /// An overdue entry was handled; look again straight away.
    Drained,
    /// Entry due within the poll interval, after the given wait.
    Due(Expiry, Duration),
}

/// TTL-aware record cache.
pub struct RecordCache {
    inner: RwLock<Inner>,
}

impl RecordCache {
    /// Create a cache without an eviction worker.
    ///
    /// Expired entries are still hidden from [`get`](Self::get) but stay in
    /// memory; use [`start`](Self::start) for a long-running cache.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Create a cache and spawn its eviction worker on the current runtime.
    ///
    /// The worker stops when `shutdown` is cancelled or the cache is dropped.
    pub fn start(shutdown: CancellationToken) -> Arc<Self> {
        let cache = Arc::new(Self::new());
        tokio::spawn(run_evictor(Arc::downgrade(&cache), shutdown));
        cache
    }

    /// Look up an unexpired record for a normalized domain.
    pub fn get(&self, domain: &str) -> Option<Arc<Record>> {
        let Ok(inner) = self.inner.read() else {
            return None;
        };
        let entry = inner.entries.get(domain)?;
        if entry.record.is_expired(Instant::now()) {
            return None;
        }
        Some(Arc::clone(&entry.record))
    }

    /// Insert or overwrite the record for `record.domain` and schedule its expiry.
    pub fn put(&self, record: Arc<Record>) {
        let Ok(mut inner) = self.inner.write() else {
            return;
        };

        let generation = inner.next_generation;
        inner.next_generation += 1;

        inner.index.push(Reverse(Expiry {
            expires_at: record.expires_at,
            generation,
            domain: record.domain.clone(),
        }));
        inner
            .entries
            .insert(record.domain.clone(), CacheEntry { record, generation });
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn next_step(&self, now: Instant) -> Step {
        let Ok(mut inner) = self.inner.write() else {
            return Step::Idle;
        };
        let Some(Reverse(due)) = inner.index.pop() else {
            return Step::Idle;
        };

        if due.expires_at <= now {
            if inner.evict(&due) {
                debug!(domain = %due.domain, "evicted expired record");
            }
            return Step::Drained;
        }

        let remaining = due.expires_at - now;
        if remaining > EVICT_POLL {
            inner.index.push(Reverse(due));
            return Step::Idle;
        }
        Step::Due(due, remaining)
    }

    fn evict(&self, due: &Expiry) {
        let Ok(mut inner) = self.inner.write() else {
            return;
        };
        if inner.evict(due) {
            debug!(domain = %due.domain, "evicted expired record");
        }
    }
}

impl Default for RecordCache {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_evictor(cache: Weak<RecordCache>, shutdown: CancellationToken) {
    loop {
        let step = match cache.upgrade() {
            Some(cache) => cache.next_step(Instant::now()),
            None => return,
        };

        let (wait, due) = match step {
            Step::Drained => {
                tokio::task::yield_now().await;
                continue;
            }
            Step::Idle => (EVICT_POLL, None),
            Step::Due(due, wait) => (wait, Some(due)),
        };

        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("eviction worker stopped");
                return;
            }
            _ = sleep(wait) => {}
        }

        if let (Some(due), Some(cache)) = (due, cache.upgrade()) {
            cache.evict(&due);
        }
    }
}
