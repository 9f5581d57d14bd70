//! Single-flight execution for concurrent callers sharing a key.
//!
//! The first caller for a key runs the operation; callers arriving while it
//! is in flight park on a oneshot channel and receive a clone of its result.

use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use tokio::sync::oneshot;

type Waiters<V> = Vec<oneshot::Sender<V>>;

/// A set of in-flight calls keyed by `K`.
pub struct Group<K, V> {
    calls: Mutex<FxHashMap<K, Waiters<V>>>,
}

impl<K, V> Group<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(FxHashMap::default()),
        }
    }

    /// Run `op` for `key`, or wait for the call already in flight for it.
    ///
    /// Every caller of one flight gets a clone of the same value. Once the
    /// flight completes the key is released, so the next call runs `op` again.
    /// If the leading caller is dropped mid-flight its waiters retry, and one
    /// of them takes over as leader.
    pub async fn work<F, Fut>(&self, key: &K, op: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        loop {
            let waiter = {
                let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
                match calls.entry(key.clone()) {
                    Entry::Occupied(mut entry) => {
                        let (tx, rx) = oneshot::channel();
                        entry.get_mut().push(tx);
                        Some(rx)
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(Vec::new());
                        None
                    }
                }
            };

            match waiter {
                Some(rx) => {
                    if let Ok(value) = rx.await {
                        return value;
                    }
                    // leader dropped before finishing
                }
                None => break,
            }
        }

        let flight = Flight {
            group: self,
            key,
            done: false,
        };
        let value = op().await;

        for tx in flight.finish() {
            let _ = tx.send(value.clone());
        }
        value
    }

    /// Number of keys with a call currently in flight.
    pub fn in_flight(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn release(&self, key: &K) -> Waiters<V> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .unwrap_or_default()
    }
}

impl<K, V> Default for Group<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the key if the leading future is dropped before completing.
struct Flight<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    group: &'a Group<K, V>,
    key: &'a K,
    done: bool,
}

impl<K, V> Flight<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn finish(mut self) -> Waiters<V> {
        self.done = true;
        self.group.release(self.key)
    }
}

impl<K, V> Drop for Flight<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn drop(&mut self) {
        if !self.done {
            self.group.release(self.key);
        }
    }
}
