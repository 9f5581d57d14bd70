//! Static overrides loaded from hosts files.
//!
//! Readers see an immutable [`Hosts`] snapshot through an `ArcSwap`; the
//! reload job builds a whole new table and swaps it in, so lookups never
//! take a lock.

mod hostfile;

pub use hostfile::Hosts;

use arc_swap::ArcSwap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Hot-swappable override table.
pub struct HostTable {
    current: ArcSwap<Hosts>,
}

impl HostTable {
    pub fn new(hosts: Hosts) -> Self {
        Self {
            current: ArcSwap::from_pointee(hosts),
        }
    }

    /// Look up a normalized domain in the current generation.
    pub fn lookup(&self, domain: &str) -> Option<IpAddr> {
        self.current.load().get(domain)
    }

    /// Replace the whole table.
    pub fn replace(&self, hosts: Hosts) {
        self.current.store(Arc::new(hosts));
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HostTable {
    fn default() -> Self {
        Self::new(Hosts::default())
    }
}

/// Periodically re-reads the hosts files into a [`HostTable`].
pub struct HostReloadJob {
    table: Arc<HostTable>,
    paths: Arc<[PathBuf]>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl HostReloadJob {
    pub fn new(table: Arc<HostTable>, paths: Vec<PathBuf>) -> Self {
        Self {
            table,
            paths: paths.into(),
            interval: Duration::from_secs(5),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn start(self) -> JoinHandle<()> {
        info!(
            files = self.paths.len(),
            interval_secs = self.interval.as_secs(),
            "Starting hosts reload job"
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.tick().await; // first tick fires immediately; the table is already loaded
            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        info!("HostReloadJob: shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let paths = Arc::clone(&self.paths);
                        match tokio::task::spawn_blocking(move || Hosts::load(&paths[..])).await {
                            Ok(hosts) => {
                                debug!(entries = hosts.len(), "reloaded hosts files");
                                self.table.replace(hosts);
                            }
                            Err(e) => warn!(error = %e, "hosts reload task failed"),
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::net::Ipv4Addr;

    #[test]
    fn replace_swaps_whole_table() {
        let table = HostTable::new(Hosts::parse("10.0.0.1 old.lan\n"));
        assert_eq!(table.len(), 1);

        table.replace(Hosts::parse("10.0.0.2 new.lan\n"));

        assert_eq!(table.lookup("old.lan"), None);
        assert_eq!(
            table.lookup("new.lan"),
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)))
        );
    }

    #[test]
    fn default_table_is_empty() {
        let table = HostTable::default();

        assert!(table.is_empty());
        assert_eq!(table.lookup("anything"), None);
    }

    #[tokio::test]
    async fn reload_job_picks_up_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        fs::write(&path, "10.0.0.1 box.lan\n").unwrap();

        let paths = vec![path.clone()];
        let table = Arc::new(HostTable::new(Hosts::load(&paths[..])));
        let shutdown = CancellationToken::new();
        let handle = HostReloadJob::new(Arc::clone(&table), paths)
            .with_interval(Duration::from_millis(20))
            .with_cancellation(shutdown.clone())
            .start();

        fs::write(&path, "10.0.0.7 box.lan\n").unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(
            table.lookup("box.lan"),
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)))
        );

        shutdown.cancel();
        handle.await.unwrap();
    }
}
