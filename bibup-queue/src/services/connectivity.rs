//! Connectivity checks
//!
//! `OnlineFlag` is the polled check the queue processor reads before every row.
//! The binary keeps it current with `spawn_reachability_probe`; the host can
//! also set it through `POST /connectivity`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::metadata_client::HttpMetadataSource;
use super::Connectivity;

/// Shared online/offline flag, flipped by whoever observes the network
#[derive(Debug, Clone, Default)]
pub struct OnlineFlag {
    offline: Arc<AtomicBool>,
}

impl OnlineFlag {
    pub fn new(offline: bool) -> Self {
        Self {
            offline: Arc::new(AtomicBool::new(offline)),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        let previous = self.offline.swap(offline, Ordering::AcqRel);
        if previous != offline {
            tracing::info!(offline, "Connectivity changed");
        }
    }
}

impl Connectivity for OnlineFlag {
    fn is_offline(&self) -> bool {
        self.offline.load(Ordering::Acquire)
    }
}

/// Periodically check that the lookup server answers and flip `flag` accordingly
pub fn spawn_reachability_probe(
    flag: OnlineFlag,
    source: Arc<HttpMetadataSource>,
    interval: Duration,
) -> JoinHandle<()> {
    tracing::info!(
        url = %source.base_url(),
        interval_secs = interval.as_secs(),
        "Starting connectivity probe"
    );

    tokio::spawn(async move {
        loop {
            let reachable = source.is_reachable().await;
            flag.set_offline(!reachable);
            tokio::time::sleep(interval).await;
        }
    })
}

/// Never offline
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_offline(&self) -> bool {
        false
    }
}
