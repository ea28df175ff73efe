//! Batch fan-out/fan-in over many devices.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use fleet_core::{DeviceKey, DeviceStatus, StatusMap};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::address::normalize;
use crate::checker::{Probe, StatusChecker};

/// Default cap on `ping` processes running at once.
pub const DEFAULT_PING_LIMIT: usize = 64;

/// Checks many devices in one concurrent round.
///
/// Phase one runs every HTTP probe at once. Phase two pings only the
/// devices HTTP could not reach, with at most `ping_limit` pings in flight
/// across all batches sharing this coordinator.
#[derive(Clone)]
pub struct BatchCoordinator {
    checker: StatusChecker,
    ping_permits: Arc<Semaphore>,
}

impl BatchCoordinator {
    pub fn new(checker: StatusChecker) -> Self {
        Self {
            checker,
            ping_permits: Arc::new(Semaphore::new(DEFAULT_PING_LIMIT)),
        }
    }

    /// Replace the ping concurrency cap. A limit of zero is treated as one.
    pub fn with_ping_limit(mut self, limit: usize) -> Self {
        self.ping_permits = Arc::new(Semaphore::new(limit.max(1)));
        self
    }

    pub fn checker(&self) -> &StatusChecker {
        &self.checker
    }

    /// Check every `key → address` pair. The result holds exactly the
    /// input keys. A failing or panicking probe only affects its own key.
    pub async fn check_many(&self, entries: &BTreeMap<DeviceKey, String>) -> StatusMap {
        let started = Instant::now();
        let mut results = StatusMap::new();

        let mut http_round = Vec::with_capacity(entries.len());
        for (key, raw) in entries {
            let address = raw.trim().to_string();
            if normalize(&address).is_empty() {
                results.insert(key.clone(), DeviceStatus::Offline);
                continue;
            }
            let handle = spawn_probe(&self.checker.http, address.clone());
            http_round.push((key.clone(), address, handle));
        }

        let mut fallback = Vec::new();
        for (key, address, handle) in http_round {
            match handle.await {
                Ok(true) => {
                    results.insert(key, DeviceStatus::Online);
                }
                Ok(false) => fallback.push((key, address)),
                Err(e) => {
                    warn!(%key, error = %e, "http probe task failed");
                    fallback.push((key, address));
                }
            }
        }

        let ping_round: Vec<_> = fallback
            .into_iter()
            .map(|(key, address)| {
                let handle = spawn_limited_probe(
                    &self.checker.reachability,
                    &self.ping_permits,
                    address,
                );
                (key, handle)
            })
            .collect();
        let fallback_count = ping_round.len();

        for (key, handle) in ping_round {
            let reachable = match handle.await {
                Ok(reachable) => reachable,
                Err(e) => {
                    warn!(%key, error = %e, "ping probe task failed");
                    false
                }
            };
            results.insert(key, DeviceStatus::from_reachable(reachable));
        }

        let online = results.values().filter(|s| s.is_online()).count();
        info!(
            total = results.len(),
            online,
            offline = results.len() - online,
            fallback = fallback_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch check complete"
        );
        results
    }
}

fn spawn_probe(probe: &Arc<dyn Probe>, address: String) -> JoinHandle<bool> {
    let probe = Arc::clone(probe);
    tokio::spawn(async move { probe.probe(&address).await })
}

fn spawn_limited_probe(
    probe: &Arc<dyn Probe>,
    permits: &Arc<Semaphore>,
    address: String,
) -> JoinHandle<bool> {
    let probe = Arc::clone(probe);
    let permits = Arc::clone(permits);
    tokio::spawn(async move {
        let Ok(_permit) = permits.acquire_owned().await else {
            return false;
        };
        probe.probe(&address).await
    })
}
