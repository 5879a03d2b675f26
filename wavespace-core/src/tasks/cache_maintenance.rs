// src/tasks/cache_maintenance.rs

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

use crate::services::LedgerService;

/// Spawns a background task that periodically drops expired cache entries and idle
/// account locks. Reads already skip expired entries; this only bounds memory.
pub fn spawn_maintenance_task(
    ledger: Arc<LedgerService>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sleep(interval) => {
                    let removed = ledger.run_maintenance();
                    if removed > 0 {
                        debug!("cache purge removed {} expired entries", removed);
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("maintenance task stopped");
    })
}
