//! Background Sweeper
//!
//! Periodic task that evicts expired entries, started once per store. It
//! competes for the same write lock as foreground operations and is the one
//! place where persistence failures are logged instead of returned, since
//! the task has no caller to report to.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info};

use crate::storage::store::{sweep, StoreInner};

/// Spawn the sweeper for a store.
///
/// The task holds only a weak handle to the store internals, so it can never
/// keep a dropped store alive; the watch channel wakes it for a prompt exit
/// when the last store handle goes away.
pub(crate) fn spawn<V: Send + Sync + 'static>(
    inner: Weak<StoreInner<V>>,
    clean_interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let mut ticker = interval(clean_interval);
        // The first tick completes immediately; sweeping an empty store is
        // pointless, so wait a full interval before the first pass
        ticker.tick().await;
        info!(interval = ?clean_interval, "sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(inner) = inner.upgrade() else { break };
                    let removed = sweep(&inner);
                    if removed > 0 {
                        debug!(removed, "swept expired keys");
                    }
                }
                changed = shutdown_rx.changed() => {
                    // A closed channel means the store is gone
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("sweeper stopped");
    });
}
