//! Replica synchronization seam.
//!
//! The embedded-replica connector lives outside this crate; the core
//! consumes it through the one capability it needs. On-demand sync is
//! driven by the admin endpoint, periodic sync by the background
//! interval runner below. Background failures are logged only.

use crate::core::error::StoreError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Reconcile the local store with the remote store of record.
pub trait ReplicaSync: Send + Sync {
    fn sync(&self) -> Result<(), StoreError>;
}

/// For deployments without a remote store. Always succeeds.
pub struct NoopSync;

impl ReplicaSync for NoopSync {
    fn sync(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Run `syncer.sync()` every `interval` until `shutdown` is set.
///
/// The sleep is chunked so shutdown is observed within roughly a
/// second even with long intervals.
pub fn spawn_background_sync(
    syncer: Arc<dyn ReplicaSync>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let tick = Duration::from_millis(250);
        let mut last = Instant::now();
        while !shutdown.load(Ordering::Relaxed) {
            thread::sleep(tick.min(interval));
            if last.elapsed() < interval {
                continue;
            }
            last = Instant::now();
            match syncer.sync() {
                Ok(()) => debug!("background sync completed"),
                Err(err) => warn!(error = %err, "background sync failed"),
            }
        }
    })
}
