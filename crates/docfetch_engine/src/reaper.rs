use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::time::Duration;

use docfetch_logging::{fetch_debug, fetch_info, fetch_warn};
use rand::Rng;
use tokio::time::MissedTickBehavior;

use crate::{EngineEvent, RequestId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaperSettings {
    /// Wait after delivery before deleting a request's files.
    pub cleanup_delay: Duration,
    /// Upper bound of the random extra wait added to each cleanup.
    pub cleanup_jitter: Duration,
    /// How often the stale sweep fires.
    pub sweep_interval: Duration,
}

impl Default for ReaperSettings {
    fn default() -> Self {
        Self {
            cleanup_delay: Duration::from_secs(5 * 60),
            cleanup_jitter: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(10 * 60),
        }
    }
}

/// `base` plus a uniformly random share of `jitter`, so requests that finish
/// together do not all hit the filesystem at the same instant.
pub fn cleanup_delay(base: Duration, jitter: Duration) -> Duration {
    let jitter_ms = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
    if jitter_ms == 0 {
        return base;
    }
    base.saturating_add(Duration::from_millis(rand::rng().random_range(0..=jitter_ms)))
}

/// Deletes each file, logging failures. Files already gone are fine.
/// Returns how many files were actually removed.
pub fn remove_artifacts(files: &[PathBuf]) -> usize {
    let mut removed = 0;
    for file in files {
        match std::fs::remove_file(file) {
            Ok(()) => {
                fetch_debug!("removed {:?}", file);
                removed += 1;
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                fetch_debug!("{:?} already gone", file);
            }
            Err(err) => fetch_warn!("could not remove {:?}: {}", file, err),
        }
    }
    removed
}

/// Files waiting on a cleanup timer, keyed by request.
///
/// Whoever takes an entry first (the timer or a flush) deletes its files.
#[derive(Debug, Clone, Default)]
pub(crate) struct PendingCleanups {
    inner: Arc<Mutex<HashMap<RequestId, Vec<PathBuf>>>>,
}

impl PendingCleanups {
    pub(crate) fn insert(&self, request_id: RequestId, files: Vec<PathBuf>) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.entry(request_id).or_default().extend(files);
    }

    pub(crate) fn take(&self, request_id: RequestId) -> Option<Vec<PathBuf>> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.remove(&request_id)
    }

    pub(crate) fn take_all(&self) -> Vec<(RequestId, Vec<PathBuf>)> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.drain().collect()
    }
}

/// Per-request timer: waits out the jittered delay, deletes the files and
/// reports back so the ledger entry can go.
pub(crate) async fn run_cleanup(
    request_id: RequestId,
    delay: Duration,
    pending: PendingCleanups,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    tokio::time::sleep(delay).await;
    if let Some(files) = pending.take(request_id) {
        let removed = remove_artifacts(&files);
        fetch_info!(
            "cleanup for request {} removed {} of {} files",
            request_id,
            removed,
            files.len()
        );
    }
    let _ = event_tx.send(EngineEvent::CleanupFinished { request_id });
}

/// Repeating stale-sweep timer. Stops once nobody listens for events.
pub(crate) async fn run_sweep_ticker(interval: Duration, event_tx: mpsc::Sender<EngineEvent>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if event_tx.send(EngineEvent::SweepDue).is_err() {
            break;
        }
    }
}
