//! Concurrent free-space probe
//!
//! One task per candidate remote. Results are joined and aggregated under
//! a single mutex; a failing remote never aborts the others.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use unic_core::remote::{Remote, RemoteStore};

/// Outcome of probing every candidate
#[derive(Debug, Default)]
pub struct ProbeResult {
    /// Remote with the most free space among those that answered
    pub best: Option<(Remote, u64)>,
    /// Remotes that failed, with the error message
    pub failures: Vec<(Remote, String)>,
}

impl ProbeResult {
    fn offer(&mut self, remote: Remote, free: u64) {
        let better = match &self.best {
            Some((_, current)) => free > *current,
            None => true,
        };
        if better {
            self.best = Some((remote, free));
        }
    }
}

/// Query free space of every candidate concurrently
///
/// Ties keep the remote that answered first.
#[instrument(skip(store, candidates), fields(candidates = candidates.len()))]
pub async fn probe_free_space(store: Arc<dyn RemoteStore>, candidates: &[Remote]) -> ProbeResult {
    let result = Arc::new(Mutex::new(ProbeResult::default()));
    let mut handles = Vec::with_capacity(candidates.len());

    for remote in candidates.iter().cloned() {
        let store = Arc::clone(&store);
        let result = Arc::clone(&result);
        handles.push(tokio::spawn(async move {
            match store.free_space(&remote).await {
                Ok(free) => {
                    debug!(remote = %remote, free, "Free space probed");
                    result.lock().offer(remote, free);
                }
                Err(e) => {
                    warn!(remote = %remote, error = %e, "Free space probe failed");
                    result.lock().failures.push((remote, e.to_string()));
                }
            }
        }));
    }

    for (handle, remote) in handles.into_iter().zip(candidates) {
        if let Err(e) = handle.await {
            result.lock().failures.push((remote.clone(), e.to_string()));
        }
    }

    let mut guard = result.lock();
    std::mem::take(&mut *guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use unic_storage::{FailOp, MemoryRemoteStore};

    #[tokio::test]
    async fn test_probe_picks_max_and_tolerates_failures() {
        let a = Remote::new("A", "mem");
        let b = Remote::new("B", "mem");
        let c = Remote::new("C", "mem");
        let store = MemoryRemoteStore::new([a.clone(), b.clone(), c.clone()]);
        store.set_free_space(&a, 100);
        store.set_free_space(&b, 500);
        store.fail(&c, FailOp::FreeSpace);

        let result = probe_free_space(Arc::new(store), &[a, b.clone(), c.clone()]).await;
        assert_eq!(result.best, Some((b, 500)));
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].0, c);
    }

    #[tokio::test]
    async fn test_probe_empty() {
        let store = MemoryRemoteStore::new([]);
        let result = probe_free_space(Arc::new(store), &[]).await;
        assert!(result.best.is_none());
        assert!(result.failures.is_empty());
    }
}
