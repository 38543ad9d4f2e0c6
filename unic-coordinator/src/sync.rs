//! Vault directory synchronization
//!
//! Push mirrors the local vault onto every remote at once; pull restores it
//! from the first remote that has a copy.

use crate::{CoordinatorError, Result};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use unic_core::remote::RemoteStore;
use unic_core::UnicError;

/// Mirror `local_dir` onto every configured remote concurrently
///
/// Every remote is attempted. Failures are collected and reported together.
#[instrument(skip(store, local_dir), fields(dir = %local_dir.display()))]
pub async fn sync_to_all(store: Arc<dyn RemoteStore>, local_dir: &Path) -> Result<usize> {
    let remotes = store.remotes().await?;
    let errors = Arc::new(Mutex::new(Vec::new()));
    let mut handles = Vec::with_capacity(remotes.len());

    for remote in remotes.iter().cloned() {
        let store = Arc::clone(&store);
        let errors = Arc::clone(&errors);
        let dir = local_dir.to_path_buf();
        handles.push(tokio::spawn(async move {
            match store.push_dir(&dir, &remote).await {
                Ok(()) => debug!(remote = %remote, "Vault pushed"),
                Err(e) => {
                    warn!(remote = %remote, error = %e, "Vault push failed");
                    errors.lock().push(format!("{}: {}", remote, e));
                }
            }
        }));
    }

    for (handle, remote) in handles.into_iter().zip(&remotes) {
        if let Err(e) = handle.await {
            errors.lock().push(format!("{}: {}", remote, e));
        }
    }

    let errors = std::mem::take(&mut *errors.lock());
    if !errors.is_empty() {
        return Err(CoordinatorError::Sync(errors));
    }
    info!(remotes = remotes.len(), "Vault pushed to all remotes");
    Ok(remotes.len())
}

/// Restore `local_dir` from the first remote holding a copy
#[instrument(skip(store, local_dir), fields(dir = %local_dir.display()))]
pub async fn sync_from_any(store: Arc<dyn RemoteStore>, local_dir: &Path) -> Result<String> {
    let mut last_error = None;
    for remote in store.remotes().await? {
        match store.pull_dir(&remote, local_dir).await {
            Ok(()) => {
                info!(remote = %remote, "Vault pulled");
                return Ok(remote.name);
            }
            Err(e) => {
                debug!(remote = %remote, error = %e, "Vault pull failed, trying next remote");
                last_error = Some(e);
            }
        }
    }
    Err(last_error
        .unwrap_or_else(|| UnicError::AllRemotesUnavailable("no remotes configured".to_string()))
        .into())
}
