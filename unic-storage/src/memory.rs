//! In-memory remote store
//!
//! Used for testing and development. Not persistent. Free space responses
//! and failures can be programmed per remote.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use unic_core::error::{Result, UnicError};
use unic_core::remote::{Remote, RemoteRef, RemoteStore};
use walkdir::WalkDir;

/// Operations that can be made to fail on a remote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailOp {
    FreeSpace,
    Upload,
    Download,
    Delete,
    Push,
    Pull,
}

#[derive(Default)]
struct RemoteState {
    blobs: HashMap<String, Bytes>,
    mirror: Option<BTreeMap<PathBuf, Bytes>>,
    free_space: u64,
    failing: HashSet<FailOp>,
}

/// In-memory remote store
pub struct MemoryRemoteStore {
    order: Vec<Remote>,
    remotes: RwLock<HashMap<Remote, RemoteState>>,

    /// Operation counters
    uploads: AtomicU64,
    downloads: AtomicU64,
    deletes: AtomicU64,
}

impl MemoryRemoteStore {
    /// Create a store with the given remotes, each reporting `u64::MAX` free
    pub fn new(remotes: impl IntoIterator<Item = Remote>) -> Self {
        let order: Vec<Remote> = remotes.into_iter().collect();
        let state = order
            .iter()
            .map(|r| {
                (
                    r.clone(),
                    RemoteState {
                        free_space: u64::MAX,
                        ..Default::default()
                    },
                )
            })
            .collect();
        Self {
            order,
            remotes: RwLock::new(state),
            uploads: AtomicU64::new(0),
            downloads: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }

    /// Set the free space reported for a remote
    pub fn set_free_space(&self, remote: &Remote, bytes: u64) {
        if let Some(state) = self.remotes.write().get_mut(remote) {
            state.free_space = bytes;
        }
    }

    /// Make an operation fail on a remote until cleared
    pub fn fail(&self, remote: &Remote, op: FailOp) {
        if let Some(state) = self.remotes.write().get_mut(remote) {
            state.failing.insert(op);
        }
    }

    /// Clear every injected failure
    pub fn heal(&self, remote: &Remote) {
        if let Some(state) = self.remotes.write().get_mut(remote) {
            state.failing.clear();
        }
    }

    /// Whether a blob is stored on a remote
    pub fn contains(&self, remote: &Remote, name: &str) -> bool {
        self.remotes
            .read()
            .get(remote)
            .map(|s| s.blobs.contains_key(name))
            .unwrap_or(false)
    }

    /// Insert a blob directly
    pub fn insert(&self, remote: &Remote, name: impl Into<String>, data: impl Into<Bytes>) {
        if let Some(state) = self.remotes.write().get_mut(remote) {
            state.blobs.insert(name.into(), data.into());
        }
    }

    /// Number of blobs across all remotes
    pub fn blob_count(&self) -> usize {
        self.remotes.read().values().map(|s| s.blobs.len()).sum()
    }

    pub fn uploads(&self) -> u64 {
        self.uploads.load(Ordering::Relaxed)
    }

    pub fn downloads(&self) -> u64 {
        self.downloads.load(Ordering::Relaxed)
    }

    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    fn check(&self, remote: &Remote, op: FailOp) -> Result<()> {
        let remotes = self.remotes.read();
        let state = remotes
            .get(remote)
            .ok_or_else(|| UnicError::NotFound(format!("remote {}", remote)))?;
        if state.failing.contains(&op) {
            return Err(UnicError::remote(
                remote,
                format!("injected {:?} failure", op),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn remotes(&self) -> Result<Vec<Remote>> {
        Ok(self.order.clone())
    }

    async fn list(&self, remote: &Remote) -> Result<Vec<String>> {
        let remotes = self.remotes.read();
        let state = remotes
            .get(remote)
            .ok_or_else(|| UnicError::NotFound(format!("remote {}", remote)))?;
        let mut names: Vec<String> = state.blobs.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn free_space(&self, remote: &Remote) -> Result<u64> {
        self.check(remote, FailOp::FreeSpace)?;
        Ok(self
            .remotes
            .read()
            .get(remote)
            .map(|s| s.free_space)
            .unwrap_or_default())
    }

    async fn upload(&self, local_path: &Path, remote: &Remote) -> Result<RemoteRef> {
        self.check(remote, FailOp::Upload)?;
        let name = file_name(local_path)?;
        let data = tokio::fs::read(local_path).await?;

        if let Some(state) = self.remotes.write().get_mut(remote) {
            state.blobs.insert(name.clone(), Bytes::from(data));
        }
        self.uploads.fetch_add(1, Ordering::Relaxed);
        Ok(RemoteRef::new(remote.clone(), name))
    }

    async fn download(&self, reference: &RemoteRef, local_path: &Path) -> Result<()> {
        self.check(&reference.remote, FailOp::Download)?;
        let data = self
            .remotes
            .read()
            .get(&reference.remote)
            .and_then(|s| s.blobs.get(&reference.name).cloned())
            .ok_or_else(|| UnicError::NotFound(format!("blob {}", reference)))?;

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local_path, &data).await?;
        self.downloads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn delete(&self, reference: &RemoteRef) -> Result<()> {
        self.check(&reference.remote, FailOp::Delete)?;
        let removed = self
            .remotes
            .write()
            .get_mut(&reference.remote)
            .and_then(|s| s.blobs.remove(&reference.name));
        match removed {
            Some(_) => {
                self.deletes.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            None => Err(UnicError::NotFound(format!("blob {}", reference))),
        }
    }

    async fn push_dir(&self, local_dir: &Path, remote: &Remote) -> Result<()> {
        self.check(remote, FailOp::Push)?;
        let mut snapshot = BTreeMap::new();
        for entry in WalkDir::new(local_dir) {
            let entry = entry.map_err(|e| UnicError::remote(remote, e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(local_dir)
                .map_err(|e| UnicError::remote(remote, e))?
                .to_path_buf();
            let data = tokio::fs::read(entry.path()).await?;
            snapshot.insert(relative, Bytes::from(data));
        }
        if let Some(state) = self.remotes.write().get_mut(remote) {
            state.mirror = Some(snapshot);
        }
        Ok(())
    }

    async fn pull_dir(&self, remote: &Remote, local_dir: &Path) -> Result<()> {
        self.check(remote, FailOp::Pull)?;
        let snapshot = self
            .remotes
            .read()
            .get(remote)
            .and_then(|s| s.mirror.clone())
            .ok_or_else(|| UnicError::NotFound(format!("vault copy on {}", remote)))?;
        for (relative, data) in snapshot {
            let target = local_dir.join(relative);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(target, &data).await?;
        }
        Ok(())
    }
}

pub(crate) fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| UnicError::NotFound(format!("file name of {}", path.display())))
}
