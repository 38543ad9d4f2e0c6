//! unic Coordinator
//!
//! Runs the distributed operations over the lower crates:
//! - upload: erasure-code a file, place every shard on a remote
//! - download: fetch enough shards to rebuild and verify the original
//! - remove: delete every shard and the datamap entry
//! - recovery: resolve an interrupted operation before any new one starts
//! - sync: mirror the vault directory to and from the remotes
//!
//! Only one distributed operation is in flight at a time. Every top-level
//! command calls [`Coordinator::check_state`] first.

pub mod interaction;
pub mod operations;
pub mod recovery;
pub mod sync;

pub use interaction::{Confirm, FixedAnswer, NoProgress, Progress, Prompt, MAX_PROMPT_ATTEMPTS};
pub use operations::{FileStatus, UploadOutcome};
pub use recovery::Request;
pub use sync::{sync_from_any, sync_to_all};

use std::sync::Arc;
use thiserror::Error;
use unic_balancer::{BalancerError, LoadBalancer, StatsStore, Strategy};
use unic_core::erasure::{Codec, ErasureConfig, ReedSolomonCodec};
use unic_core::layout::VaultLayout;
use unic_core::namer::ShardNamer;
use unic_core::remote::RemoteStore;
use unic_core::UnicError;
use unic_metadata::{DatamapStore, MetadataError};

/// Coordinator error types
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error(transparent)]
    Core(#[from] UnicError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Balancer(#[from] BalancerError),

    #[error("Sync failed: {}", .0.join("; "))]
    Sync(Vec<String>),
}

impl CoordinatorError {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Core(e) => e.is_not_found(),
            Self::Metadata(e) => e.is_not_found(),
            _ => false,
        }
    }
}

impl From<std::io::Error> for CoordinatorError {
    fn from(err: std::io::Error) -> Self {
        Self::Core(UnicError::Io(err))
    }
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;

/// Distributed operations over one vault
pub struct Coordinator {
    layout: VaultLayout,
    datamap: DatamapStore,
    balancer: LoadBalancer,
    store: Arc<dyn RemoteStore>,
    codec: Arc<dyn Codec>,
    namer: ShardNamer,
    erasure: ErasureConfig,
    confirm: Arc<dyn Confirm>,
    progress: Arc<dyn Progress>,
}

impl Coordinator {
    /// Coordinator with the Reed-Solomon codec and default erasure layout.
    /// Confirmations are declined and progress is discarded.
    pub fn new(layout: VaultLayout, store: Arc<dyn RemoteStore>, strategy: Strategy) -> Self {
        let balancer = LoadBalancer::new(strategy, StatsStore::open(&layout), Arc::clone(&store));
        Self {
            datamap: DatamapStore::open(&layout),
            namer: ShardNamer::new(layout.shard_dir()),
            layout,
            balancer,
            store,
            codec: Arc::new(ReedSolomonCodec::new()),
            erasure: ErasureConfig::default(),
            confirm: Arc::new(FixedAnswer(false)),
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_erasure(mut self, erasure: ErasureConfig) -> Self {
        self.erasure = erasure;
        self
    }

    pub fn with_confirm(mut self, confirm: Arc<dyn Confirm>) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn layout(&self) -> &VaultLayout {
        &self.layout
    }

    pub fn datamap(&self) -> &DatamapStore {
        &self.datamap
    }

    pub fn balancer(&self) -> &LoadBalancer {
        &self.balancer
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    pub fn erasure(&self) -> ErasureConfig {
        self.erasure
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use unic_core::remote::Remote;
    use unic_storage::MemoryRemoteStore;

    pub struct Harness {
        pub tmp: TempDir,
        pub remotes: Vec<Remote>,
        pub store: Arc<MemoryRemoteStore>,
        pub coordinator: Coordinator,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::with_confirm(false)
        }

        pub fn with_confirm(answer: bool) -> Self {
            let tmp = TempDir::new().unwrap();
            let remotes = vec![
                Remote::new("A", "mem"),
                Remote::new("B", "mem"),
                Remote::new("C", "mem"),
            ];
            let store = Arc::new(MemoryRemoteStore::new(remotes.clone()));
            let layout = VaultLayout::new(tmp.path().join("vault"));
            let coordinator = Coordinator::new(layout, store.clone(), Strategy::RoundRobin)
                .with_erasure(ErasureConfig::new(3, 2).unwrap())
                .with_confirm(Arc::new(FixedAnswer(answer)));
            Self {
                tmp,
                remotes,
                store,
                coordinator,
            }
        }

        /// Write a local file to upload
        pub fn file(&self, name: &str, data: &[u8]) -> PathBuf {
            let dir = self.tmp.path().join("local");
            std::fs::create_dir_all(&dir).unwrap();
            let path = dir.join(name);
            std::fs::write(&path, data).unwrap();
            path
        }

        pub fn staged_files(&self) -> usize {
            std::fs::read_dir(self.coordinator.layout().shard_dir())
                .map(|d| d.count())
                .unwrap_or(0)
        }
    }

    pub fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8).collect()
    }
}
