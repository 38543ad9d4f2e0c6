//! Interrupted operation recovery
//!
//! At most one datamap entry is ever in flight, so a crash leaves exactly
//! one trail. [`Coordinator::check_state`] finds it and discards it before
//! the caller's own request runs. Stale work is never resumed.

use crate::operations::remove_if_exists;
use crate::{Coordinator, Result};
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};
use unic_core::namer::remote_name;
use unic_core::remote::RemoteRef;
use unic_metadata::{FileInfo, Operation};

/// Top-level request about to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Upload { path: PathBuf },
    Download { name: String, dest: PathBuf },
    Remove(String),
    List,
    /// Anything that does not touch a distributed file
    Other,
}

impl Request {
    fn removes(&self, name: &str) -> bool {
        matches!(self, Request::Remove(n) if n == name)
    }
}

impl Coordinator {
    /// Resolve any interrupted operation before `request` runs
    ///
    /// Returns `true` when resolving the stale operation already did what
    /// `request` asks for, so the caller should not run it again. That only
    /// happens for a remove of the same file, since stale uploads and
    /// downloads are discarded rather than finished.
    #[instrument(skip(self))]
    pub async fn check_state(&self, request: &Request) -> Result<bool> {
        let Some(stale) = self.datamap.find_active_operation()? else {
            debug!("No interrupted operation");
            return Ok(false);
        };

        let name = stale.original_name.clone();
        warn!(file = %name, operation = %stale.operation, "Found unfinished work");

        match stale.operation {
            Operation::Upload => {
                self.dump_upload(&stale).await?;
                Ok(false)
            }
            Operation::Download => {
                self.dump_download(&stale)?;
                Ok(false)
            }
            Operation::Rm => {
                self.remove(&name).await?;
                info!(file = %name, "Interrupted remove finished");
                Ok(request.removes(&name))
            }
        }
    }

    /// Abandon a partial upload: staged shards, remote blobs and the entry
    pub(crate) async fn dump_upload(&self, info: &FileInfo) -> Result<()> {
        let name = &info.original_name;
        self.discard_staged(&self.staged_paths(info));

        for shard in info.shards.values().filter(|s| s.has_remote()) {
            let reference = RemoteRef::new(shard.remote.clone(), remote_name(&shard.shard_name));
            match self.store.delete(&reference).await {
                Ok(()) => debug!(shard = %shard.shard_name, remote = %shard.remote, "Orphaned shard deleted"),
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(file = %name, shard = %shard.shard_name, error = %e, "Could not delete orphaned shard");
                    return Err(e.into());
                }
            }
        }

        self.datamap.remove(name)?;
        info!(file = %name, "Interrupted upload discarded");
        Ok(())
    }

    /// Abandon a partial download: staged shards only, remotes are untouched
    pub(crate) fn dump_download(&self, info: &FileInfo) -> Result<()> {
        for path in self.staged_paths(info) {
            remove_if_exists(&path)?;
        }
        self.datamap.clear_operation(&info.original_name)?;
        info!(file = %info.original_name, "Interrupted download discarded");
        Ok(())
    }

    /// Every local path a shard of `info` may be staged under
    fn staged_paths(&self, info: &FileInfo) -> Vec<PathBuf> {
        info.shards
            .keys()
            .flat_map(|shard| {
                [
                    self.layout.shard_path(shard),
                    self.layout.shard_path(&remote_name(shard)),
                ]
            })
            .collect()
    }
}
