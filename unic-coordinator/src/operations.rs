//! Distributed operations
//!
//! Upload, download, remove, list and status. Each operation flags its file
//! as in flight in the datamap before touching a remote and clears the flag
//! only after the last shard is done, so an interruption at any point
//! leaves a trail for [`Coordinator::check_state`].

use crate::{Coordinator, CoordinatorError, Result};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use unic_balancer::{Direction, Strategy};
use unic_core::crypto::{file_checksum, file_checksums};
use unic_core::erasure::shard_file_name;
use unic_core::namer::remote_name;
use unic_core::remote::{Remote, RemoteRef};
use unic_core::UnicError;
use unic_metadata::{DistributedFile, FileInfo, NewDistribution, Operation};

/// Result of an upload request
#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Uploaded(FileInfo),
    /// A file with the same name exists and overwriting was declined
    Skipped,
}

/// Datamap entry together with the shards currently visible on remotes
#[derive(Debug, Clone)]
pub struct FileStatus {
    pub info: FileInfo,
    pub visible_shards: BTreeSet<String>,
}

impl FileStatus {
    pub fn missing_shards(&self) -> usize {
        self.info.shards.len() - self.visible_shards.len()
    }
}

/// Bytes per second of one transfer
fn throughput(bytes: u64, elapsed: Duration) -> f64 {
    bytes as f64 / elapsed.as_secs_f64().max(1e-6)
}

fn original_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| UnicError::NotFound(format!("file name of {}", path.display())).into())
}

pub(crate) fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

impl Coordinator {
    /// Distribute `path` over the configured remotes
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn upload(&self, path: &Path, strategy: Strategy) -> Result<UploadOutcome> {
        let name = original_name(path)?;
        if !path.is_file() {
            return Err(UnicError::NotFound(format!("local file {}", path.display())).into());
        }

        if self.datamap.contains(&name)? {
            let question = format!(
                "A file named {} is already distributed. Overwrite it?",
                name
            );
            if !self.confirm.confirm(&question, false) {
                info!(file = %name, "Upload skipped, file already distributed");
                return Ok(UploadOutcome::Skipped);
            }
            info!(file = %name, "Replacing existing distribution");
            self.remove(&name).await?;
        }

        self.layout.ensure_dirs()?;
        let shard_dir = self.layout.shard_dir();
        let encoded = self.codec.encode(path, &shard_dir, self.erasure)?;

        let distribution = match self.plan(&name, &encoded.shards, strategy).await {
            Ok(shards) => NewDistribution {
                shards,
                encoded_size: encoded.encoded_size,
                padding: encoded.padding,
                shard_count: self.erasure.data_shards,
                parity_count: self.erasure.parity_shards,
            },
            Err(e) => {
                self.discard_staged(&encoded.shards);
                return Err(e);
            }
        };

        let info = match self.datamap.put(path, distribution) {
            Ok(info) => info,
            Err(e) => {
                self.discard_staged(&encoded.shards);
                return Err(e.into());
            }
        };

        self.progress.start(&name, info.shards.len());
        for shard in info.ordered_shards() {
            if let Err(e) = self.upload_shard(&name, shard).await {
                self.progress.finish();
                return Err(e);
            }
            self.progress.shard_done(&shard.shard_name);
        }
        self.progress.finish();

        self.datamap.clear_operation(&name)?;
        info!(
            file = %name,
            shards = info.shards.len(),
            bytes = info.original_size,
            "Upload complete"
        );
        Ok(UploadOutcome::Uploaded(self.datamap.get(&name)?))
    }

    /// Choose a remote and compute the checksum of every staged shard
    async fn plan(
        &self,
        name: &str,
        shards: &[PathBuf],
        strategy: Strategy,
    ) -> Result<Vec<DistributedFile>> {
        let checksums = file_checksums(shards)?;
        let candidates = self.store.remotes().await?;

        let mut planned = Vec::with_capacity(shards.len());
        for (index, checksum) in checksums.into_iter().enumerate() {
            let remote = self.balancer.select_remote_with(strategy, &candidates).await?;
            let shard_name = shard_file_name(name, index);
            debug!(shard = %shard_name, remote = %remote, "Shard placed");
            planned.push(DistributedFile::new(shard_name, remote, checksum));
        }
        Ok(planned)
    }

    async fn upload_shard(&self, name: &str, shard: &DistributedFile) -> Result<()> {
        let hash = self.namer.to_remote_name(&shard.shard_name)?;
        let staged = self.layout.shard_path(&hash);
        let bytes = fs::metadata(&staged)?.len();

        let start = Instant::now();
        if let Err(e) = self.store.upload(&staged, &shard.remote).await {
            warn!(file = %name, shard = %hash, remote = %shard.remote, error = %e, "Shard upload failed");
            return Err(e.into());
        }
        self.record(&shard.remote, Direction::Up, bytes, start.elapsed());

        self.datamap.mark_completed(name, &shard.shard_name, true)?;
        remove_if_exists(&staged)?;
        debug!(file = %name, shard = %hash, remote = %shard.remote, "Shard uploaded");
        Ok(())
    }

    /// Rebuild `name` from its shards into `dest`
    ///
    /// `dest` may be a directory, in which case the original name is used.
    #[instrument(skip(self, dest), fields(dest = %dest.display()))]
    pub async fn download(&self, name: &str, dest: &Path) -> Result<PathBuf> {
        let info = self.datamap.get(name)?;
        let output = if dest.is_dir() {
            dest.join(&info.original_name)
        } else {
            dest.to_path_buf()
        };

        self.datamap.set_operation(name, Operation::Download)?;
        self.layout.ensure_dirs()?;

        let config = info.erasure_config();
        let mut slots: Vec<Option<PathBuf>> = vec![None; config.total_shards()];
        let mut fetched = Vec::new();
        self.progress.start(name, info.shards.len());
        for shard in info.ordered_shards() {
            let Some(index) = shard.index().filter(|i| *i < slots.len()) else {
                warn!(file = %name, shard = %shard.shard_name, "Shard index out of range");
                continue;
            };
            match self.download_shard(name, shard).await {
                Ok(path) => {
                    fetched.push(path.clone());
                    slots[index] = Some(path);
                }
                Err(e) => {
                    warn!(file = %name, shard = %shard.shard_name, error = %e, "Shard unavailable");
                    // A failed transfer may leave a partial file under either name
                    self.discard_staged(&[
                        self.layout.shard_path(&remote_name(&shard.shard_name)),
                        self.layout.shard_path(&shard.shard_name),
                    ]);
                }
            }
            self.progress.shard_done(&shard.shard_name);
        }
        self.progress.finish();

        let decoded = self
            .codec
            .decode(&slots, config, info.original_size, &output)
            .map_err(CoordinatorError::from)
            .and_then(|path| {
                if file_checksum(&path)? == info.checksum {
                    Ok(path)
                } else {
                    remove_if_exists(&path)?;
                    Err(UnicError::Corrupt {
                        path: path.display().to_string(),
                        message: "checksum mismatch after reconstruction".to_string(),
                    }
                    .into())
                }
            });

        self.discard_staged(&fetched);
        self.datamap.clear_operation(name)?;

        match decoded {
            Ok(path) => {
                info!(file = %name, path = %path.display(), "Download complete");
                Ok(path)
            }
            Err(e) => {
                warn!(file = %name, error = %e, "File could not be rebuilt");
                let question = format!(
                    "{} could not be rebuilt ({}). Remove it from the remotes completely?",
                    name, e
                );
                if self.confirm.confirm(&question, false) {
                    self.remove(name).await?;
                }
                Err(e)
            }
        }
    }

    /// Fetch one shard, restore its local name and verify its checksum
    async fn download_shard(&self, name: &str, shard: &DistributedFile) -> Result<PathBuf> {
        let hash = remote_name(&shard.shard_name);
        let staged = self.layout.shard_path(&hash);
        let reference = RemoteRef::new(shard.remote.clone(), &hash);

        let start = Instant::now();
        self.store.download(&reference, &staged).await?;
        let elapsed = start.elapsed();

        let path = self.namer.to_local_name(&hash, &shard.shard_name)?;
        if !shard.checksum.is_empty() && file_checksum(&path)? != shard.checksum {
            remove_if_exists(&path)?;
            return Err(UnicError::Corrupt {
                path: reference.to_string(),
                message: "shard checksum mismatch".to_string(),
            }
            .into());
        }

        self.record(&shard.remote, Direction::Down, fs::metadata(&path)?.len(), elapsed);
        self.datamap.mark_completed(name, &shard.shard_name, true)?;
        Ok(path)
    }

    /// Delete every shard of `name` and its datamap entry
    ///
    /// Shards already confirmed deleted by an earlier, interrupted attempt
    /// are skipped.
    #[instrument(skip(self))]
    pub async fn remove(&self, name: &str) -> Result<()> {
        let info = self.datamap.get(name)?;
        self.datamap.set_operation(name, Operation::Rm)?;

        for shard in info.incomplete_shards() {
            let hash = remote_name(&shard.shard_name);
            let reference = RemoteRef::new(shard.remote.clone(), &hash);
            match self.store.delete(&reference).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    debug!(shard = %hash, remote = %shard.remote, "Shard already gone");
                }
                Err(e) => {
                    warn!(file = %name, shard = %hash, error = %e, "Shard delete failed");
                    return Err(e.into());
                }
            }
            self.datamap.mark_completed(name, &shard.shard_name, true)?;
        }

        self.datamap.remove(name)?;
        info!(file = %name, "File removed");
        Ok(())
    }

    /// Names of every distributed file
    pub fn list(&self) -> Result<Vec<String>> {
        Ok(self.datamap.names()?)
    }

    /// Every distributed file with the shards its remotes currently show
    pub async fn status(&self) -> Result<Vec<FileStatus>> {
        let datamap = self.datamap.all()?;
        let mut listings: HashMap<Remote, Vec<String>> = HashMap::new();

        let mut result = Vec::with_capacity(datamap.len());
        for (name, info) in datamap {
            let mut visible = BTreeSet::new();
            let remotes: BTreeSet<&Remote> = info.shards.values().map(|s| &s.remote).collect();
            for remote in remotes {
                if !listings.contains_key(remote) {
                    let listing = match self.store.list(remote).await {
                        Ok(listing) => listing,
                        Err(e) => {
                            warn!(remote = %remote, error = %e, "Listing failed");
                            Vec::new()
                        }
                    };
                    listings.insert(remote.clone(), listing);
                }
                let on_remote: Vec<String> = listings
                    .get(remote)
                    .map(|l| l.to_vec())
                    .unwrap_or_default();
                let names = self.datamap.resolve_original_names(&name, &on_remote)?;
                // Only count shards placed on this remote
                visible.extend(
                    names
                        .into_iter()
                        .filter(|n| info.shards.get(n).map(|s| &s.remote) == Some(remote)),
                );
            }
            result.push(FileStatus {
                info,
                visible_shards: visible,
            });
        }
        Ok(result)
    }

    fn record(&self, remote: &Remote, direction: Direction, bytes: u64, elapsed: Duration) {
        let value = throughput(bytes, elapsed);
        if let Err(e) = self.balancer.record_sample(remote, direction, value) {
            warn!(remote = %remote, error = %e, "Failed to record throughput");
        }
    }

    pub(crate) fn discard_staged(&self, paths: &[PathBuf]) {
        for path in paths {
            if let Err(e) = remove_if_exists(path) {
                warn!(path = %path.display(), error = %e, "Failed to remove staged shard");
            }
        }
    }
}
