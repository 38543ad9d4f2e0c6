//! Datamap Store
//!
//! Owns `data/datamap.json`. Every mutation is a whole-document
//! read-modify-write under the document lock, persisted atomically.
//!
//! At most one file may be in flight (`in_progress`) at a time. The store
//! refuses to start a second operation while another file is flagged, which
//! is what lets recovery find "the" interrupted operation.

use crate::models::{Datamap, DistributedFile, FileInfo, Operation};
use crate::{MetadataError, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};
use unic_core::crypto::file_checksum;
use unic_core::document::JsonDocument;
use unic_core::layout::VaultLayout;
use unic_core::namer::remote_name;

/// Parameters of a freshly encoded upload
#[derive(Debug, Clone)]
pub struct NewDistribution {
    pub shards: Vec<DistributedFile>,
    pub encoded_size: u64,
    pub padding: u64,
    pub shard_count: usize,
    pub parity_count: usize,
}

/// Persisted mapping from original file name to placement metadata
pub struct DatamapStore {
    doc: JsonDocument<Datamap>,
}

impl DatamapStore {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            doc: JsonDocument::new(path),
        }
    }

    pub fn open(layout: &VaultLayout) -> Self {
        Self::new(layout.datamap_path())
    }

    pub fn path(&self) -> &Path {
        self.doc.path()
    }

    fn update<R>(&self, f: impl FnOnce(&mut Datamap) -> Result<R>) -> Result<R> {
        self.doc.update(f)
    }

    /// Record a new upload of `original_path`
    ///
    /// The entry starts in flight with operation `upload`. Fails with
    /// `AlreadyInProgress` if a different file is in flight.
    pub fn put(&self, original_path: &Path, distribution: NewDistribution) -> Result<FileInfo> {
        let original_name = original_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                MetadataError::NotFound(format!("file name of {}", original_path.display()))
            })?
            .to_string();
        let size = std::fs::metadata(original_path)?.len();
        let checksum = file_checksum(original_path)?;

        let shards: BTreeMap<String, DistributedFile> = distribution
            .shards
            .into_iter()
            .map(|s| (s.shard_name.clone(), s))
            .collect();

        let info = FileInfo {
            original_name: original_name.clone(),
            original_size: size,
            encoded_size: distribution.encoded_size,
            shard_count: distribution.shard_count,
            parity_count: distribution.parity_count,
            in_progress: true,
            operation: Operation::Upload,
            checksum,
            padding: distribution.padding,
            shards,
        };

        let stored = info.clone();
        self.update(move |map| {
            ensure_idle(map, &original_name)?;
            map.insert(original_name, stored);
            Ok(())
        })?;

        info!(file = %info.original_name, shards = info.shards.len(), "Datamap entry created");
        Ok(info)
    }

    pub fn get(&self, name: &str) -> Result<FileInfo> {
        self.doc
            .load()?
            .remove(name)
            .ok_or_else(|| MetadataError::NotFound(format!("file '{}'", name)))
    }

    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.doc.load()?.contains_key(name))
    }

    /// Every entry, keyed by original name
    pub fn all(&self) -> Result<Datamap> {
        Ok(self.doc.load()?)
    }

    /// Names of every distributed file
    pub fn names(&self) -> Result<Vec<String>> {
        Ok(self.doc.load()?.into_keys().collect())
    }

    /// Delete an entry; returns whether it existed
    pub fn remove(&self, name: &str) -> Result<bool> {
        let removed = self.update(|map| Ok(map.remove(name).is_some()))?;
        if removed {
            info!(file = %name, "Datamap entry removed");
        }
        Ok(removed)
    }

    /// Apply `mutator` to one shard record
    pub fn update_shard(
        &self,
        name: &str,
        shard_name: &str,
        mutator: impl FnOnce(&mut DistributedFile),
    ) -> Result<()> {
        self.update(|map| {
            let info = map
                .get_mut(name)
                .ok_or_else(|| MetadataError::NotFound(format!("file '{}'", name)))?;
            let shard = info.shards.get_mut(shard_name).ok_or_else(|| {
                MetadataError::NotFound(format!("shard '{}' of '{}'", shard_name, name))
            })?;
            mutator(shard);
            Ok(())
        })
    }

    pub fn mark_completed(&self, name: &str, shard_name: &str, completed: bool) -> Result<()> {
        self.update_shard(name, shard_name, |s| s.completed = completed)?;
        debug!(file = %name, shard = %shard_name, completed, "Shard state updated");
        Ok(())
    }

    /// Flag `name` as in flight with `op`
    pub fn set_operation(&self, name: &str, op: Operation) -> Result<()> {
        self.update(|map| {
            ensure_idle(map, name)?;
            let info = map
                .get_mut(name)
                .ok_or_else(|| MetadataError::NotFound(format!("file '{}'", name)))?;
            info.in_progress = true;
            info.operation = op;
            Ok(())
        })?;
        debug!(file = %name, operation = %op, "Operation started");
        Ok(())
    }

    /// Clear the in-flight flag and every shard's completion flag
    pub fn clear_operation(&self, name: &str) -> Result<()> {
        self.update(|map| {
            let info = map
                .get_mut(name)
                .ok_or_else(|| MetadataError::NotFound(format!("file '{}'", name)))?;
            info.in_progress = false;
            for shard in info.shards.values_mut() {
                shard.completed = false;
            }
            Ok(())
        })?;
        debug!(file = %name, "Operation cleared");
        Ok(())
    }

    /// The entry currently in flight, if any
    ///
    /// Fails with `AlreadyInProgress` if more than one entry is flagged.
    pub fn find_active_operation(&self) -> Result<Option<FileInfo>> {
        let mut active: Vec<FileInfo> = self
            .doc
            .load()?
            .into_values()
            .filter(|info| info.in_progress)
            .collect();
        match active.len() {
            0 => Ok(None),
            1 => Ok(active.pop()),
            _ => Err(MetadataError::AlreadyInProgress(
                active
                    .iter()
                    .map(|i| i.original_name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            )),
        }
    }

    /// Shards of `name` with `completed=false`
    pub fn incomplete_shards(&self, name: &str) -> Result<Vec<DistributedFile>> {
        Ok(self.get(name)?.incomplete_shards())
    }

    /// Checksums of every shard of `name`
    pub fn checksums_of(&self, name: &str) -> Result<Vec<String>> {
        Ok(self
            .get(name)?
            .ordered_shards()
            .into_iter()
            .map(|s| s.checksum.clone())
            .collect())
    }

    /// Map remote (hashed) shard names back to the shard names of `name`
    ///
    /// Hashes that do not belong to `name` are dropped; input order is kept.
    pub fn resolve_original_names(&self, name: &str, hashes: &[String]) -> Result<Vec<String>> {
        let info = self.get(name)?;
        let by_hash: HashMap<String, &str> = info
            .shards
            .keys()
            .map(|shard| (remote_name(shard), shard.as_str()))
            .collect();
        Ok(hashes
            .iter()
            .filter_map(|h| by_hash.get(h).map(|s| s.to_string()))
            .collect())
    }
}

fn ensure_idle(map: &Datamap, name: &str) -> Result<()> {
    match map.values().find(|i| i.in_progress && i.original_name != name) {
        Some(other) => Err(MetadataError::AlreadyInProgress(other.original_name.clone())),
        None => Ok(()),
    }
}
