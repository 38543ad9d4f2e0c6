//! Datamap models
//!
//! These structs map directly to the persisted `datamap.json` document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use unic_core::erasure::ErasureConfig;
use unic_core::remote::Remote;

/// Distributed operation enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Upload,
    Download,
    Rm,
}

impl Default for Operation {
    fn default() -> Self {
        Self::Upload
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload => write!(f, "upload"),
            Self::Download => write!(f, "download"),
            Self::Rm => write!(f, "rm"),
        }
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(Self::Upload),
            "download" => Ok(Self::Download),
            "rm" | "remove" => Ok(Self::Rm),
            other => Err(format!("unknown operation: {}", other)),
        }
    }
}

/// One shard placement record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributedFile {
    /// Local, human-readable shard name (`<original>.<index>`)
    pub shard_name: String,
    pub remote: Remote,
    pub checksum: String,
    /// Set once the shard is confirmed on (or, while removing, gone from) `remote`
    #[serde(default)]
    pub completed: bool,
}

impl DistributedFile {
    pub fn new(shard_name: impl Into<String>, remote: Remote, checksum: impl Into<String>) -> Self {
        Self {
            shard_name: shard_name.into(),
            remote,
            checksum: checksum.into(),
            completed: false,
        }
    }

    /// Shard index parsed from the `<original>.<index>` name
    pub fn index(&self) -> Option<usize> {
        self.shard_name
            .rsplit_once('.')
            .and_then(|(_, idx)| idx.parse().ok())
    }

    /// Whether the record points at a usable remote
    pub fn has_remote(&self) -> bool {
        !self.remote.name.is_empty() && !self.remote.kind.is_empty()
    }
}

/// Placement record of one original file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub original_name: String,
    pub original_size: u64,
    pub encoded_size: u64,
    pub shard_count: usize,
    pub parity_count: usize,
    pub in_progress: bool,
    pub operation: Operation,
    /// SHA-256 of the original file
    pub checksum: String,
    pub padding: u64,
    pub shards: BTreeMap<String, DistributedFile>,
}

impl FileInfo {
    /// Erasure layout the file was encoded with
    pub fn erasure_config(&self) -> ErasureConfig {
        ErasureConfig {
            data_shards: self.shard_count,
            parity_shards: self.parity_count,
        }
    }

    /// Shards sorted by index
    pub fn ordered_shards(&self) -> Vec<&DistributedFile> {
        let mut shards: Vec<&DistributedFile> = self.shards.values().collect();
        shards.sort_by_key(|s| (s.index().unwrap_or(usize::MAX), s.shard_name.clone()));
        shards
    }

    /// Shards not yet completed that still reference a remote
    pub fn incomplete_shards(&self) -> Vec<DistributedFile> {
        self.shards
            .values()
            .filter(|s| !s.completed && s.has_remote())
            .cloned()
            .collect()
    }

    pub fn completed_shards(&self) -> Vec<DistributedFile> {
        self.shards.values().filter(|s| s.completed).cloned().collect()
    }
}

/// Original file name to placement record
pub type Datamap = BTreeMap<String, FileInfo>;
