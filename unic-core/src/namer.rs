//! Shard naming
//!
//! Shards are staged locally under a human-readable name and renamed to the
//! hex SHA-256 of that name before they are handed to a remote, so storage
//! providers never see original file names.

use crate::crypto::sha256_hex;
use crate::error::{Result, UnicError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Remote-facing name of a shard
pub fn remote_name(local_shard_name: &str) -> String {
    sha256_hex(local_shard_name)
}

/// Renames staged shards between their local and remote names
#[derive(Debug, Clone)]
pub struct ShardNamer {
    shard_dir: PathBuf,
}

impl ShardNamer {
    pub fn new(shard_dir: impl Into<PathBuf>) -> Self {
        Self {
            shard_dir: shard_dir.into(),
        }
    }

    pub fn shard_dir(&self) -> &Path {
        &self.shard_dir
    }

    /// Rename a staged shard to its hashed name and return the hash
    pub fn to_remote_name(&self, local_shard_name: &str) -> Result<String> {
        let hash = remote_name(local_shard_name);
        let from = self.shard_dir.join(local_shard_name);
        let to = self.shard_dir.join(&hash);
        rename(&from, &to, local_shard_name)?;
        debug!(shard = %local_shard_name, hash = %hash, "Shard renamed for upload");
        Ok(hash)
    }

    /// Restore a fetched shard to its original name
    pub fn to_local_name(&self, hash: &str, original_shard_name: &str) -> Result<PathBuf> {
        let from = self.shard_dir.join(hash);
        let to = self.shard_dir.join(original_shard_name);
        rename(&from, &to, hash)?;
        debug!(hash = %hash, shard = %original_shard_name, "Shard restored to local name");
        Ok(to)
    }
}

fn rename(from: &Path, to: &Path, label: &str) -> Result<()> {
    fs::rename(from, to).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            UnicError::NotFound(format!("staged shard {}", label))
        } else {
            e.into()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remote_name_is_sha256_hex() {
        let hash = remote_name("shard_1");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, sha256_hex("shard_1"));
        assert_ne!(hash, remote_name("shard_2"));
    }

    #[test]
    fn test_rename_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let namer = ShardNamer::new(tmp.path());
        fs::write(tmp.path().join("shard_1"), b"payload").unwrap();

        let hash = namer.to_remote_name("shard_1").unwrap();
        assert_eq!(hash, remote_name("shard_1"));
        assert!(!tmp.path().join("shard_1").exists());
        assert!(tmp.path().join(&hash).exists());

        let restored = namer.to_local_name(&hash, "shard_1").unwrap();
        assert_eq!(restored, tmp.path().join("shard_1"));
        assert_eq!(fs::read(restored).unwrap(), b"payload");
        assert!(!tmp.path().join(&hash).exists());
    }

    #[test]
    fn test_to_local_name_missing_file() {
        let tmp = TempDir::new().unwrap();
        let namer = ShardNamer::new(tmp.path());
        let err = namer.to_local_name(&remote_name("x"), "x").unwrap_err();
        assert!(err.is_not_found());
    }
}
