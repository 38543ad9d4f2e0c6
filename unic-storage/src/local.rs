//! Directory-backed remote store
//!
//! Each remote is a directory on a locally mounted filesystem (a network
//! share, a synced cloud folder, a removable drive). Blobs are plain files
//! at the top level of the directory; the vault copy used by bulk sync
//! lives under [`VAULT_MIRROR_DIR`].

use crate::memory::file_name;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use unic_core::error::{Result, UnicError};
use unic_core::remote::{Remote, RemoteRef, RemoteStore};
use walkdir::WalkDir;

/// Directory inside a remote that holds the synced vault copy
pub const VAULT_MIRROR_DIR: &str = ".unic-vault";

/// Configuration of one directory-backed remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRemoteConfig {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub path: PathBuf,
    /// Capacity reported to the balancer (unlimited if unset)
    #[serde(default)]
    pub capacity: Option<u64>,
}

fn default_kind() -> String {
    "local".to_string()
}

impl LocalRemoteConfig {
    pub fn remote(&self) -> Remote {
        Remote::new(&self.name, &self.kind)
    }
}

/// Remote store over local directories
pub struct LocalRemoteStore {
    order: Vec<Remote>,
    remotes: HashMap<Remote, LocalRemoteConfig>,
}

impl LocalRemoteStore {
    pub fn new(configs: impl IntoIterator<Item = LocalRemoteConfig>) -> Result<Self> {
        let mut order = Vec::new();
        let mut remotes = HashMap::new();
        for config in configs {
            let remote = config.remote();
            if remotes.contains_key(&remote) {
                return Err(UnicError::Configuration(format!(
                    "remote {} configured twice",
                    remote
                )));
            }
            order.push(remote.clone());
            remotes.insert(remote, config);
        }
        Ok(Self { order, remotes })
    }

    fn config(&self, remote: &Remote) -> Result<&LocalRemoteConfig> {
        self.remotes
            .get(remote)
            .ok_or_else(|| UnicError::NotFound(format!("remote {}", remote)))
    }

    fn blob_path(&self, reference: &RemoteRef) -> Result<PathBuf> {
        Ok(self.config(&reference.remote)?.path.join(&reference.name))
    }
}

#[async_trait]
impl RemoteStore for LocalRemoteStore {
    async fn remotes(&self) -> Result<Vec<Remote>> {
        Ok(self.order.clone())
    }

    async fn list(&self, remote: &Remote) -> Result<Vec<String>> {
        let root = &self.config(remote)?.path;
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(UnicError::remote(remote, e)),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn free_space(&self, remote: &Remote) -> Result<u64> {
        let config = self.config(remote)?;
        if !config.path.is_dir() {
            return Err(UnicError::remote(
                remote,
                format!("{} is not a directory", config.path.display()),
            ));
        }
        let used: u64 = WalkDir::new(&config.path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.metadata().ok())
            .filter(|m| m.is_file())
            .map(|m| m.len())
            .sum();
        Ok(config.capacity.unwrap_or(u64::MAX).saturating_sub(used))
    }

    async fn upload(&self, local_path: &Path, remote: &Remote) -> Result<RemoteRef> {
        let reference = RemoteRef::new(remote.clone(), file_name(local_path)?);
        let target = self.blob_path(&reference)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local_path, &target)
            .await
            .map_err(|e| UnicError::remote(remote, e))?;
        debug!(remote = %remote, blob = %reference.name, "Blob stored");
        Ok(reference)
    }

    async fn download(&self, reference: &RemoteRef, local_path: &Path) -> Result<()> {
        let source = self.blob_path(reference)?;
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        match tokio::fs::copy(&source, local_path).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(UnicError::NotFound(format!("blob {}", reference)))
            }
            Err(e) => Err(UnicError::remote(&reference.remote, e)),
        }
    }

    async fn delete(&self, reference: &RemoteRef) -> Result<()> {
        let path = self.blob_path(reference)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(UnicError::NotFound(format!("blob {}", reference)))
            }
            Err(e) => Err(UnicError::remote(&reference.remote, e)),
        }
    }

    async fn push_dir(&self, local_dir: &Path, remote: &Remote) -> Result<()> {
        let mirror = self.config(remote)?.path.join(VAULT_MIRROR_DIR);
        match tokio::fs::remove_dir_all(&mirror).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(UnicError::remote(remote, e)),
        }
        copy_tree(local_dir, &mirror)
            .await
            .map_err(|e| UnicError::remote(remote, e))
    }

    async fn pull_dir(&self, remote: &Remote, local_dir: &Path) -> Result<()> {
        let mirror = self.config(remote)?.path.join(VAULT_MIRROR_DIR);
        if !mirror.is_dir() {
            return Err(UnicError::NotFound(format!("vault copy on {}", remote)));
        }
        copy_tree(&mirror, local_dir)
            .await
            .map_err(|e| UnicError::remote(remote, e))
    }
}

async fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|e| UnicError::remote(from.display(), e))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| UnicError::remote(from.display(), e))?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            tokio::fs::create_dir_all(&target).await?;
        } else if entry.file_type().is_file() {
            tokio::fs::copy(entry.path(), &target).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> (LocalRemoteStore, Remote, Remote) {
        let configs = vec![
            LocalRemoteConfig {
                name: "one".into(),
                kind: "local".into(),
                path: tmp.path().join("one"),
                capacity: Some(1_000),
            },
            LocalRemoteConfig {
                name: "two".into(),
                kind: "local".into(),
                path: tmp.path().join("two"),
                capacity: None,
            },
        ];
        for c in &configs {
            std::fs::create_dir_all(&c.path).unwrap();
        }
        let one = configs[0].remote();
        let two = configs[1].remote();
        (LocalRemoteStore::new(configs).unwrap(), one, two)
    }

    #[tokio::test]
    async fn test_blob_lifecycle() {
        let tmp = TempDir::new().unwrap();
        let (store, one, _) = store(&tmp);
        let local = tmp.path().join("abc");
        std::fs::write(&local, vec![7u8; 100]).unwrap();

        let reference = store.upload(&local, &one).await.unwrap();
        assert_eq!(store.list(&one).await.unwrap(), vec!["abc".to_string()]);
        assert_eq!(store.free_space(&one).await.unwrap(), 900);

        let out = tmp.path().join("fetched");
        store.download(&reference, &out).await.unwrap();
        assert_eq!(std::fs::read(&out).unwrap().len(), 100);

        store.delete(&reference).await.unwrap();
        assert!(store.list(&one).await.unwrap().is_empty());
        assert!(store.download(&reference, &out).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_missing_directory_fails_probe() {
        let tmp = TempDir::new().unwrap();
        let (store, _, two) = store(&tmp);
        std::fs::remove_dir_all(tmp.path().join("two")).unwrap();
        assert!(matches!(
            store.free_space(&two).await,
            Err(UnicError::Remote { .. })
        ));
    }

    #[tokio::test]
    async fn test_mirror_not_listed_as_blob() {
        let tmp = TempDir::new().unwrap();
        let (store, _, two) = store(&tmp);
        let vault = tmp.path().join("vault");
        std::fs::create_dir_all(vault.join("data")).unwrap();
        std::fs::write(vault.join("data/datamap.json"), b"{}").unwrap();

        store.push_dir(&vault, &two).await.unwrap();
        assert!(store.list(&two).await.unwrap().is_empty());

        let restored = tmp.path().join("restored");
        store.pull_dir(&two, &restored).await.unwrap();
        assert_eq!(std::fs::read(restored.join("data/datamap.json")).unwrap(), b"{}");
    }

    #[test]
    fn test_duplicate_remote_rejected() {
        let config = LocalRemoteConfig {
            name: "x".into(),
            kind: "local".into(),
            path: PathBuf::from("/tmp/x"),
            capacity: None,
        };
        assert!(LocalRemoteStore::new(vec![config.clone(), config]).is_err());
    }
}
