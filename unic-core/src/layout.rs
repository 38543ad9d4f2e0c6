//! Vault directory layout
//!
//! ```text
//! <root>/
//!   data/datamap.json       placement metadata
//!   data/loadbalancer.json  remote selection statistics
//!   password.txt            internally generated secret
//!   user_password.txt       write-once user passphrase record
//!   shard/                  staging area for shards in flight
//! ```

use std::path::{Path, PathBuf};

pub const DATA_DIR: &str = "data";
pub const SHARD_DIR: &str = "shard";
pub const DATAMAP_FILE: &str = "datamap.json";
pub const LOAD_BALANCER_FILE: &str = "loadbalancer.json";
pub const INTERNAL_SECRET_FILE: &str = "password.txt";
pub const USER_PASSWORD_FILE: &str = "user_password.txt";

/// Paths of every persisted artifact under one vault root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultLayout {
    root: PathBuf,
}

impl VaultLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    pub fn datamap_path(&self) -> PathBuf {
        self.data_dir().join(DATAMAP_FILE)
    }

    pub fn load_balancer_path(&self) -> PathBuf {
        self.data_dir().join(LOAD_BALANCER_FILE)
    }

    pub fn shard_dir(&self) -> PathBuf {
        self.root.join(SHARD_DIR)
    }

    /// Staging path of a shard file
    pub fn shard_path(&self, name: &str) -> PathBuf {
        self.shard_dir().join(name)
    }

    pub fn internal_secret_path(&self) -> PathBuf {
        self.root.join(INTERNAL_SECRET_FILE)
    }

    pub fn user_password_path(&self) -> PathBuf {
        self.root.join(USER_PASSWORD_FILE)
    }

    /// Create the data and shard directories
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.data_dir())?;
        std::fs::create_dir_all(self.shard_dir())
    }
}
