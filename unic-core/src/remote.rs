//! Remote identities and the remote storage capability
//!
//! A [`Remote`] names one storage backend. The actual transfer to and from a
//! backend is delegated to a [`RemoteStore`] implementation; the coordination
//! layer never talks to a provider directly.

use crate::error::{Result, UnicError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Separator used by the canonical `name|kind` key form
pub const REMOTE_KEY_SEPARATOR: char = '|';

/// A storage backend identified by name and backend kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Remote {
    pub name: String,
    pub kind: String,
}

impl Remote {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }

    /// Canonical map key (`name|kind`)
    pub fn key(&self) -> String {
        format!("{}{}{}", self.name, REMOTE_KEY_SEPARATOR, self.kind)
    }

    /// Parse a canonical key back into a remote
    pub fn from_key(key: &str) -> Result<Self> {
        let parts: Vec<&str> = key.split(REMOTE_KEY_SEPARATOR).collect();
        match parts.as_slice() {
            [name, kind] if !name.is_empty() && !kind.is_empty() => Ok(Self::new(*name, *kind)),
            _ => Err(UnicError::Configuration(format!(
                "invalid remote key: {:?}",
                key
            ))),
        }
    }
}

impl fmt::Display for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for Remote {
    type Err = UnicError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_key(s)
    }
}

/// Location of one blob on one remote
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteRef {
    pub remote: Remote,
    pub name: String,
}

impl RemoteRef {
    pub fn new(remote: Remote, name: impl Into<String>) -> Self {
        Self {
            remote,
            name: name.into(),
        }
    }
}

impl fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.remote.name, self.name)
    }
}

/// Transfer capability for a set of configured remotes
///
/// Implementations own retry and timeout policy; the coordination layer
/// issues each call once and treats an error as final.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All configured remotes, in configuration order
    async fn remotes(&self) -> Result<Vec<Remote>>;

    /// Names of the blobs stored on a remote
    async fn list(&self, remote: &Remote) -> Result<Vec<String>>;

    /// Remaining free capacity of a remote in bytes
    async fn free_space(&self, remote: &Remote) -> Result<u64>;

    /// Upload a local file; the blob keeps the file's name
    async fn upload(&self, local_path: &Path, remote: &Remote) -> Result<RemoteRef>;

    /// Download a blob into `local_path`
    async fn download(&self, reference: &RemoteRef, local_path: &Path) -> Result<()>;

    /// Delete a blob
    async fn delete(&self, reference: &RemoteRef) -> Result<()>;

    /// Mirror a local directory onto a remote
    async fn push_dir(&self, local_dir: &Path, remote: &Remote) -> Result<()>;

    /// Mirror a remote copy of a directory into `local_dir`
    async fn pull_dir(&self, remote: &Remote, local_dir: &Path) -> Result<()>;
}
