//! Whole-document JSON persistence
//!
//! Every persisted document is read whole, modified in memory and written
//! whole. Writes go to a uniquely named temporary sibling that is fsynced
//! and then renamed over the target, so a crash mid-write leaves either the
//! old or the new document, never a torn one. All read-modify-write cycles on one document
//! serialize through the document's mutex.
//!
//! The lock is in-process only. A second OS process writing the same file is
//! not coordinated.

use crate::error::{Result, UnicError};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// A JSON document on disk, exclusively owned by one store
pub struct JsonDocument<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current document
    ///
    /// A missing or empty file reads as `T::default()`.
    pub fn load(&self) -> Result<T> {
        let _guard = self.lock.lock();
        self.read_unlocked()
    }

    /// Replace the whole document
    pub fn store(&self, value: &T) -> Result<()> {
        let _guard = self.lock.lock();
        self.write_unlocked(value)
    }

    /// Read, apply `f`, and write back under the document lock
    ///
    /// If `f` fails nothing is written. The error type is the caller's, so
    /// stores layered on top can fail with their own errors.
    pub fn update<R, E>(&self, f: impl FnOnce(&mut T) -> std::result::Result<R, E>) -> std::result::Result<R, E>
    where
        E: From<UnicError>,
    {
        let _guard = self.lock.lock();
        let mut value = self.read_unlocked()?;
        let out = f(&mut value)?;
        self.write_unlocked(&value)?;
        Ok(out)
    }

    fn read_unlocked(&self) -> Result<T> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(T::default());
        }
        serde_json::from_slice(&bytes).map_err(|e| UnicError::Corrupt {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn write_unlocked(&self, value: &T) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let data = serde_json::to_vec_pretty(value)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        debug!(path = %self.path.display(), bytes = data.len(), "Document written");
        Ok(())
    }
}
