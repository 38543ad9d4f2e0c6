//! unic Metadata
//!
//! The datamap: which shards of which file went to which remote, whether
//! each placement completed, and which distributed operation is in flight.
//!
//! # Usage
//!
//! ```ignore
//! use unic_metadata::{DatamapStore, Operation};
//!
//! let store = DatamapStore::open(&layout);
//! let info = store.put(&path, distribution)?;
//! store.mark_completed(&info.original_name, "photo.jpg.0", true)?;
//! store.clear_operation(&info.original_name)?;
//! ```

pub mod models;
pub mod store;

pub use models::*;
pub use store::{DatamapStore, NewDistribution};

use thiserror::Error;
use unic_core::UnicError;

/// Metadata error types
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Another operation is in progress: {0}")]
    AlreadyInProgress(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(UnicError),
}

impl MetadataError {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Core(e) => e.is_not_found(),
            _ => false,
        }
    }
}

impl From<UnicError> for MetadataError {
    fn from(err: UnicError) -> Self {
        match err {
            UnicError::Io(e) => Self::Io(e),
            UnicError::NotFound(what) => Self::NotFound(what),
            UnicError::AlreadyInProgress(what) => Self::AlreadyInProgress(what),
            other => Self::Core(other),
        }
    }
}

impl From<MetadataError> for UnicError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::NotFound(what) => UnicError::NotFound(what),
            MetadataError::AlreadyInProgress(what) => UnicError::AlreadyInProgress(what),
            MetadataError::Io(e) => UnicError::Io(e),
            MetadataError::Core(e) => e,
        }
    }
}

pub type Result<T> = std::result::Result<T, MetadataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions() {
        let err: MetadataError = UnicError::NotFound("x".into()).into();
        assert!(err.is_not_found());

        let err: MetadataError = UnicError::Corrupt {
            path: "p".into(),
            message: "m".into(),
        }
        .into();
        assert!(matches!(err, MetadataError::Core(UnicError::Corrupt { .. })));

        let back: UnicError = MetadataError::AlreadyInProgress("a".into()).into();
        assert!(matches!(back, UnicError::AlreadyInProgress(_)));
    }
}
