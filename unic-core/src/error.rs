//! Error types for unic
//!
//! Provides a unified error type for the storage coordination layer.

use thiserror::Error;

/// Result type alias for unic operations
pub type Result<T> = std::result::Result<T, UnicError>;

/// Unified error type for unic
#[derive(Error, Debug)]
pub enum UnicError {
    // ===== Lookup Errors =====
    #[error("Not found: {0}")]
    NotFound(String),

    // ===== Coordination Errors =====
    #[error("Operation already in progress: {0}")]
    AlreadyInProgress(String),

    #[error("All remotes unavailable: {0}")]
    AllRemotesUnavailable(String),

    #[error("Remote error on {remote}: {message}")]
    Remote { remote: String, message: String },

    // ===== Vault Errors =====
    #[error("Password verification failed")]
    PasswordMismatch,

    #[error("Password already set and cannot be changed")]
    AlreadySet,

    // ===== Erasure Coding Errors =====
    #[error("Erasure coding error: {0}")]
    ErasureCoding(String),

    #[error("Insufficient shards: have {available}, need {required}")]
    InsufficientShards { available: usize, required: usize },

    // ===== Cryptography Errors =====
    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Authentication failed while decrypting {0}")]
    Authentication(String),

    // ===== Persistence Errors =====
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt document {path}: {message}")]
    Corrupt { path: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    // ===== Configuration Errors =====
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl UnicError {
    /// Build a collaborator failure for the given remote
    pub fn remote(remote: impl ToString, message: impl ToString) -> Self {
        UnicError::Remote {
            remote: remote.to_string(),
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, UnicError::NotFound(_))
    }
}

impl From<reed_solomon_erasure::Error> for UnicError {
    fn from(err: reed_solomon_erasure::Error) -> Self {
        UnicError::ErasureCoding(err.to_string())
    }
}

impl From<serde_json::Error> for UnicError {
    fn from(err: serde_json::Error) -> Self {
        UnicError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = UnicError::InsufficientShards {
            available: 8,
            required: 10,
        };
        assert_eq!(err.to_string(), "Insufficient shards: have 8, need 10");

        let err = UnicError::remote("gdrive|drive", "quota exceeded");
        assert_eq!(
            err.to_string(),
            "Remote error on gdrive|drive: quota exceeded"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: UnicError = io_err.into();
        assert!(matches!(err, UnicError::Io(_)));
        assert!(!err.is_not_found());
        assert!(UnicError::NotFound("a.txt".into()).is_not_found());
    }
}
