//! unic Core Library
//!
//! Core abstractions for the unic distributed storage vault.
//! This crate provides:
//! - The error taxonomy shared by every unic crate
//! - Remote identities and the `RemoteStore` capability
//! - Reed-Solomon erasure coding (10 data + 4 parity shards by default)
//! - SHA-256 checksums, shard naming and AES-GCM file encryption
//! - Atomic JSON document persistence and the vault layout
//! - The Vault Encryptor guarding the local state directory

pub mod crypto;
pub mod document;
pub mod erasure;
pub mod error;
pub mod layout;
pub mod namer;
pub mod remote;
pub mod vault;

pub use crypto::{
    encrypted_path, file_checksum, file_checksums, sha256_hex, AesGcmCipher, Cipher,
    EncryptionKey,
};
pub use document::JsonDocument;
pub use erasure::{shard_file_name, Codec, EncodedFile, ErasureConfig, ReedSolomonCodec};
pub use error::{Result, UnicError};
pub use layout::VaultLayout;
pub use namer::{remote_name, ShardNamer};
pub use remote::{Remote, RemoteRef, RemoteStore};
pub use vault::Vault;

/// Default erasure coding configuration
/// - 10 data shards: minimum required to reconstruct
/// - 4 parity shards: can tolerate 4 lost shards
///
/// The CLI overrides these via UNIC_DATA_SHARDS / UNIC_PARITY_SHARDS.
pub const DATA_SHARDS: usize = 10;
pub const PARITY_SHARDS: usize = 4;
