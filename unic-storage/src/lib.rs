//! unic Remote Stores
//!
//! Concrete implementations of the `RemoteStore` capability:
//! - `MemoryRemoteStore` for testing, with programmable free space and failures
//! - `LocalRemoteStore` for remotes mounted as local directories

pub mod local;
pub mod memory;

pub use local::{LocalRemoteConfig, LocalRemoteStore, VAULT_MIRROR_DIR};
pub use memory::{FailOp, MemoryRemoteStore};
