//! unic Load Balancer
//!
//! Chooses which remote receives each shard. Four strategies:
//! - RoundRobin: persisted counter modulo the candidate count
//! - ResourceBased: most free space, probed concurrently once per process
//! - UploadOptima / DownloadOptima: best recorded average throughput
//!
//! Statistics live in `data/loadbalancer.json`.

pub mod balancer;
pub mod config;
pub mod probe;
pub mod stats;

// Re-export main types
pub use balancer::LoadBalancer;
pub use config::Strategy;
pub use probe::{probe_free_space, ProbeResult};
pub use stats::{Direction, LoadBalancerInfo, RemoteInfo, StatsStore};

use thiserror::Error;
use unic_core::UnicError;

/// Balancer error types
#[derive(Error, Debug)]
pub enum BalancerError {
    #[error("No remotes configured")]
    NoRemotes,

    #[error("All remotes unavailable: {0}")]
    AllRemotesUnavailable(String),

    #[error("Invalid load balancer strategy: {0} (expected RoundRobin, ResourceBased, UploadOptima or DownloadOptima)")]
    InvalidStrategy(String),

    #[error(transparent)]
    Core(#[from] UnicError),
}

impl From<BalancerError> for UnicError {
    fn from(err: BalancerError) -> Self {
        match err {
            BalancerError::NoRemotes => UnicError::AllRemotesUnavailable("no remotes configured".into()),
            BalancerError::AllRemotesUnavailable(msg) => UnicError::AllRemotesUnavailable(msg),
            BalancerError::InvalidStrategy(s) => {
                UnicError::Configuration(format!("invalid load balancer strategy: {}", s))
            }
            BalancerError::Core(e) => e,
        }
    }
}

pub type Result<T> = std::result::Result<T, BalancerError>;
