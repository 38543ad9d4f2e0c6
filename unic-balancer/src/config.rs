//! Balancer configuration
//!
//! The strategy is parsed once, where configuration enters the program;
//! everything past this point works with the typed [`Strategy`].

use crate::{BalancerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Remote selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum Strategy {
    /// Cycle through remotes with a persisted counter
    #[default]
    RoundRobin,
    /// Remote with the most free space, probed once per process
    ResourceBased,
    /// Remote with the best recorded upload throughput
    UploadOptima,
    /// Remote with the best recorded download throughput
    DownloadOptima,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::RoundRobin,
        Strategy::ResourceBased,
        Strategy::UploadOptima,
        Strategy::DownloadOptima,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "RoundRobin",
            Self::ResourceBased => "ResourceBased",
            Self::UploadOptima => "UploadOptima",
            Self::DownloadOptima => "DownloadOptima",
        }
    }

    /// Read `UNIC_STRATEGY`, falling back to the default
    pub fn from_env() -> Result<Self> {
        match std::env::var("UNIC_STRATEGY") {
            Ok(v) if !v.trim().is_empty() => v.parse(),
            _ => Ok(Self::default()),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = BalancerError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "roundrobin" => Ok(Self::RoundRobin),
            "resourcebased" => Ok(Self::ResourceBased),
            "uploadoptima" => Ok(Self::UploadOptima),
            "downloadoptima" => Ok(Self::DownloadOptima),
            _ => Err(BalancerError::InvalidStrategy(s.to_string())),
        }
    }
}

impl TryFrom<String> for Strategy {
    type Error = BalancerError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Strategy> for String {
    fn from(value: Strategy) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strategies() {
        for strategy in Strategy::ALL {
            assert_eq!(strategy.as_str().parse::<Strategy>().unwrap(), strategy);
        }
        assert_eq!("round-robin".parse::<Strategy>().unwrap(), Strategy::RoundRobin);
        assert_eq!(
            "upload_optima".parse::<Strategy>().unwrap(),
            Strategy::UploadOptima
        );
        assert!(matches!(
            "None".parse::<Strategy>(),
            Err(BalancerError::InvalidStrategy(_))
        ));
    }

    #[test]
    fn test_default_strategy() {
        assert_eq!(Strategy::default(), Strategy::RoundRobin);
    }

    #[test]
    fn test_serde_uses_names() {
        assert_eq!(
            serde_json::to_string(&Strategy::ResourceBased).unwrap(),
            "\"ResourceBased\""
        );
        assert_eq!(
            serde_json::from_str::<Strategy>("\"DownloadOptima\"").unwrap(),
            Strategy::DownloadOptima
        );
        assert!(serde_json::from_str::<Strategy>("\"Fastest\"").is_err());
    }
}
