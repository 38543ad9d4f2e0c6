//! Configuration management
//!
//! Config directory: ~/.unic/ (cross-platform)
//!
//! Config file format (~/.unic/config.toml):
//! ```toml
//! [vault]
//! root = "/home/me/.unic/vault"
//!
//! [erasure]
//! data_shards = 10
//! parity_shards = 4
//!
//! [balancer]
//! strategy = "RoundRobin"
//!
//! [[remotes]]
//! name = "usb"
//! path = "/mnt/usb/unic"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use unic_balancer::Strategy;
use unic_core::ErasureConfig;
use unic_storage::LocalRemoteConfig;

/// Structure of ~/.unic/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UnicConfig {
    #[serde(default)]
    pub vault: VaultSettings,

    #[serde(default)]
    pub erasure: ErasureSettings,

    #[serde(default)]
    pub balancer: BalancerSettings,

    /// Directory-backed remotes
    #[serde(default)]
    pub remotes: Vec<LocalRemoteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSettings {
    /// Vault root holding metadata and staged shards
    #[serde(default = "default_vault_root")]
    pub root: PathBuf,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            root: default_vault_root(),
        }
    }
}

fn default_vault_root() -> PathBuf {
    std::env::var("UNIC_VAULT_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".unic")
                .join("vault")
        })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErasureSettings {
    #[serde(default = "default_data_shards")]
    pub data_shards: usize,

    #[serde(default = "default_parity_shards")]
    pub parity_shards: usize,
}

impl Default for ErasureSettings {
    fn default() -> Self {
        Self {
            data_shards: default_data_shards(),
            parity_shards: default_parity_shards(),
        }
    }
}

impl ErasureSettings {
    pub fn to_config(&self) -> Result<ErasureConfig> {
        ErasureConfig::new(self.data_shards, self.parity_shards)
            .context("Invalid [erasure] settings")
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn default_data_shards() -> usize {
    env_usize("UNIC_DATA_SHARDS", unic_core::DATA_SHARDS)
}

fn default_parity_shards() -> usize {
    env_usize("UNIC_PARITY_SHARDS", unic_core::PARITY_SHARDS)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancerSettings {
    /// Parsed into a [`Strategy`] when the file is read
    #[serde(default = "default_strategy")]
    pub strategy: Strategy,
}

impl Default for BalancerSettings {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
        }
    }
}

fn default_strategy() -> Strategy {
    Strategy::from_env().unwrap_or_default()
}

/// Get the config directory path (~/.unic/)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let config_dir = home.join(".unic");

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir).context("Failed to create config directory ~/.unic/")?;
    }

    Ok(config_dir)
}

/// Get the config file path
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load configuration, falling back to defaults if the file is missing or unreadable
pub fn load_config() -> UnicConfig {
    match config_file_path() {
        Ok(path) => load_config_from(&path),
        Err(_) => UnicConfig::default(),
    }
}

pub fn load_config_from(path: &Path) -> UnicConfig {
    if !path.exists() {
        return UnicConfig::default();
    }
    match fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: Failed to parse config file: {}", e);
                UnicConfig::default()
            }
        },
        Err(e) => {
            eprintln!("Warning: Failed to read config file: {}", e);
            UnicConfig::default()
        }
    }
}

/// Save configuration to file
pub fn save_config(config: &UnicConfig) -> Result<()> {
    save_config_to(config, &config_file_path()?)
}

pub fn save_config_to(config: &UnicConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, content).context("Failed to write config file")?;
    Ok(())
}
