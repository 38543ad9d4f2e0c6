//! CLI Commands

pub mod download;
pub mod list;
pub mod password;
pub mod remove;
pub mod status;
pub mod sync;
pub mod upload;

use crate::config::UnicConfig;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use unic_balancer::Strategy;
use unic_coordinator::{Confirm, Coordinator, Progress, Prompt};
use unic_core::crypto::encrypted_path;
use unic_core::remote::RemoteStore;
use unic_core::{AesGcmCipher, Vault, VaultLayout};
use unic_storage::LocalRemoteStore;

/// Everything a command needs, resolved from config and CLI overrides
pub struct Session {
    pub config: UnicConfig,
    pub layout: VaultLayout,
    pub strategy: Strategy,
}

impl Session {
    pub fn new(config: UnicConfig, vault: Option<PathBuf>, strategy: Option<Strategy>) -> Self {
        let root = vault.unwrap_or_else(|| config.vault.root.clone());
        Self {
            layout: VaultLayout::new(root),
            strategy: strategy.unwrap_or(config.balancer.strategy),
            config,
        }
    }

    pub fn store(&self) -> Result<Arc<dyn RemoteStore>> {
        if self.config.remotes.is_empty() {
            anyhow::bail!("No remotes configured. Add [[remotes]] entries to the config file.");
        }
        let store = LocalRemoteStore::new(self.config.remotes.clone())
            .context("Invalid [[remotes]] configuration")?;
        Ok(Arc::new(store))
    }

    pub fn vault(&self) -> Vault<AesGcmCipher> {
        Vault::new(self.layout.clone(), AesGcmCipher::new())
    }

    pub fn is_locked(&self) -> bool {
        encrypted_path(&self.layout.user_password_path()).exists()
    }

    /// Coordinator over the configured remotes, asking questions on the console
    pub fn coordinator(&self) -> Result<Coordinator> {
        if self.is_locked() {
            anyhow::bail!("The vault is locked. Run 'unic unlock' first.");
        }
        let coordinator = Coordinator::new(self.layout.clone(), self.store()?, self.strategy)
            .with_erasure(self.config.erasure.to_config()?)
            .with_confirm(console_confirm())
            .with_progress(Arc::new(ShardProgressBar::default()));
        Ok(coordinator)
    }
}

/// Yes/no prompt on stdin/stdout
pub fn console_confirm() -> Arc<dyn Confirm> {
    Arc::new(Prompt::new(
        BufReader::new(std::io::stdin()),
        std::io::stdout(),
    ))
}

/// One progress bar per upload or download, counting shards
#[derive(Default)]
pub struct ShardProgressBar {
    bar: Mutex<Option<ProgressBar>>,
}

impl ShardProgressBar {
    fn with_bar(&self, f: impl FnOnce(&mut Option<ProgressBar>)) {
        let mut slot = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut slot);
    }
}

impl Progress for ShardProgressBar {
    fn start(&self, file: &str, shards: usize) {
        let pb = ProgressBar::new(shards as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} shards {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(file.to_string());
        self.with_bar(|slot| *slot = Some(pb));
    }

    fn shard_done(&self, _shard: &str) {
        self.with_bar(|slot| {
            if let Some(pb) = slot {
                pb.inc(1);
            }
        });
    }

    fn finish(&self) {
        self.with_bar(|slot| {
            if let Some(pb) = slot.take() {
                pb.finish_and_clear();
            }
        });
    }
}

/// Human-readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
