//! Sync Commands
//!
//! Copies the locked vault to every remote, or restores it from one.

use super::Session;
use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use unic_coordinator::{sync_from_any, sync_to_all};

/// Push the vault to every remote
pub async fn push(session: &Session) -> Result<()> {
    if !session.is_locked() {
        anyhow::bail!("Only a locked vault is pushed. Run 'unic lock' first.");
    }
    let count = sync_to_all(session.store()?, session.layout.root())
        .await
        .context("Failed to push the vault")?;
    println!(
        "{} Vault pushed to {} remotes",
        style(symbols::CHECK).green(),
        count
    );
    Ok(())
}

/// Restore the vault from the first remote holding a copy
pub async fn pull(session: &Session) -> Result<()> {
    let remote = sync_from_any(session.store()?, session.layout.root())
        .await
        .context("Failed to pull the vault")?;
    println!(
        "{} Vault restored from {}",
        style(symbols::CHECK).green(),
        remote
    );
    Ok(())
}
