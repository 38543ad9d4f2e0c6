//! Remove Command
//!
//! Deletes every shard of a distributed file and forgets it.

use super::Session;
use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use unic_coordinator::Request;

/// Run rm command
pub async fn run(session: &Session, name: String) -> Result<()> {
    let coordinator = session.coordinator()?;
    let handled = coordinator
        .check_state(&Request::Remove(name.clone()))
        .await
        .context("Failed to resolve unfinished work")?;

    if !handled {
        coordinator
            .remove(&name)
            .await
            .with_context(|| format!("Failed to remove {}", name))?;
    }

    println!("{} Removed {}", style(symbols::CHECK).green(), name);
    Ok(())
}
