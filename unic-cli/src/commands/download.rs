//! Download Command
//!
//! Rebuilds a distributed file from its shards.

use super::Session;
use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use std::path::PathBuf;
use unic_coordinator::Request;

/// Run download command
pub async fn run(session: &Session, name: String, dest: PathBuf) -> Result<()> {
    let coordinator = session.coordinator()?;
    coordinator
        .check_state(&Request::Download {
            name: name.clone(),
            dest: dest.clone(),
        })
        .await
        .context("Failed to resolve unfinished work")?;

    let path = coordinator
        .download(&name, &dest)
        .await
        .with_context(|| format!("Failed to download {}", name))?;

    println!(
        "{} Downloaded {} to {}",
        style(symbols::CHECK).green(),
        style(&name).bold(),
        path.display()
    );
    Ok(())
}
