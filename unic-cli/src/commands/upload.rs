//! Upload Command
//!
//! Erasure-codes a local file and spreads its shards over the remotes.

use super::Session;
use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use std::path::PathBuf;
use unic_coordinator::{Request, UploadOutcome};

/// Run upload command
pub async fn run(session: &Session, path: PathBuf) -> Result<()> {
    if !path.is_file() {
        anyhow::bail!("Not a file: {}", path.display());
    }

    let coordinator = session.coordinator()?;
    coordinator
        .check_state(&Request::Upload { path: path.clone() })
        .await
        .context("Failed to resolve unfinished work")?;

    let outcome = coordinator
        .upload(&path, session.strategy)
        .await
        .with_context(|| format!("Failed to upload {}", path.display()))?;

    match outcome {
        UploadOutcome::Uploaded(info) => {
            println!(
                "{} Uploaded {} ({}) as {} data + {} parity shards using {}",
                style(symbols::CHECK).green(),
                style(&info.original_name).bold(),
                super::format_bytes(info.original_size),
                info.shard_count,
                info.parity_count,
                session.strategy
            );
        }
        UploadOutcome::Skipped => {
            println!(
                "{} Skipped, {} is already distributed",
                style(symbols::INFO).cyan(),
                path.display()
            );
        }
    }

    Ok(())
}
