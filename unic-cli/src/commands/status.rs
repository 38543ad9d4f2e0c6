//! Status Command
//!
//! Shows every distributed file with the placement of its shards and how
//! many of them the remotes still show.

use super::{format_bytes, Session};
use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use unic_coordinator::Request;

/// Run status command
pub async fn run(session: &Session, verbose: bool) -> Result<()> {
    println!("{}", style("unic Vault Status").bold().underlined());
    println!();
    println!("Vault:    {}", session.layout.root().display());
    println!("Strategy: {}", session.strategy);

    if session.is_locked() {
        println!(
            "State:    {} {}",
            symbols::LOCK,
            style("Locked").yellow()
        );
        return Ok(());
    }
    println!("State:    {} {}", symbols::UNLOCK, style("Unlocked").green());
    println!();

    let coordinator = session.coordinator()?;
    coordinator
        .check_state(&Request::List)
        .await
        .context("Failed to resolve unfinished work")?;

    let files = coordinator.status().await.context("Failed to read status")?;
    if files.is_empty() {
        println!("{}", style("No distributed files").dim());
        return Ok(());
    }

    for file in &files {
        let info = &file.info;
        let missing = file.missing_shards();
        let health = if missing == 0 {
            style(format!("{} healthy", symbols::CHECK)).green()
        } else if missing <= info.erasure_config().max_failures() {
            style(format!("{} {} shards missing", symbols::WARN, missing)).yellow()
        } else {
            style(format!("{} unrecoverable", symbols::CROSS)).red()
        };

        println!(
            "{}  {}  {}+{} shards  {}",
            style(&info.original_name).bold(),
            format_bytes(info.original_size),
            info.shard_count,
            info.parity_count,
            health
        );
        if info.in_progress {
            println!("  {} {} in progress", style(symbols::WARN).yellow(), info.operation);
        }

        if verbose {
            for shard in info.ordered_shards() {
                let seen = if file.visible_shards.contains(&shard.shard_name) {
                    style(symbols::CHECK).green()
                } else {
                    style(symbols::CROSS).red()
                };
                println!("    {} {:<32} {}", seen, shard.shard_name, shard.remote);
            }
        }
    }

    Ok(())
}
