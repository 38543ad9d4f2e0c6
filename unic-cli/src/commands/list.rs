//! List Command
//!
//! Lists distributed files.

use super::{format_bytes, Session};
use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use unic_coordinator::Request;

/// Run ls command
pub async fn run(session: &Session, long_format: bool) -> Result<()> {
    let coordinator = session.coordinator()?;
    coordinator
        .check_state(&Request::List)
        .await
        .context("Failed to resolve unfinished work")?;

    let names = coordinator.list().context("Failed to read the datamap")?;
    if names.is_empty() {
        println!("{} No distributed files", style("Info:").cyan());
        return Ok(());
    }

    if !long_format {
        for name in names {
            println!("{}", name);
        }
        return Ok(());
    }

    println!(
        "{:<40} {:>12} {:>8} {:>8}",
        style("NAME").bold(),
        style("SIZE").bold(),
        style("DATA").bold(),
        style("PARITY").bold()
    );
    println!("{}", symbols::HLINE.repeat(72));

    let mut total_size = 0;
    for name in &names {
        let info = coordinator.datamap().get(name)?;
        total_size += info.original_size;
        println!(
            "{:<40} {:>12} {:>8} {:>8}",
            truncate_name(name, 40),
            format_bytes(info.original_size),
            info.shard_count,
            info.parity_count
        );
    }

    println!("{}", symbols::HLINE.repeat(72));
    println!(
        "{} files, {} total",
        style(names.len()).green(),
        format_bytes(total_size)
    );
    Ok(())
}

/// Truncate a name for display
fn truncate_name(name: &str, max_len: usize) -> String {
    if name.chars().count() <= max_len {
        name.to_string()
    } else {
        let tail: String = name
            .chars()
            .rev()
            .take(max_len - 3)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("...{}", tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_name() {
        assert_eq!(truncate_name("short.txt", 40), "short.txt");
        let long = "a".repeat(50) + ".txt";
        let truncated = truncate_name(&long, 20);
        assert_eq!(truncated.chars().count(), 20);
        assert!(truncated.starts_with("..."));
        assert!(truncated.ends_with(".txt"));
    }
}
