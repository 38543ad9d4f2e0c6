//! unic CLI
//!
//! Spreads files over several storage remotes with erasure coding, so any
//! single remote can be lost and no remote sees a whole file or its name.
//!
//! # Commands
//! - `upload` - Distribute a file over the remotes
//! - `download` - Rebuild a distributed file
//! - `rm` - Delete a distributed file
//! - `ls` - List distributed files
//! - `status` - Show shard placement and health
//! - `password set` - Record the vault passphrase
//! - `lock` / `unlock` - Encrypt or decrypt the local vault
//! - `sync push|pull` - Copy the locked vault to or from the remotes
//! - `config` - Show or initialize configuration
//!
//! # Configuration
//! Config file: ~/.unic/config.toml

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use unic_balancer::Strategy;

mod commands;
mod config;
mod symbols;

use commands::{download, list, password, remove, status, sync, upload, Session};

#[derive(Parser)]
#[command(name = "unic")]
#[command(about = "Erasure-coded storage over multiple remotes")]
#[command(version)]
struct Cli {
    /// Vault root directory (overrides config file)
    #[arg(long, global = true, env = "UNIC_VAULT_ROOT")]
    vault: Option<PathBuf>,

    /// Remote selection strategy: RoundRobin, ResourceBased, UploadOptima, DownloadOptima
    #[arg(short = 'b', long, global = true)]
    strategy: Option<Strategy>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Distribute a file over the remotes
    Upload {
        /// Path to the file
        path: PathBuf,
    },

    /// Rebuild a distributed file
    Download {
        /// Name of the distributed file
        name: String,

        /// Output file or directory
        #[arg(default_value = ".")]
        dest: PathBuf,
    },

    /// Delete a distributed file from every remote
    Rm {
        /// Name of the distributed file
        name: String,
    },

    /// List distributed files
    Ls {
        /// Show sizes and shard counts
        #[arg(short, long)]
        long: bool,
    },

    /// Show shard placement and health
    Status,

    /// Manage the vault passphrase
    Password {
        #[command(subcommand)]
        command: PasswordCommands,
    },

    /// Encrypt the local vault
    Lock,

    /// Decrypt the local vault
    Unlock,

    /// Copy the vault to or from the remotes
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },

    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum PasswordCommands {
    /// Record the passphrase (only once)
    Set,
}

#[derive(Subcommand)]
enum SyncCommands {
    /// Push the locked vault to every remote
    Push,
    /// Restore the vault from the first remote that has it
    Pull,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Show config file path
    Path,

    /// Initialize config file with defaults
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    // Load configuration from ~/.unic/config.toml
    let cfg = config::load_config();
    let session = Session::new(cfg, cli.vault, cli.strategy);

    match cli.command {
        Commands::Upload { path } => upload::run(&session, path).await?,
        Commands::Download { name, dest } => download::run(&session, name, dest).await?,
        Commands::Rm { name } => remove::run(&session, name).await?,
        Commands::Ls { long } => list::run(&session, long).await?,
        Commands::Status => status::run(&session, cli.verbose).await?,
        Commands::Password {
            command: PasswordCommands::Set,
        } => password::set(&session)?,
        Commands::Lock => password::lock(&session)?,
        Commands::Unlock => password::unlock(&session)?,
        Commands::Sync { command } => match command {
            SyncCommands::Push => sync::push(&session).await?,
            SyncCommands::Pull => sync::pull(&session).await?,
        },
        Commands::Config { command } => handle_config_command(command, &session)?,
    }

    Ok(())
}

/// Handle config subcommands
fn handle_config_command(command: Option<ConfigCommands>, session: &Session) -> Result<()> {
    use console::style;

    match command {
        None | Some(ConfigCommands::Show) => {
            let cfg = &session.config;
            println!();
            println!("{}", style("unic Configuration").bold().underlined());
            println!();
            println!("{}", style("[vault]").cyan());
            println!("  root = \"{}\"", cfg.vault.root.display());
            println!();
            println!("{}", style("[erasure]").cyan());
            println!("  data_shards = {}", cfg.erasure.data_shards);
            println!("  parity_shards = {}", cfg.erasure.parity_shards);
            println!();
            println!("{}", style("[balancer]").cyan());
            println!("  strategy = \"{}\"", cfg.balancer.strategy);
            println!();
            for remote in &cfg.remotes {
                println!("{}", style("[[remotes]]").cyan());
                println!("  name = \"{}\"", remote.name);
                println!("  kind = \"{}\"", remote.kind);
                println!("  path = \"{}\"", remote.path.display());
                if let Some(capacity) = remote.capacity {
                    println!("  capacity = {}", capacity);
                }
                println!();
            }
            if cfg.remotes.is_empty() {
                println!("{}", style("(no remotes configured)").yellow());
                println!();
            }

            if let Ok(path) = config::config_file_path() {
                println!("{} {}", style("Config file:").dim(), path.display());
                if !path.exists() {
                    println!(
                        "{} Run '{}' to create it",
                        style("(not created yet)").yellow(),
                        style("unic config init").green()
                    );
                }
            }
        }

        Some(ConfigCommands::Path) => {
            if let Ok(path) = config::config_file_path() {
                println!("{}", path.display());
            }
        }

        Some(ConfigCommands::Init { force }) => {
            let path = config::config_file_path()?;
            if path.exists() && !force {
                println!(
                    "{} Config file already exists at {}",
                    style(symbols::WARN).yellow(),
                    path.display()
                );
                println!("Use --force to overwrite");
                return Ok(());
            }

            config::save_config(&config::UnicConfig::default())?;
            println!(
                "{} Config file created at {}",
                style(symbols::CHECK).green(),
                path.display()
            );
        }
    }

    Ok(())
}
