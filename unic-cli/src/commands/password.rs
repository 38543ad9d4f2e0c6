//! Passphrase Commands
//!
//! `password set` records the vault passphrase once. `lock` encrypts the
//! whole vault with it and `unlock` decrypts it again.

use super::Session;
use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use unic_core::UnicError;

/// Passphrase from `UNIC_PASSPHRASE`, or typed without echo
fn read_passphrase(prompt: &str) -> Result<String> {
    if let Ok(passphrase) = std::env::var("UNIC_PASSPHRASE") {
        return Ok(passphrase);
    }
    rpassword::prompt_password(prompt).context("Failed to read passphrase")
}

/// Record the vault passphrase
pub fn set(session: &Session) -> Result<()> {
    let vault = session.vault();
    if vault.password_exists() {
        anyhow::bail!("A passphrase is already set and cannot be changed");
    }

    let passphrase = read_passphrase("New passphrase: ")?;
    if passphrase.is_empty() {
        anyhow::bail!("The passphrase cannot be empty");
    }
    if std::env::var("UNIC_PASSPHRASE").is_err() {
        let again = read_passphrase("Repeat passphrase: ")?;
        if again != passphrase {
            anyhow::bail!("Passphrases do not match");
        }
    }

    vault.internal_secret().context("Failed to create the internal secret")?;
    vault.save_password(&passphrase).map_err(|e| match e {
        UnicError::AlreadySet => anyhow::anyhow!("A passphrase is already set"),
        other => anyhow::Error::new(other).context("Failed to save passphrase"),
    })?;

    println!("{} Passphrase set", style(symbols::CHECK).green());
    Ok(())
}

/// Encrypt the vault
pub fn lock(session: &Session) -> Result<()> {
    if session.is_locked() {
        println!("{} The vault is already locked", style(symbols::INFO).cyan());
        return Ok(());
    }
    let vault = session.vault();
    let Some(recorded) = vault.user_password().context("Failed to read passphrase record")? else {
        anyhow::bail!("No passphrase set. Run 'unic password set' first.");
    };

    let passphrase = read_passphrase("Passphrase: ")?;
    if passphrase != recorded {
        anyhow::bail!("Wrong passphrase");
    }

    let count = vault.encrypt_all(&passphrase).context("Failed to lock the vault")?;
    println!(
        "{} {} Vault locked ({} files encrypted)",
        style(symbols::CHECK).green(),
        symbols::LOCK,
        count
    );
    Ok(())
}

/// Decrypt the vault
pub fn unlock(session: &Session) -> Result<()> {
    if !session.is_locked() {
        println!("{} The vault is not locked", style(symbols::INFO).cyan());
        return Ok(());
    }

    let passphrase = read_passphrase("Passphrase: ")?;
    match session.vault().decrypt_all(&passphrase) {
        Ok(count) => {
            println!(
                "{} {} Vault unlocked ({} files decrypted)",
                style(symbols::CHECK).green(),
                symbols::UNLOCK,
                count
            );
            Ok(())
        }
        Err(UnicError::PasswordMismatch) => anyhow::bail!("Wrong passphrase"),
        Err(e) => Err(anyhow::Error::new(e).context("Failed to unlock the vault")),
    }
}
