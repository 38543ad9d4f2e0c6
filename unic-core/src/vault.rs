//! Vault Encryptor
//!
//! Protects the whole local vault (metadata, statistics, staged shards and
//! the password record) behind a single immutable user passphrase.
//!
//! `decrypt_all` never leaves plaintext behind on a failed attempt: any
//! plaintext produced before the failure is removed again, so a wrong
//! passphrase leaves the vault exactly as encrypted as it was.

use crate::crypto::{is_encrypted_path, encrypted_path, Cipher};
use crate::error::{Result, UnicError};
use crate::layout::VaultLayout;
use base64::Engine;
use rand::RngCore;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Length of the generated internal secret
pub const INTERNAL_SECRET_LEN: usize = 16;

/// At-rest encryption coordinator for one vault root
pub struct Vault<C> {
    layout: VaultLayout,
    cipher: C,
}

impl<C: Cipher> Vault<C> {
    pub fn new(layout: VaultLayout, cipher: C) -> Self {
        Self { layout, cipher }
    }

    pub fn layout(&self) -> &VaultLayout {
        &self.layout
    }

    /// Internally generated secret, created on first use
    pub fn internal_secret(&self) -> Result<String> {
        let path = self.layout.internal_secret_path();
        match fs::read_to_string(&path) {
            Ok(secret) => return Ok(secret),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let secret = generate_secret(INTERNAL_SECRET_LEN);
        fs::create_dir_all(self.layout.root())?;
        write_private(&path, secret.as_bytes())?;
        debug!(path = %path.display(), "Internal secret generated");
        Ok(secret)
    }

    /// Whether a user passphrase has been recorded, encrypted or not
    pub fn password_exists(&self) -> bool {
        let plain = self.layout.user_password_path();
        [encrypted_path(&plain), plain]
            .iter()
            .any(|path| non_empty(path).unwrap_or(false))
    }

    /// The recorded user passphrase, if the record is readable
    pub fn user_password(&self) -> Result<Option<String>> {
        match fs::read_to_string(self.layout.user_password_path()) {
            Ok(password) => Ok(Some(password)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Record the user passphrase
    ///
    /// Fails with [`UnicError::AlreadySet`] if a non-empty record exists.
    pub fn save_password(&self, password: &str) -> Result<()> {
        if self.password_exists() {
            return Err(UnicError::AlreadySet);
        }
        fs::create_dir_all(self.layout.root())?;
        write_private(&self.layout.user_password_path(), password.as_bytes())?;
        info!("User passphrase recorded");
        Ok(())
    }

    /// Encrypt every file under the vault root and delete the originals
    ///
    /// Originals are only deleted once every file has an encrypted sibling.
    /// The first failure aborts the call without deleting anything;
    /// siblings already written are left in place.
    pub fn encrypt_all(&self, password: &str) -> Result<usize> {
        let originals = self.collect(|path| !is_encrypted_path(path))?;

        for path in &originals {
            if let Err(e) = self.cipher.encrypt(path, password) {
                warn!(path = %path.display(), error = %e, "Encryption failed, aborting");
                return Err(e);
            }
        }

        for path in &originals {
            fs::remove_file(path)?;
            debug!(path = %path.display(), "Original removed");
        }

        info!(files = originals.len(), "Vault encrypted");
        Ok(originals.len())
    }

    /// Decrypt every encrypted artifact under the vault root
    ///
    /// The passphrase is checked against the decrypted user-password record.
    /// On success the encrypted artifacts are deleted. On any failure every
    /// plaintext produced by this call is deleted again.
    pub fn decrypt_all(&self, password: &str) -> Result<usize> {
        let encrypted = self.collect(is_encrypted_path)?;
        let mut produced: Vec<PathBuf> = Vec::with_capacity(encrypted.len());

        for path in &encrypted {
            let existed = crate::crypto::plain_path(path)
                .map(|p| p.exists())
                .unwrap_or(false);
            match self.cipher.decrypt(path, password) {
                Ok(plain) => {
                    if !existed {
                        produced.push(plain);
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Decryption failed, rolling back");
                    self.discard(&produced);
                    return Err(match e {
                        UnicError::Authentication(_) => UnicError::PasswordMismatch,
                        other => other,
                    });
                }
            }
        }

        let verified = match self.user_password() {
            Ok(Some(recorded)) => recorded == password,
            Ok(None) => false,
            Err(e) => {
                self.discard(&produced);
                return Err(e);
            }
        };
        if !verified {
            warn!("Passphrase does not match the recorded passphrase");
            self.discard(&produced);
            return Err(UnicError::PasswordMismatch);
        }

        for path in &encrypted {
            fs::remove_file(path)?;
        }

        info!(files = encrypted.len(), "Vault decrypted");
        Ok(encrypted.len())
    }

    fn collect(&self, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        if !self.layout.root().exists() {
            return Ok(files);
        }
        for entry in WalkDir::new(self.layout.root()).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                UnicError::Io(
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
                )
            })?;
            if entry.file_type().is_file() && keep(entry.path()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn discard(&self, produced: &[PathBuf]) {
        for path in produced {
            if let Err(e) = fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "Failed to remove plaintext");
            }
        }
    }
}

fn generate_secret(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut encoded = base64::engine::general_purpose::URL_SAFE.encode(bytes);
    encoded.truncate(len);
    encoded
}

fn non_empty(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len() > 0),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::AesGcmCipher;
    use tempfile::TempDir;

    fn vault(tmp: &TempDir) -> Vault<AesGcmCipher> {
        let layout = VaultLayout::new(tmp.path().join("vault"));
        layout.ensure_dirs().unwrap();
        Vault::new(layout, AesGcmCipher::new())
    }

    fn seed(vault: &Vault<AesGcmCipher>) -> Vec<PathBuf> {
        let layout = vault.layout();
        let files = vec![
            layout.datamap_path(),
            layout.load_balancer_path(),
            layout.shard_path("a.txt.0"),
        ];
        for (i, f) in files.iter().enumerate() {
            fs::write(f, format!("content {}", i)).unwrap();
        }
        files
    }

    #[test]
    fn test_internal_secret_is_stable() {
        let tmp = TempDir::new().unwrap();
        let vault = vault(&tmp);
        let first = vault.internal_secret().unwrap();
        assert_eq!(first.len(), INTERNAL_SECRET_LEN);
        assert_eq!(vault.internal_secret().unwrap(), first);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(vault.layout().internal_secret_path())
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_password_is_immutable() {
        let tmp = TempDir::new().unwrap();
        let vault = vault(&tmp);
        assert!(!vault.password_exists());

        vault.save_password("p1").unwrap();
        assert!(vault.password_exists());
        assert!(matches!(
            vault.save_password("p2"),
            Err(UnicError::AlreadySet)
        ));
        assert_eq!(vault.user_password().unwrap().as_deref(), Some("p1"));
    }

    #[test]
    fn test_empty_record_can_be_overwritten() {
        let tmp = TempDir::new().unwrap();
        let vault = vault(&tmp);
        fs::write(vault.layout().user_password_path(), "").unwrap();
        vault.save_password("p1").unwrap();
        assert_eq!(vault.user_password().unwrap().as_deref(), Some("p1"));
    }

    #[test]
    fn test_encrypt_then_decrypt() {
        let tmp = TempDir::new().unwrap();
        let vault = vault(&tmp);
        vault.save_password("secret").unwrap();
        let files = seed(&vault);

        assert_eq!(vault.encrypt_all("secret").unwrap(), 4);
        for f in &files {
            assert!(!f.exists());
            assert!(encrypted_path(f).exists());
        }
        // Still recognised while locked
        assert!(vault.password_exists());

        assert_eq!(vault.decrypt_all("secret").unwrap(), 4);
        for (i, f) in files.iter().enumerate() {
            assert_eq!(fs::read_to_string(f).unwrap(), format!("content {}", i));
            assert!(!encrypted_path(f).exists());
        }
    }

    #[test]
    fn test_wrong_password_leaves_vault_encrypted() {
        let tmp = TempDir::new().unwrap();
        let vault = vault(&tmp);
        vault.save_password("secret").unwrap();
        let files = seed(&vault);
        vault.encrypt_all("secret").unwrap();

        assert!(matches!(
            vault.decrypt_all("wrong"),
            Err(UnicError::PasswordMismatch)
        ));
        for f in files.iter().chain(std::iter::once(&vault.layout().user_password_path())) {
            assert!(!f.exists(), "plaintext survived: {}", f.display());
            assert!(encrypted_path(f).exists());
        }
    }

    #[test]
    fn test_same_key_wrong_record_is_rolled_back() {
        let tmp = TempDir::new().unwrap();
        let vault = vault(&tmp);
        // Record says "other" but everything is encrypted with "secret"
        vault.save_password("other").unwrap();
        let files = seed(&vault);
        vault.encrypt_all("secret").unwrap();

        assert!(matches!(
            vault.decrypt_all("secret"),
            Err(UnicError::PasswordMismatch)
        ));
        for f in &files {
            assert!(!f.exists());
            assert!(encrypted_path(f).exists());
        }
    }

    struct FailingCipher {
        inner: AesGcmCipher,
        fail_on: String,
    }

    impl Cipher for FailingCipher {
        fn encrypt(&self, path: &Path, passphrase: &str) -> Result<PathBuf> {
            if path.ends_with(&self.fail_on) {
                return Err(UnicError::Encryption("injected".into()));
            }
            self.inner.encrypt(path, passphrase)
        }

        fn decrypt(&self, path: &Path, passphrase: &str) -> Result<PathBuf> {
            self.inner.decrypt(path, passphrase)
        }
    }

    #[test]
    fn test_encrypt_failure_deletes_no_originals() {
        let tmp = TempDir::new().unwrap();
        let layout = VaultLayout::new(tmp.path().join("vault"));
        layout.ensure_dirs().unwrap();
        let vault = Vault::new(
            layout.clone(),
            FailingCipher {
                inner: AesGcmCipher::new(),
                fail_on: "loadbalancer.json".into(),
            },
        );
        fs::write(layout.datamap_path(), "{}").unwrap();
        fs::write(layout.load_balancer_path(), "{}").unwrap();

        assert!(vault.encrypt_all("secret").is_err());
        assert!(layout.datamap_path().exists());
        assert!(layout.load_balancer_path().exists());
        assert!(!encrypted_path(&layout.load_balancer_path()).exists());
    }

    #[test]
    fn test_decrypt_empty_vault_is_mismatch() {
        let tmp = TempDir::new().unwrap();
        let vault = vault(&tmp);
        assert!(matches!(
            vault.decrypt_all("anything"),
            Err(UnicError::PasswordMismatch)
        ));
    }
}
