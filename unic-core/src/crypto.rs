//! Cryptographic primitives for unic
//!
//! Provides:
//! - SHA-256 content checksums (streaming, for original files and shards)
//! - AES-256-GCM file encryption behind the [`Cipher`] capability
//! - Key derivation using Argon2

use crate::error::{Result, UnicError};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

/// AES-256-GCM key size (32 bytes)
pub const KEY_SIZE: usize = 32;

/// AES-GCM nonce size (12 bytes / 96 bits)
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Argon2 salt size stored in every encrypted file
pub const SALT_SIZE: usize = 16;

/// Magic prefix of encrypted files
pub const MAGIC: &[u8; 4] = b"UCEF";

/// Extension appended to encrypted siblings
pub const ENCRYPTED_EXTENSION: &str = "ucef";

const HEADER_SIZE: usize = MAGIC.len() + SALT_SIZE + NONCE_SIZE;

/// Hex SHA-256 of a byte string
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}

/// Hex SHA-256 of a file's contents, read in a streaming fashion
pub fn file_checksum(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Checksums of many files, computed in parallel, in input order
pub fn file_checksums(paths: &[PathBuf]) -> Result<Vec<String>> {
    use rayon::prelude::*;

    paths.par_iter().map(|p| file_checksum(p)).collect()
}

/// Path of the encrypted sibling for `path`
pub fn encrypted_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(ENCRYPTED_EXTENSION);
    PathBuf::from(name)
}

/// Whether `path` names an encrypted artifact
pub fn is_encrypted_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == ENCRYPTED_EXTENSION)
        .unwrap_or(false)
}

/// Path of the plaintext sibling for an encrypted artifact
pub fn plain_path(path: &Path) -> Option<PathBuf> {
    if is_encrypted_path(path) {
        Some(path.with_extension(""))
    } else {
        None
    }
}

/// File encryption capability
///
/// `encrypt` writes an encrypted sibling and leaves the original in place;
/// `decrypt` writes the plaintext sibling and leaves the encrypted file in
/// place. Existing siblings are overwritten.
pub trait Cipher: Send + Sync {
    fn encrypt(&self, path: &Path, passphrase: &str) -> Result<PathBuf>;

    fn decrypt(&self, path: &Path, passphrase: &str) -> Result<PathBuf>;
}

/// AES-256-GCM encryption key
#[derive(Clone)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Create from a slice (validates length)
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != KEY_SIZE {
            return Err(UnicError::Encryption(format!(
                "invalid key length: expected {}, got {}",
                KEY_SIZE,
                slice.len()
            )));
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(slice);
        Ok(Self(key))
    }

    /// Derive key from password using Argon2
    pub fn derive_from_password(password: &[u8], salt: &[u8]) -> Result<Self> {
        use argon2::password_hash::SaltString;
        use argon2::{Argon2, PasswordHasher};

        // Salt string must be base64-encoded
        let salt_b64 =
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD_NO_PAD, salt);
        let salt_string =
            SaltString::from_b64(&salt_b64).map_err(|e| UnicError::Encryption(e.to_string()))?;

        let argon2 = Argon2::default();
        let password_hash = argon2
            .hash_password(password, &salt_string)
            .map_err(|e| UnicError::Encryption(e.to_string()))?;

        let hash_bytes = password_hash
            .hash
            .ok_or_else(|| UnicError::Encryption("No hash output".to_string()))?;

        Self::from_slice(hash_bytes.as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionKey([REDACTED])")
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        // Zeroize key on drop
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

/// Passphrase-based file cipher
///
/// File format: `MAGIC | salt | nonce | ciphertext+tag`. A fresh salt and
/// nonce are drawn for every file.
#[derive(Debug, Default, Clone, Copy)]
pub struct AesGcmCipher;

impl AesGcmCipher {
    pub fn new() -> Self {
        Self
    }

    /// Encrypt a buffer into the on-disk format
    pub fn seal(&self, plaintext: &[u8], passphrase: &str) -> Result<Vec<u8>> {
        use rand::RngCore;

        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let key = EncryptionKey::derive_from_password(passphrase.as_bytes(), &salt)?;
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| UnicError::Encryption(e.to_string()))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| UnicError::Encryption(e.to_string()))?;

        let mut out = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&salt);
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt a buffer in the on-disk format
    ///
    /// `label` names the source in errors.
    pub fn open(&self, data: &[u8], passphrase: &str, label: &str) -> Result<Vec<u8>> {
        if data.len() < HEADER_SIZE + TAG_SIZE || &data[..MAGIC.len()] != MAGIC {
            return Err(UnicError::Decryption(format!(
                "{} is not an encrypted vault file",
                label
            )));
        }

        let salt = &data[MAGIC.len()..MAGIC.len() + SALT_SIZE];
        let nonce = Nonce::from_slice(&data[MAGIC.len() + SALT_SIZE..HEADER_SIZE]);

        let key = EncryptionKey::derive_from_password(passphrase.as_bytes(), salt)?;
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| UnicError::Decryption(e.to_string()))?;

        cipher
            .decrypt(nonce, &data[HEADER_SIZE..])
            .map_err(|_| UnicError::Authentication(label.to_string()))
    }
}

impl Cipher for AesGcmCipher {
    fn encrypt(&self, path: &Path, passphrase: &str) -> Result<PathBuf> {
        let plaintext = fs::read(path)?;
        let sealed = self.seal(&plaintext, passphrase)?;
        let target = encrypted_path(path);
        fs::write(&target, sealed)?;
        Ok(target)
    }

    fn decrypt(&self, path: &Path, passphrase: &str) -> Result<PathBuf> {
        let target = plain_path(path).ok_or_else(|| {
            UnicError::Decryption(format!("{} is not an encrypted artifact", path.display()))
        })?;
        let data = fs::read(path)?;
        let plaintext = self.open(&data, passphrase, &path.display().to_string())?;
        fs::write(&target, plaintext)?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sha256_known_vectors() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_file_checksum_matches_bytes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f.txt");
        fs::write(&path, b"This is a test file for checksum.").unwrap();
        assert_eq!(
            file_checksum(&path).unwrap(),
            "e200bd66430fb559c1a0d6322fe3a154e2ee200a6f113d66a60ce2605ddb88bc"
        );
    }

    #[test]
    fn test_file_checksums_keep_order() {
        let tmp = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = (0..5)
            .map(|i| {
                let p = tmp.path().join(format!("s.{}", i));
                fs::write(&p, format!("shard {}", i)).unwrap();
                p
            })
            .collect();
        let sums = file_checksums(&paths).unwrap();
        assert_eq!(sums.len(), 5);
        for (i, sum) in sums.iter().enumerate() {
            assert_eq!(sum, &sha256_hex(format!("shard {}", i)));
        }
    }

    #[test]
    fn test_sibling_paths() {
        let p = Path::new("/v/data/datamap.json");
        let enc = encrypted_path(p);
        assert_eq!(enc, PathBuf::from("/v/data/datamap.json.ucef"));
        assert!(is_encrypted_path(&enc));
        assert!(!is_encrypted_path(p));
        assert_eq!(plain_path(&enc).unwrap(), p);
        assert!(plain_path(p).is_none());
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let cipher = AesGcmCipher::new();
        let sealed = cipher.seal(b"secret message", "pw").unwrap();
        assert_eq!(&sealed[..4], MAGIC);
        assert_eq!(cipher.open(&sealed, "pw", "mem").unwrap(), b"secret message");
    }

    #[test]
    fn test_wrong_passphrase_fails_authentication() {
        let cipher = AesGcmCipher::new();
        let sealed = cipher.seal(b"secret", "right").unwrap();
        assert!(matches!(
            cipher.open(&sealed, "wrong", "mem"),
            Err(UnicError::Authentication(_))
        ));
    }

    #[test]
    fn test_file_encrypt_decrypt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        fs::write(&path, b"plain").unwrap();

        let cipher = AesGcmCipher::new();
        let enc = cipher.encrypt(&path, "pw").unwrap();
        assert!(enc.exists());
        assert!(path.exists());

        fs::remove_file(&path).unwrap();
        let plain = cipher.decrypt(&enc, "pw").unwrap();
        assert_eq!(plain, path);
        assert_eq!(fs::read(&plain).unwrap(), b"plain");
    }

    #[test]
    fn test_tampered_file_fails() {
        let cipher = AesGcmCipher::new();
        let mut sealed = cipher.seal(b"secret", "pw").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;
        assert!(cipher.open(&sealed, "pw", "mem").is_err());
    }
}
