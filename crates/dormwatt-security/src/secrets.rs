//! Encrypted file-backed [`SecretStore`].
//!
//! One blob per file: AES-256-ECB with PKCS7 padding, base64 on disk. The key
//! is the SHA-256 of a passphrase when one is given, otherwise of the
//! machine identity (hostname + username).

use aes::Aes256;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit, generic_array::GenericArray};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use dormwatt_core::error::{DormwattError, Result};
use dormwatt_core::traits::SecretStore;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

const BLOCK_SIZE: usize = 16;

/// Secret blob encrypted into a single file.
pub struct EncryptedFileStore {
    path: PathBuf,
    key: [u8; 32],
}

impl EncryptedFileStore {
    /// Key derived from `passphrase`, or from the machine when `None` or empty.
    pub fn new(path: &Path, passphrase: Option<&str>) -> Self {
        let key = match passphrase {
            Some(p) if !p.is_empty() => derive_key(&format!("dormwatt::{p}::session")),
            _ => derive_machine_key(),
        };
        Self {
            path: path.to_path_buf(),
            key,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SecretStore for EncryptedFileStore {
    fn save(&self, blob: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = BASE64.encode(encrypt_aes256(blob, &self.key));

        // Set restrictive permissions on Unix (0600)
        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)?;
            file.write_all(content.as_bytes())?;
        }

        #[cfg(not(unix))]
        {
            std::fs::write(&self.path, content)?;
        }

        tracing::debug!("🔐 Secret saved to {}", self.path.display());
        Ok(())
    }

    fn load(&self) -> Result<Option<Vec<u8>>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let encrypted = BASE64
            .decode(content.trim())
            .map_err(|e| DormwattError::Security(format!("Base64 decode failed: {e}")))?;
        decrypt_aes256(&encrypted, &self.key).map(Some)
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!("🧹 Secret cleared at {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn derive_key(material: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(material.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&hasher.finalize());
    key
}

/// Machine-specific key from hostname + username.
fn derive_machine_key() -> [u8; 32] {
    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "dormwatt".into());
    let username = whoami::username();
    derive_key(&format!("dormwatt::{username}@{hostname}::session"))
}

/// AES-256-ECB encrypt with PKCS7 padding.
fn encrypt_aes256(data: &[u8], key: &[u8; 32]) -> Vec<u8> {
    let cipher = Aes256::new(GenericArray::from_slice(key));

    let padding_len = BLOCK_SIZE - (data.len() % BLOCK_SIZE);
    let mut padded = data.to_vec();
    padded.extend(std::iter::repeat_n(padding_len as u8, padding_len));

    let mut encrypted = Vec::with_capacity(padded.len());
    for chunk in padded.chunks(BLOCK_SIZE) {
        let mut block = GenericArray::clone_from_slice(chunk);
        cipher.encrypt_block(&mut block);
        encrypted.extend_from_slice(&block);
    }
    encrypted
}

/// AES-256-ECB decrypt. Bad length or padding means a wrong key or a
/// damaged file.
fn decrypt_aes256(data: &[u8], key: &[u8; 32]) -> Result<Vec<u8>> {
    if data.is_empty() || data.len() % BLOCK_SIZE != 0 {
        return Err(DormwattError::Security(format!(
            "Ciphertext length {} is not a multiple of {BLOCK_SIZE}",
            data.len()
        )));
    }
    let cipher = Aes256::new(GenericArray::from_slice(key));

    let mut decrypted = Vec::with_capacity(data.len());
    for chunk in data.chunks(BLOCK_SIZE) {
        let mut block = GenericArray::clone_from_slice(chunk);
        cipher.decrypt_block(&mut block);
        decrypted.extend_from_slice(&block);
    }

    let pad_len = decrypted.last().copied().unwrap_or(0) as usize;
    let padding_ok = (1..=BLOCK_SIZE).contains(&pad_len)
        && decrypted[decrypted.len() - pad_len..]
            .iter()
            .all(|&b| b as usize == pad_len);
    if !padding_ok {
        return Err(DormwattError::Security(
            "Decryption failed: invalid padding".into(),
        ));
    }
    decrypted.truncate(decrypted.len() - pad_len);
    Ok(decrypted)
}
