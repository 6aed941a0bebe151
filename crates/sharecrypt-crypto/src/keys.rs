//! Per-file keys and nonces: generation, base64 export/import

use rand::{rngs::OsRng, RngCore};
use secrecy::SecretString;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::{decode_b64, encode_b64, KEY_SIZE, NONCE_SIZE};

/// A per-file 256-bit encryption key. Zeroized on drop.
#[derive(Clone)]
pub struct FileKey {
    bytes: [u8; KEY_SIZE],
}

impl FileKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Export the raw key as standard base64, for handing to the key envelope
    /// or to another client in a shared-file flow.
    pub fn export_base64(&self) -> SecretString {
        SecretString::from(encode_b64(&self.bytes))
    }

    /// Import a key previously produced by [`FileKey::export_base64`].
    pub fn import_base64(encoded: &str) -> CryptoResult<Self> {
        let mut raw = decode_b64(encoded)
            .map_err(|e| CryptoError::Decode(format!("file key is not valid base64: {e}")))?;

        if raw.len() != KEY_SIZE {
            let len = raw.len();
            raw.zeroize();
            return Err(CryptoError::Decode(format!(
                "file key has wrong size: {len} bytes (expected {KEY_SIZE})"
            )));
        }

        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&raw);
        raw.zeroize();
        Ok(Self::from_bytes(bytes))
    }
}

impl Drop for FileKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random 256-bit file encryption key from the OS random source.
pub fn generate_file_key() -> CryptoResult<FileKey> {
    let mut bytes = [0u8; KEY_SIZE];
    fill_random(&mut bytes)?;
    Ok(FileKey::from_bytes(bytes))
}

/// A 96-bit AEAD nonce. Not secret, but must never repeat under one key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Draw a fresh nonce from the OS random source.
    pub fn generate() -> CryptoResult<Self> {
        let mut bytes = [0u8; NONCE_SIZE];
        fill_random(&mut bytes)?;
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; NONCE_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::Decode(format!(
                "nonce has wrong size: {} bytes (expected {NONCE_SIZE})",
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        encode_b64(&self.0)
    }

    /// Parse a stored nonce. An empty string means the record never carried one.
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        if encoded.trim().is_empty() {
            return Err(CryptoError::MissingMetadata("nonce"));
        }
        let raw = decode_b64(encoded)
            .map_err(|e| CryptoError::Decode(format!("nonce is not valid base64: {e}")))?;
        Self::from_slice(&raw)
    }
}

impl std::fmt::Debug for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Nonce").field(&self.to_base64()).finish()
    }
}

pub(crate) fn fill_random(buf: &mut [u8]) -> CryptoResult<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))
}
