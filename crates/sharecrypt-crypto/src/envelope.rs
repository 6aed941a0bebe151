//! Envelope encryption of file keys under the server-held master key
//!
//! Wrapped key format (base64 of):
//! ```text
//! [12 bytes: random nonce][32 bytes: encrypted file key][16 bytes: GCM tag]
//! ```
//!
//! Every wrap draws a fresh nonce, so wrapping the same file key twice yields
//! different values. Values written by the fixed-IV scheme
//! (`[32 bytes: encrypted key][16 bytes: tag]`, no nonce prefix) can still be
//! unwrapped when that IV is supplied via [`KeyEnvelope::with_legacy_nonce`];
//! they are never produced.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::aead;
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::MasterKey;
use crate::keys::{FileKey, Nonce};
use crate::metadata::Algorithm;
use crate::{decode_b64, encode_b64, KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// Decoded length of a wrapped key: nonce + encrypted key + tag = 60
pub const WRAPPED_KEY_LEN: usize = NONCE_SIZE + KEY_SIZE + TAG_SIZE;

/// Decoded length of a fixed-IV wrapped key: encrypted key + tag = 48
pub const LEGACY_WRAPPED_KEY_LEN: usize = KEY_SIZE + TAG_SIZE;

const WRAP_ALGORITHM: Algorithm = Algorithm::Aes256Gcm;

/// A base64 file key encrypted under the master key. Safe to persist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WrappedKey(String);

impl WrappedKey {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for WrappedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for WrappedKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Wraps and unwraps file keys. Holds no per-request state; share it freely.
pub struct KeyEnvelope {
    master: MasterKey,
    legacy_nonce: Option<Nonce>,
}

impl KeyEnvelope {
    pub fn new(master: MasterKey) -> Self {
        Self {
            master,
            legacy_nonce: None,
        }
    }

    /// Accept fixed-IV wrapped keys produced with `nonce` (unwrap only).
    pub fn with_legacy_nonce(mut self, nonce: Nonce) -> Self {
        self.legacy_nonce = Some(nonce);
        self
    }

    pub fn fingerprint(&self) -> String {
        self.master.fingerprint()
    }

    pub fn accepts_legacy(&self) -> bool {
        self.legacy_nonce.is_some()
    }

    /// Wrap a base64-encoded file key as exported by [`FileKey::export_base64`].
    pub fn wrap(&self, file_key_b64: &str) -> CryptoResult<WrappedKey> {
        let file_key = FileKey::import_base64(file_key_b64)?;
        self.wrap_key(&file_key)
    }

    pub fn wrap_key(&self, file_key: &FileKey) -> CryptoResult<WrappedKey> {
        let nonce = Nonce::generate()?;

        let master = self.master.as_bytes();
        let sealed = aead::seal(WRAP_ALGORITHM, master, &nonce, file_key.as_bytes())
            .map_err(|e| CryptoError::Wrap(format!("{WRAP_ALGORITHM}: {e}")))?;

        let mut out = Vec::with_capacity(WRAPPED_KEY_LEN);
        out.extend_from_slice(nonce.as_bytes());
        out.extend_from_slice(&sealed);

        tracing::debug!(master = %self.fingerprint(), "file key wrapped");
        Ok(WrappedKey(encode_b64(&out)))
    }

    /// Recover the base64 file key from a stored wrapped value.
    pub fn unwrap(&self, wrapped: &WrappedKey) -> CryptoResult<SecretString> {
        Ok(self.unwrap_key(wrapped)?.export_base64())
    }

    pub fn unwrap_key(&self, wrapped: &WrappedKey) -> CryptoResult<FileKey> {
        let raw = decode_b64(wrapped.as_str())
            .map_err(|e| CryptoError::Unwrap(format!("wrapped key is not valid base64: {e}")))?;

        match raw.len() {
            WRAPPED_KEY_LEN => {
                let (nonce_bytes, sealed) = raw.split_at(NONCE_SIZE);
                let nonce = Nonce::from_slice(nonce_bytes)?;
                self.open(&nonce, sealed)
            }
            LEGACY_WRAPPED_KEY_LEN => match self.legacy_nonce {
                Some(nonce) => {
                    tracing::debug!(master = %self.fingerprint(), "unwrapping fixed-IV key");
                    self.open(&nonce, &raw)
                }
                None => Err(CryptoError::Unwrap(
                    "fixed-IV wrapped key found but no legacy IV is configured".into(),
                )),
            },
            n => Err(CryptoError::Unwrap(format!(
                "wrapped key has wrong size: {n} bytes (expected {WRAPPED_KEY_LEN})"
            ))),
        }
    }

    /// Re-wrap a stored value under `target`, e.g. after master key rotation.
    /// Legacy fixed-IV values come out in the current format.
    pub fn rewrap(&self, wrapped: &WrappedKey, target: &KeyEnvelope) -> CryptoResult<WrappedKey> {
        let file_key = self.unwrap_key(wrapped)?;
        target.wrap_key(&file_key)
    }

    fn open(&self, nonce: &Nonce, sealed: &[u8]) -> CryptoResult<FileKey> {
        let mut plaintext = aead::open(WRAP_ALGORITHM, self.master.as_bytes(), nonce, sealed)
            .map_err(|_| {
                CryptoError::Unwrap("invalid master key or corrupted wrapped key".into())
            })?;

        if plaintext.len() != KEY_SIZE {
            let len = plaintext.len();
            plaintext.zeroize();
            return Err(CryptoError::Unwrap(format!(
                "unwrapped key has wrong size: {len} bytes (expected {KEY_SIZE})"
            )));
        }

        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(&plaintext);
        plaintext.zeroize();

        Ok(FileKey::from_bytes(key_bytes))
    }
}

impl std::fmt::Debug for KeyEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyEnvelope")
            .field("master", &self.fingerprint())
            .field("legacy", &self.accepts_legacy())
            .finish()
    }
}
