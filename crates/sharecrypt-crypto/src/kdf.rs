//! Master key material: random generation, base64 loading, Argon2id passphrase KDF

use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::fill_random;
use crate::{decode_b64, encode_b64, KEY_SIZE, SALT_SIZE};

/// A 256-bit server-held master key used only for wrapping file keys.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Generate a fresh random master key.
    pub fn generate() -> CryptoResult<Self> {
        let mut bytes = [0u8; KEY_SIZE];
        fill_random(&mut bytes)?;
        Ok(Self::from_bytes(bytes))
    }

    /// Load a master key from its base64 encoding (env var or key file contents).
    ///
    /// Missing or malformed material is a wrap failure: nothing can be wrapped
    /// or unwrapped without it.
    pub fn from_base64(encoded: &SecretString) -> CryptoResult<Self> {
        let encoded = encoded.expose_secret();
        if encoded.trim().is_empty() {
            return Err(CryptoError::Wrap("master key is empty".into()));
        }

        let mut raw = decode_b64(encoded)
            .map_err(|e| CryptoError::Wrap(format!("master key is not valid base64: {e}")))?;

        if raw.len() != KEY_SIZE {
            let len = raw.len();
            raw.zeroize();
            return Err(CryptoError::Wrap(format!(
                "master key has wrong size: {len} bytes (expected {KEY_SIZE})"
            )));
        }

        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&raw);
        raw.zeroize();
        Ok(Self::from_bytes(bytes))
    }

    pub fn to_base64(&self) -> SecretString {
        SecretString::from(encode_b64(&self.bytes))
    }

    /// Short BLAKE3 fingerprint, safe to log and display.
    pub fn fingerprint(&self) -> String {
        blake3::hash(&self.bytes).to_hex().as_str()[..16].to_string()
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Argon2id parameters for KDF
#[derive(Debug, Clone)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

/// Generate a random salt for [`derive_master_key`].
pub fn generate_salt() -> CryptoResult<[u8; SALT_SIZE]> {
    let mut salt = [0u8; SALT_SIZE];
    fill_random(&mut salt)?;
    Ok(salt)
}

/// Derive a 256-bit master key from a passphrase and salt using Argon2id.
///
/// The salt should be 16 bytes, randomly generated and kept with the
/// deployment config (it does not need to be secret).
pub fn derive_master_key(
    passphrase: &SecretString,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> CryptoResult<MasterKey> {
    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::Wrap(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(passphrase.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|e| CryptoError::Wrap(format!("Argon2id KDF failed: {e}")))?;

    Ok(MasterKey::from_bytes(key))
}
