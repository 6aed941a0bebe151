//! Self-describing cipher parameters stored on each file record
//!
//! ```json
//! { "algorithm": "aes-256-gcm", "nonce": "q5Z0c3JrS1x2bGpk" }
//! ```
//!
//! Records written by older clients used `"AES-GCM"` and `"iv"`; both are
//! accepted on input and normalized on output.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::Nonce;

/// AEAD used for file content. Both variants take a 256-bit key and 96-bit nonce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[default]
    #[serde(rename = "aes-256-gcm", alias = "AES-GCM")]
    Aes256Gcm,
    #[serde(rename = "chacha20-poly1305")]
    ChaCha20Poly1305,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Aes256Gcm => "aes-256-gcm",
            Algorithm::ChaCha20Poly1305 => "chacha20-poly1305",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aes-256-gcm" | "aes-gcm" | "aes256gcm" => Ok(Algorithm::Aes256Gcm),
            "chacha20-poly1305" | "chacha20poly1305" => Ok(Algorithm::ChaCha20Poly1305),
            other => Err(CryptoError::Decode(format!("unsupported algorithm: {other}"))),
        }
    }
}

/// Cipher parameters needed to decrypt one file. Plain, non-secret metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionMetadata {
    #[serde(default)]
    pub algorithm: Algorithm,
    /// Base64 of the 96-bit nonce used for this file's single encryption
    #[serde(alias = "iv", default)]
    pub nonce: String,
}

impl EncryptionMetadata {
    pub fn new(algorithm: Algorithm, nonce: &Nonce) -> Self {
        Self {
            algorithm,
            nonce: nonce.to_base64(),
        }
    }

    pub fn nonce(&self) -> CryptoResult<Nonce> {
        Nonce::from_base64(&self.nonce)
    }
}
