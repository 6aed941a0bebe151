use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Failures of the cipher and envelope layers.
///
/// None of these are transient; callers must not retry them.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The OS random source could not produce key or nonce material.
    #[error("secure random source unavailable: {0}")]
    KeyGeneration(String),

    /// Tag verification failed: wrong key, wrong nonce, or corrupted ciphertext.
    #[error("cannot decrypt: authentication failed (wrong key or corrupted data)")]
    Authentication,

    /// The AEAD refused the plaintext (only possible for inputs beyond its length limit).
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Master key missing or malformed, or the wrapping cipher rejected its input.
    #[error("key wrapping failed: {0}")]
    Wrap(String),

    /// A stored wrapped key could not be recovered under the master key.
    #[error("key unwrapping failed: {0}")]
    Unwrap(String),

    #[error("missing encryption metadata: {0}")]
    MissingMetadata(&'static str),

    /// Malformed base64 or wrong-length key/nonce input.
    #[error("decode error: {0}")]
    Decode(String),
}

impl CryptoError {
    /// True for failures caused by master-key configuration rather than input.
    pub fn is_envelope_failure(&self) -> bool {
        matches!(self, CryptoError::Wrap(_) | CryptoError::Unwrap(_))
    }
}
