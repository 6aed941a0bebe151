//! sharecrypt-crypto: client-side file encryption and server-side key wrapping
//!
//! Architecture: envelope encryption with one random key per file
//!
//! Pipeline: plaintext → FileCipher (AEAD, random 96-bit nonce) → ciphertext
//!           file key  → KeyEnvelope (AEAD under master key) → wrapped key
//!
//! Key hierarchy:
//! ```text
//! Master Key (256-bit, server-held; key file, env var, or Argon2id passphrase)
//!   └── File Key (per-file, 256-bit random, wrapped by master key)
//!       wrapped = base64( nonce[12] || AES-256-GCM(master, file_key) )
//!       └── File AEAD: AES-256-GCM or ChaCha20-Poly1305 (key=file_key, nonce=random_96bit)
//! ```
//!
//! `cipher` and `envelope` share no state: the client side never holds the
//! master key and the server side never sees file bytes.

mod aead;
pub mod cipher;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod metadata;

pub use cipher::{DecryptedFile, EncryptedFile, FileCipher};
pub use envelope::{KeyEnvelope, WrappedKey};
pub use error::{CryptoError, CryptoResult};
pub use kdf::{derive_master_key, generate_salt, KdfParams, MasterKey};
pub use keys::{generate_file_key, FileKey, Nonce};
pub use metadata::{Algorithm, EncryptionMetadata};

/// Size of file and master keys in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM / ChaCha20-Poly1305 nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of the AEAD authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of an Argon2id salt
pub const SALT_SIZE: usize = 16;

pub(crate) fn encode_b64(data: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.encode(data)
}

pub(crate) fn decode_b64(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.decode(s.trim())
}
