//! Whole-file AEAD encryption on the uploading/downloading client
//!
//! Encrypted file format (binary, stored opaquely):
//! ```text
//! [N bytes: ciphertext][16 bytes: authentication tag]
//! ```
//!
//! The nonce is not embedded in the blob; it travels on the file record as
//! [`EncryptionMetadata`] together with the original MIME type.

use crate::aead;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{generate_file_key, FileKey, Nonce};
use crate::metadata::{Algorithm, EncryptionMetadata};

/// Output of [`FileCipher::encrypt`].
#[derive(Debug, Clone)]
pub struct EncryptedFile {
    /// `ciphertext || tag`, plaintext length + [`crate::TAG_SIZE`] bytes
    pub ciphertext: Vec<u8>,
    pub nonce: Nonce,
    pub algorithm: Algorithm,
}

impl EncryptedFile {
    pub fn metadata(&self) -> EncryptionMetadata {
        EncryptionMetadata::new(self.algorithm, &self.nonce)
    }
}

/// Output of [`FileCipher::decrypt`]: the original bytes and their content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedFile {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Stateless file encryptor. Holds only the algorithm choice.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCipher {
    algorithm: Algorithm,
}

impl FileCipher {
    pub fn new(algorithm: Algorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Generate a fresh per-file key.
    pub fn generate_key(&self) -> CryptoResult<FileKey> {
        generate_file_key()
    }

    /// Encrypt a whole file under `key` with a freshly drawn nonce.
    ///
    /// Every call draws its own nonce; callers cannot supply one.
    pub fn encrypt(&self, plaintext: &[u8], key: &FileKey) -> CryptoResult<EncryptedFile> {
        let nonce = Nonce::generate()?;

        let ciphertext = aead::seal(self.algorithm, key.as_bytes(), &nonce, plaintext)
            .map_err(|e| CryptoError::Encryption(format!("{}: {e}", self.algorithm)))?;

        tracing::trace!(
            algorithm = %self.algorithm,
            plaintext_len = plaintext.len(),
            ciphertext_len = ciphertext.len(),
            "file encrypted"
        );

        Ok(EncryptedFile {
            ciphertext,
            nonce,
            algorithm: self.algorithm,
        })
    }

    /// Decrypt a blob produced by [`FileCipher::encrypt`].
    ///
    /// - `nonce`: the nonce returned alongside the ciphertext
    /// - `mime_type`: the original content type recorded at upload
    ///
    /// Any tag mismatch yields [`CryptoError::Authentication`]; no partial
    /// plaintext is ever returned.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        key: &FileKey,
        nonce: &Nonce,
        mime_type: &str,
    ) -> CryptoResult<DecryptedFile> {
        if mime_type.trim().is_empty() {
            return Err(CryptoError::MissingMetadata("mime_type"));
        }

        let bytes = aead::open(self.algorithm, key.as_bytes(), nonce, ciphertext)
            .map_err(|_| CryptoError::Authentication)?;

        Ok(DecryptedFile {
            bytes,
            mime_type: mime_type.to_string(),
        })
    }

    /// Decrypt using the algorithm and nonce recorded in `metadata`.
    pub fn decrypt_with_metadata(
        ciphertext: &[u8],
        key: &FileKey,
        metadata: Option<&EncryptionMetadata>,
        mime_type: &str,
    ) -> CryptoResult<DecryptedFile> {
        let metadata = metadata.ok_or(CryptoError::MissingMetadata("encryption"))?;
        let nonce = metadata.nonce()?;
        FileCipher::new(metadata.algorithm).decrypt(ciphertext, key, &nonce, mime_type)
    }
}
