//! Algorithm dispatch for the two supported 96-bit-nonce AEADs

use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    Aes256Gcm,
};
use chacha20poly1305::ChaCha20Poly1305;

use crate::keys::Nonce;
use crate::metadata::Algorithm;
use crate::KEY_SIZE;

pub(crate) use aes_gcm::aead::Error;

/// Encrypt `plaintext`, returning `ciphertext || tag`.
pub(crate) fn seal(
    algorithm: Algorithm,
    key: &[u8; KEY_SIZE],
    nonce: &Nonce,
    plaintext: &[u8],
) -> Result<Vec<u8>, Error> {
    let nonce = GenericArray::from_slice(nonce.as_bytes());
    match algorithm {
        Algorithm::Aes256Gcm => Aes256Gcm::new(key.into()).encrypt(nonce, plaintext),
        Algorithm::ChaCha20Poly1305 => ChaCha20Poly1305::new(key.into()).encrypt(nonce, plaintext),
    }
}

/// Verify and decrypt `ciphertext || tag`. No plaintext is returned on failure.
pub(crate) fn open(
    algorithm: Algorithm,
    key: &[u8; KEY_SIZE],
    nonce: &Nonce,
    ciphertext: &[u8],
) -> Result<Vec<u8>, Error> {
    let nonce = GenericArray::from_slice(nonce.as_bytes());
    match algorithm {
        Algorithm::Aes256Gcm => Aes256Gcm::new(key.into()).decrypt(nonce, ciphertext),
        Algorithm::ChaCha20Poly1305 => ChaCha20Poly1305::new(key.into()).decrypt(nonce, ciphertext),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TAG_SIZE;

    #[test]
    fn test_algorithms_are_not_interchangeable() {
        let key = [7u8; KEY_SIZE];
        let nonce = Nonce::from_bytes([1u8; 12]);

        let sealed = seal(Algorithm::Aes256Gcm, &key, &nonce, b"payload").unwrap();
        assert_eq!(sealed.len(), 7 + TAG_SIZE);
        assert!(open(Algorithm::ChaCha20Poly1305, &key, &nonce, &sealed).is_err());
        assert_eq!(
            open(Algorithm::Aes256Gcm, &key, &nonce, &sealed).unwrap(),
            b"payload"
        );
    }

    #[test]
    fn test_truncated_input_rejected() {
        let key = [7u8; KEY_SIZE];
        let nonce = Nonce::from_bytes([1u8; 12]);
        assert!(open(Algorithm::Aes256Gcm, &key, &nonce, &[0u8; 4]).is_err());
    }
}
