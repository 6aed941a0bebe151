use serde::{Deserialize, Serialize};
use sharecrypt_crypto::EncryptionMetadata;

/// Plain metadata persisted next to each uploaded file.
///
/// Carries everything decryption needs besides the key itself: the nonce and
/// algorithm (in `encryption`) and the original content type, which the
/// opaque ciphertext blob cannot reveal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_id: String,
    /// Where the caller stored the ciphertext (bucket path, object key, ...)
    pub storage_path: String,
    pub mime_type: String,
    /// Plaintext size in bytes
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionMetadata>,
}

impl FileRecord {
    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }
}
