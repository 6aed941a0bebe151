//! Upload/download glue: the caller side of the envelope pipeline
//!
//! Upload:   generate file key → encrypt → wrap → persist wrapped key → hand
//!           back ciphertext + record for the caller to store.
//! Download: look up wrapped key → unwrap → decrypt with the record's nonce.
//!
//! Plain file keys exist only inside these functions and are zeroized on drop.

use secrecy::ExposeSecret;
use serde::Serialize;
use sharecrypt_core::{FileRecord, ShareCryptError, ShareCryptResult};
use sharecrypt_crypto::{CryptoError, DecryptedFile, FileCipher, FileKey, KeyEnvelope, WrappedKey};
use tracing::{info, warn};

use crate::keystore::{validate_file_id, WrappedKeyStore};

/// A plaintext file on its way up.
#[derive(Debug, Clone, Copy)]
pub struct FileUpload<'a> {
    pub file_id: &'a str,
    pub storage_path: &'a str,
    pub mime_type: &'a str,
    pub bytes: &'a [u8],
}

/// What the caller persists after [`seal_upload`]: the opaque ciphertext at
/// `record.storage_path`, and the record itself in its metadata store.
#[derive(Debug, Clone)]
pub struct SealedUpload {
    pub ciphertext: Vec<u8>,
    pub record: FileRecord,
    pub wrapped_key: WrappedKey,
}

/// Encrypt `upload` under a fresh file key and persist the wrapped key.
///
/// Fails with [`ShareCryptError::FileIdExists`] if `upload.file_id` already has
/// a key; the existing key is left in place.
pub async fn seal_upload(
    cipher: &FileCipher,
    envelope: &KeyEnvelope,
    store: &WrappedKeyStore,
    upload: FileUpload<'_>,
) -> ShareCryptResult<SealedUpload> {
    validate_file_id(upload.file_id)?;
    if upload.mime_type.trim().is_empty() {
        return Err(CryptoError::MissingMetadata("mime_type").into());
    }
    if store.contains(upload.file_id).await? {
        return Err(ShareCryptError::FileIdExists(upload.file_id.to_string()));
    }

    let file_key = cipher.generate_key()?;
    let encrypted = cipher.encrypt(upload.bytes, &file_key)?;
    let wrapped_key = envelope.wrap(file_key.export_base64().expose_secret())?;
    drop(file_key);

    store.put_new(upload.file_id, &wrapped_key).await?;

    let record = FileRecord {
        file_id: upload.file_id.to_string(),
        storage_path: upload.storage_path.to_string(),
        mime_type: upload.mime_type.to_string(),
        size: upload.bytes.len() as u64,
        encryption: Some(encrypted.metadata()),
    };

    info!(
        file_id = upload.file_id,
        algorithm = %encrypted.algorithm,
        size = record.size,
        "file sealed"
    );

    Ok(SealedUpload {
        ciphertext: encrypted.ciphertext,
        record,
        wrapped_key,
    })
}

/// Decrypt a downloaded ciphertext using its record and the stored wrapped key.
pub async fn open_download(
    envelope: &KeyEnvelope,
    store: &WrappedKeyStore,
    record: &FileRecord,
    ciphertext: &[u8],
) -> ShareCryptResult<DecryptedFile> {
    let metadata = record
        .encryption
        .as_ref()
        .ok_or(CryptoError::MissingMetadata("encryption"))?;

    let wrapped = store
        .get(&record.file_id)
        .await?
        .ok_or_else(|| ShareCryptError::MissingWrappedKey(record.file_id.clone()))?;

    let exported = envelope.unwrap(&wrapped)?;
    let file_key = FileKey::import_base64(exported.expose_secret())?;

    let decrypted = FileCipher::decrypt_with_metadata(
        ciphertext,
        &file_key,
        Some(metadata),
        &record.mime_type,
    )?;

    info!(file_id = %record.file_id, size = decrypted.bytes.len(), "file opened");
    Ok(decrypted)
}

/// Forget a file's key. The ciphertext becomes unrecoverable.
pub async fn discard_key(store: &WrappedKeyStore, file_id: &str) -> ShareCryptResult<()> {
    store.delete(file_id).await?;
    info!(file_id, "file key discarded");
    Ok(())
}

/// What [`rotate_key`] did with one stored key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRotation {
    Rotated,
    /// The stored key already unwraps under the target master key.
    AlreadyCurrent,
    Missing,
}

/// Re-wrap one stored key from `from` to `to`.
///
/// A key that `to` can already unwrap is left as is, so an interrupted
/// rotation can be re-run.
pub async fn rotate_key(
    from: &KeyEnvelope,
    to: &KeyEnvelope,
    store: &WrappedKeyStore,
    file_id: &str,
) -> ShareCryptResult<KeyRotation> {
    let Some(wrapped) = store.get(file_id).await? else {
        return Ok(KeyRotation::Missing);
    };
    if to.unwrap(&wrapped).is_ok() {
        return Ok(KeyRotation::AlreadyCurrent);
    }

    let rewrapped = from.rewrap(&wrapped, to)?;
    store.put(file_id, &rewrapped).await?;
    Ok(KeyRotation::Rotated)
}

/// Outcome of [`rotate_all`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RotationReport {
    pub rotated: usize,
    /// Keys already wrapped under the target master key
    pub already_current: usize,
    /// `(file_id, error)` for keys that could not be re-wrapped; left untouched
    pub failed: Vec<(String, String)>,
}

/// Re-wrap every stored key under `to`. A failing key does not stop the run.
pub async fn rotate_all(
    from: &KeyEnvelope,
    to: &KeyEnvelope,
    store: &WrappedKeyStore,
) -> ShareCryptResult<RotationReport> {
    let mut report = RotationReport::default();

    for file_id in store.list().await? {
        match rotate_key(from, to, store, &file_id).await {
            Ok(KeyRotation::Rotated) => report.rotated += 1,
            Ok(KeyRotation::AlreadyCurrent) => report.already_current += 1,
            Ok(KeyRotation::Missing) => {}
            Err(e) => {
                warn!(file_id = %file_id, error = %e, "key rotation failed");
                report.failed.push((file_id, e.to_string()));
            }
        }
    }

    info!(
        from = %from.fingerprint(),
        to = %to.fingerprint(),
        rotated = report.rotated,
        already_current = report.already_current,
        failed = report.failed.len(),
        "master key rotation complete"
    );
    Ok(report)
}
