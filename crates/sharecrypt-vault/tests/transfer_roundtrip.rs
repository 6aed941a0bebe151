//! Integration tests for the seal/open pipeline against real OpenDAL backends.
//!
//! Ciphertext is written through the same operator the key store uses so the
//! tests exercise what a caller would do: blob in one place, wrapped key in
//! another, record carried separately.

use opendal::Operator;
use sharecrypt_core::config::{KeyStoreBackend, KeyStoreConfig};
use sharecrypt_core::ShareCryptError;
use sharecrypt_crypto::{Algorithm, CryptoError, FileCipher, KeyEnvelope, MasterKey};
use sharecrypt_vault::{
    discard_key, open_download, rotate_all, seal_upload, FileUpload, WrappedKeyStore,
};
use tempfile::TempDir;

fn memory_operator() -> Operator {
    Operator::new(opendal::services::Memory::default())
        .expect("memory operator")
        .finish()
}

fn envelope(byte: u8) -> KeyEnvelope {
    KeyEnvelope::new(MasterKey::from_bytes([byte; 32]))
}

#[tokio::test]
async fn sealed_upload_download_roundtrip() {
    let op = memory_operator();
    let store = WrappedKeyStore::new(op.clone(), "test/keys-roundtrip");
    let cipher = FileCipher::default();
    let env = envelope(42);

    let original = b"quarterly report: numbers go up and to the right";
    let sealed = seal_upload(
        &cipher,
        &env,
        &store,
        FileUpload {
            file_id: "report-q3",
            storage_path: "blobs/report-q3",
            mime_type: "application/pdf",
            bytes: original,
        },
    )
    .await
    .expect("seal should succeed");

    op.write(&sealed.record.storage_path, sealed.ciphertext.clone())
        .await
        .unwrap();

    // Blob at rest is ciphertext + tag, never the plaintext
    let blob = op.read(&sealed.record.storage_path).await.unwrap().to_vec();
    assert_eq!(blob.len(), original.len() + 16);
    assert!(!blob.windows(8).any(|w| w == &original[..8]));

    // The record survives a JSON trip through the caller's metadata store
    let json = serde_json::to_string(&sealed.record).unwrap();
    let record = serde_json::from_str(&json).unwrap();

    let opened = open_download(&env, &store, &record, &blob)
        .await
        .expect("open should succeed");
    assert_eq!(opened.bytes, original);
    assert_eq!(opened.mime_type, "application/pdf");
}

#[tokio::test]
async fn chacha_records_decrypt_with_recorded_algorithm() {
    let store = WrappedKeyStore::new(memory_operator(), "test");
    let env = envelope(1);

    let sealed = seal_upload(
        &FileCipher::new(Algorithm::ChaCha20Poly1305),
        &env,
        &store,
        FileUpload {
            file_id: "clip.mp4",
            storage_path: "blobs/clip",
            mime_type: "video/mp4",
            bytes: &[0xAB; 4096],
        },
    )
    .await
    .unwrap();

    let meta = sealed.record.encryption.as_ref().unwrap();
    assert_eq!(meta.algorithm, Algorithm::ChaCha20Poly1305);

    let opened = open_download(&env, &store, &sealed.record, &sealed.ciphertext)
        .await
        .unwrap();
    assert_eq!(opened.bytes, vec![0xAB; 4096]);
}

#[tokio::test]
async fn fs_backend_persists_across_store_instances() {
    let tmp = TempDir::new().unwrap();
    let cfg = KeyStoreConfig {
        backend: KeyStoreBackend::Fs,
        root: tmp.path().to_path_buf(),
        prefix: "vault".into(),
        ..Default::default()
    };
    let env = envelope(9);

    let sealed = {
        let store = WrappedKeyStore::from_config(&cfg).unwrap();
        seal_upload(
            &FileCipher::default(),
            &env,
            &store,
            FileUpload {
                file_id: "notes.txt",
                storage_path: "blobs/notes",
                mime_type: "text/plain",
                bytes: b"persisted",
            },
        )
        .await
        .unwrap()
    };

    assert!(tmp.path().join("vault/keys/notes.txt").is_file());

    let reopened = WrappedKeyStore::from_config(&cfg).unwrap();
    let opened = open_download(&env, &reopened, &sealed.record, &sealed.ciphertext)
        .await
        .unwrap();
    assert_eq!(opened.bytes, b"persisted");
}

#[tokio::test]
async fn wrong_master_key_cannot_open() {
    let store = WrappedKeyStore::new(memory_operator(), "test");
    let sealed = seal_upload(
        &FileCipher::default(),
        &envelope(1),
        &store,
        FileUpload {
            file_id: "f",
            storage_path: "blobs/f",
            mime_type: "text/plain",
            bytes: b"data",
        },
    )
    .await
    .unwrap();

    let err = open_download(&envelope(2), &store, &sealed.record, &sealed.ciphertext)
        .await
        .unwrap_err();
    assert!(
        matches!(err, ShareCryptError::Crypto(CryptoError::Unwrap(_))),
        "got {err:?}"
    );
}

#[tokio::test]
async fn tampered_ciphertext_fails_authentication() {
    let store = WrappedKeyStore::new(memory_operator(), "test");
    let env = envelope(3);
    let mut sealed = seal_upload(
        &FileCipher::default(),
        &env,
        &store,
        FileUpload {
            file_id: "f",
            storage_path: "blobs/f",
            mime_type: "text/plain",
            bytes: b"integrity matters",
        },
    )
    .await
    .unwrap();

    sealed.ciphertext[0] ^= 0x01;

    let err = open_download(&env, &store, &sealed.record, &sealed.ciphertext)
        .await
        .unwrap_err();
    assert!(matches!(err, ShareCryptError::Crypto(CryptoError::Authentication)));
}

#[tokio::test]
async fn rotate_all_moves_every_key_to_new_master() {
    let store = WrappedKeyStore::new(memory_operator(), "test");
    let cipher = FileCipher::default();
    let old = envelope(10);
    let new = envelope(11);

    let mut sealed = Vec::new();
    for id in ["a", "b", "c"] {
        let upload = FileUpload {
            file_id: id,
            storage_path: id,
            mime_type: "text/plain",
            bytes: id.as_bytes(),
        };
        sealed.push(seal_upload(&cipher, &old, &store, upload).await.unwrap());
    }

    // Written under some other master; rotation must skip it, not abort
    let stranger = seal_upload(
        &cipher,
        &envelope(99),
        &store,
        FileUpload {
            file_id: "stranger",
            storage_path: "s",
            mime_type: "text/plain",
            bytes: b"s",
        },
    )
    .await
    .unwrap();

    let report = rotate_all(&old, &new, &store).await.unwrap();
    assert_eq!(report.rotated, 3);
    assert_eq!(report.already_current, 0);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "stranger");

    // A re-run finds the rotated keys already current
    let rerun = rotate_all(&old, &new, &store).await.unwrap();
    assert_eq!(rerun.rotated, 0);
    assert_eq!(rerun.already_current, 3);
    assert_eq!(rerun.failed.len(), 1);
    assert_eq!(rerun.failed[0].0, "stranger");

    for s in &sealed {
        let opened = open_download(&new, &store, &s.record, &s.ciphertext)
            .await
            .unwrap();
        assert_eq!(opened.bytes, s.record.file_id.as_bytes());
        let stale = open_download(&old, &store, &s.record, &s.ciphertext).await;
        assert!(stale.is_err());
    }

    // Failed key left as it was
    assert_eq!(
        store.get("stranger").await.unwrap(),
        Some(stranger.wrapped_key)
    );
}

#[tokio::test]
async fn discard_then_list() {
    let store = WrappedKeyStore::new(memory_operator(), "test");
    let env = envelope(5);
    for id in ["keep", "drop"] {
        seal_upload(
            &FileCipher::default(),
            &env,
            &store,
            FileUpload {
                file_id: id,
                storage_path: id,
                mime_type: "text/plain",
                bytes: b"x",
            },
        )
        .await
        .unwrap();
    }

    discard_key(&store, "drop").await.unwrap();
    assert_eq!(store.list().await.unwrap(), vec!["keep"]);
}

#[tokio::test]
async fn same_file_name_from_two_dirs_keeps_first_key() {
    let tmp = TempDir::new().unwrap();
    let cfg = KeyStoreConfig {
        backend: KeyStoreBackend::Fs,
        root: tmp.path().to_path_buf(),
        prefix: "vault".into(),
        ..Default::default()
    };
    let store = WrappedKeyStore::from_config(&cfg).unwrap();
    let env = envelope(6);
    let cipher = FileCipher::default();

    let first = seal_upload(
        &cipher,
        &env,
        &store,
        FileUpload {
            file_id: "report.txt",
            storage_path: "a/report.txt.enc",
            mime_type: "text/plain",
            bytes: b"from a",
        },
    )
    .await
    .unwrap();

    let err = seal_upload(
        &cipher,
        &env,
        &store,
        FileUpload {
            file_id: "report.txt",
            storage_path: "b/report.txt.enc",
            mime_type: "text/plain",
            bytes: b"from b",
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ShareCryptError::FileIdExists(ref id) if id == "report.txt"));

    let opened = open_download(&env, &store, &first.record, &first.ciphertext)
        .await
        .unwrap();
    assert_eq!(opened.bytes, b"from a");
}
