//! Wrapped-key store: one object per file id
//!
//! Layout:
//! ```text
//! {prefix}/keys/{file_id}   → base64 wrapped key (UTF-8, no framing)
//! ```
//!
//! The store never sees raw file keys; it persists only what
//! `KeyEnvelope::wrap` produced.

use opendal::{ErrorKind, Operator};
use sharecrypt_core::config::KeyStoreConfig;
use sharecrypt_core::{ShareCryptError, ShareCryptResult};
use sharecrypt_crypto::WrappedKey;
use tracing::debug;

use crate::operator::{build_operator, store_error};

#[derive(Debug, Clone)]
pub struct WrappedKeyStore {
    op: Operator,
    prefix: String,
}

impl WrappedKeyStore {
    pub fn new(op: Operator, prefix: &str) -> Self {
        Self {
            op,
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    pub fn from_config(cfg: &KeyStoreConfig) -> ShareCryptResult<Self> {
        Ok(Self::new(build_operator(cfg)?, &cfg.prefix))
    }

    fn keys_dir(&self) -> String {
        if self.prefix.is_empty() {
            "keys/".to_string()
        } else {
            format!("{}/keys/", self.prefix)
        }
    }

    /// Object path for `file_id`, rejecting ids that could escape the keys dir.
    pub fn key_path(&self, file_id: &str) -> ShareCryptResult<String> {
        validate_file_id(file_id)?;
        Ok(format!("{}{file_id}", self.keys_dir()))
    }

    pub async fn put(&self, file_id: &str, wrapped: &WrappedKey) -> ShareCryptResult<()> {
        let path = self.key_path(file_id)?;
        self.op
            .write(&path, wrapped.as_str().as_bytes().to_vec())
            .await
            .map_err(|e| store_error(&format!("writing {path}"), e))?;
        debug!(file_id, "wrapped key stored");
        Ok(())
    }

    /// Store the wrapped key for a new file, refusing to replace an existing one.
    pub async fn put_new(&self, file_id: &str, wrapped: &WrappedKey) -> ShareCryptResult<()> {
        if self.contains(file_id).await? {
            return Err(ShareCryptError::FileIdExists(file_id.to_string()));
        }
        self.put(file_id, wrapped).await
    }

    pub async fn contains(&self, file_id: &str) -> ShareCryptResult<bool> {
        let path = self.key_path(file_id)?;
        self.op
            .exists(&path)
            .await
            .map_err(|e| store_error(&format!("checking {path}"), e))
    }

    /// Fetch the wrapped key for `file_id`; `None` when nothing is stored.
    pub async fn get(&self, file_id: &str) -> ShareCryptResult<Option<WrappedKey>> {
        let path = self.key_path(file_id)?;
        let buf = match self.op.read(&path).await {
            Ok(buf) => buf,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(store_error(&format!("reading {path}"), e)),
        };

        let encoded = String::from_utf8(buf.to_vec())
            .map_err(|_| ShareCryptError::KeyStore(format!("{path}: stored value is not UTF-8")))?;
        Ok(Some(WrappedKey::new(encoded)))
    }

    /// Remove the wrapped key for `file_id`. Missing keys are not an error.
    pub async fn delete(&self, file_id: &str) -> ShareCryptResult<()> {
        let path = self.key_path(file_id)?;
        self.op
            .delete(&path)
            .await
            .map_err(|e| store_error(&format!("deleting {path}"), e))?;
        debug!(file_id, "wrapped key deleted");
        Ok(())
    }

    /// File ids that currently have a wrapped key, sorted.
    pub async fn list(&self) -> ShareCryptResult<Vec<String>> {
        let dir = self.keys_dir();
        let entries = match self.op.list(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(store_error(&format!("listing {dir}"), e)),
        };

        let mut ids: Vec<String> = entries
            .into_iter()
            .filter(|entry| entry.metadata().is_file())
            .map(|entry| entry.name().to_string())
            .filter(|name| validate_file_id(name).is_ok())
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Verify the backend is reachable by listing the root
    pub async fn check_health(&self) -> ShareCryptResult<()> {
        self.op
            .list("/")
            .await
            .map(|_| ())
            .map_err(|e| store_error("key store health check failed", e))
    }
}

/// File ids become object names: non-empty, `[A-Za-z0-9._-]`, not `.`/`..`.
pub fn validate_file_id(file_id: &str) -> ShareCryptResult<()> {
    let valid = !file_id.is_empty()
        && file_id.len() <= 255
        && file_id != "."
        && file_id != ".."
        && file_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if valid {
        Ok(())
    } else {
        Err(ShareCryptError::InvalidFileId(file_id.to_string()))
    }
}
