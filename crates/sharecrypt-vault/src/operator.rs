//! OpenDAL Operator factory for wrapped-key store backends

use opendal::Operator;
use sharecrypt_core::config::{KeyStoreBackend, KeyStoreConfig};
use sharecrypt_core::{ShareCryptError, ShareCryptResult};
use std::path::{Path, PathBuf};

/// Build the operator selected by `cfg.backend`.
///
/// S3 credentials are read from AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY.
pub fn build_operator(cfg: &KeyStoreConfig) -> ShareCryptResult<Operator> {
    let op = match cfg.backend {
        KeyStoreBackend::Memory => memory_operator()?,
        KeyStoreBackend::Fs => {
            let root = expand_tilde(&cfg.root);
            let builder = opendal::services::Fs::default().root(&root.to_string_lossy());
            Operator::new(builder)
                .map_err(|e| store_error("creating fs operator", e))?
                .finish()
        }
        KeyStoreBackend::S3 => {
            let access_key = std::env::var("AWS_ACCESS_KEY_ID").map_err(|_| {
                ShareCryptError::Config(
                    "keystore.backend = \"s3\" but AWS_ACCESS_KEY_ID is not set".into(),
                )
            })?;
            let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY").map_err(|_| {
                ShareCryptError::Config("AWS_SECRET_ACCESS_KEY environment variable not set".into())
            })?;
            build_s3(cfg, &access_key, &secret_key)?
        }
    };

    Ok(op
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(3)
                .with_jitter(),
        ))
}

/// Process-local operator; contents vanish with the process.
pub fn memory_operator() -> ShareCryptResult<Operator> {
    Ok(Operator::new(opendal::services::Memory::default())
        .map_err(|e| store_error("creating memory operator", e))?
        .finish())
}

/// Build an S3 operator.
///
/// If `enforce_tls` is true and the endpoint uses HTTP, this returns an error.
/// Otherwise, a warning is logged for non-HTTPS endpoints.
fn build_s3(
    cfg: &KeyStoreConfig,
    access_key_id: &str,
    secret_access_key: &str,
) -> ShareCryptResult<Operator> {
    if cfg.endpoint.starts_with("http://") {
        if cfg.enforce_tls {
            return Err(ShareCryptError::Config(format!(
                "S3 endpoint uses plaintext HTTP ({}), but enforce_tls is enabled. \
                 Use an HTTPS endpoint or set keystore.enforce_tls = false for local development.",
                cfg.endpoint
            )));
        }
        tracing::warn!(
            endpoint = %cfg.endpoint,
            "S3 endpoint uses plaintext HTTP; use HTTPS and keystore.enforce_tls in production"
        );
    }

    // path-style addressing is the opendal default, which MinIO-style endpoints need
    let builder = opendal::services::S3::default()
        .endpoint(&cfg.endpoint)
        .region(&cfg.region)
        .bucket(&cfg.bucket)
        .access_key_id(access_key_id)
        .secret_access_key(secret_access_key);

    Ok(Operator::new(builder)
        .map_err(|e| store_error("creating S3 operator", e))?
        .finish())
}

/// Expand `~` in path to the user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(home).join(rest)
    } else {
        path.to_path_buf()
    }
}

pub(crate) fn store_error(context: &str, e: opendal::Error) -> ShareCryptError {
    ShareCryptError::KeyStore(format!("{context}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_memory_operator() {
        let cfg = KeyStoreConfig {
            backend: KeyStoreBackend::Memory,
            ..Default::default()
        };
        assert!(build_operator(&cfg).is_ok());
    }

    #[test]
    fn test_build_fs_operator() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = KeyStoreConfig {
            backend: KeyStoreBackend::Fs,
            root: tmp.path().to_path_buf(),
            ..Default::default()
        };
        assert!(build_operator(&cfg).is_ok());
    }

    #[test]
    fn test_s3_http_enforce_tls() {
        let cfg = KeyStoreConfig {
            backend: KeyStoreBackend::S3,
            endpoint: "http://insecure:9000".into(),
            enforce_tls: true,
            ..Default::default()
        };
        let result = build_s3(&cfg, "key", "secret");
        let err = result.unwrap_err().to_string();
        assert!(
            err.contains("enforce_tls"),
            "error message should mention enforce_tls: {err}"
        );
    }

    #[test]
    fn test_s3_https() {
        let cfg = KeyStoreConfig {
            backend: KeyStoreBackend::S3,
            endpoint: "https://s3.example.com".into(),
            enforce_tls: true,
            ..Default::default()
        };
        assert!(build_s3(&cfg, "key", "secret").is_ok());
    }

    #[test]
    fn test_expand_tilde() {
        let home = std::env::var("HOME").unwrap_or_default();
        assert_eq!(
            expand_tilde(Path::new("~/keys")),
            PathBuf::from(home).join("keys")
        );
        assert_eq!(
            expand_tilde(Path::new("/abs/keys")),
            PathBuf::from("/abs/keys")
        );
    }
}
