use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration (loaded from sharecrypt.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareCryptConfig {
    pub daemon: DaemonConfig,
    pub envelope: EnvelopeConfig,
    pub keystore: KeyStoreConfig,
    pub cipher: CipherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// HTTP listen address for the key service (default: 127.0.0.1:8787)
    pub listen: String,
    /// Serve /metrics on the key service listener
    pub metrics: bool,
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
}

/// Where the master key comes from. Key bytes never live in this file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    /// Env var holding the base64 master key (default: SHARECRYPT_MASTER_KEY)
    pub master_key_env: String,
    /// File holding the base64 master key; takes precedence over the env var
    pub master_key_file: Option<PathBuf>,
    /// Env var holding the base64 fixed IV of pre-migration wrapped keys.
    /// When set, those values can be unwrapped (never produced).
    pub legacy_iv_env: Option<String>,
    /// Argon2id memory cost in KiB for `master-key derive` (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStoreBackend {
    /// Process-local, lost on exit (tests, dry runs)
    Memory,
    /// Local directory
    #[default]
    Fs,
    /// S3-compatible object store
    S3,
}

/// Wrapped-key store: one object per file id under `{prefix}/keys/`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyStoreConfig {
    pub backend: KeyStoreBackend,
    /// Root directory for the fs backend
    pub root: PathBuf,
    /// Object prefix inside the backend
    pub prefix: String,
    /// S3 endpoint
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// S3 bucket
    pub bucket: String,
    /// Enforce HTTPS for S3 connections (error on HTTP endpoints)
    pub enforce_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherConfig {
    /// File content AEAD: "aes-256-gcm" (default) or "chacha20-poly1305"
    pub algorithm: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8787".into(),
            metrics: true,
            log_level: "info".into(),
            log_format: "text".into(),
        }
    }
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            master_key_env: "SHARECRYPT_MASTER_KEY".into(),
            master_key_file: None,
            legacy_iv_env: None,
            argon2_mem_cost_kib: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
        }
    }
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            backend: KeyStoreBackend::Fs,
            root: PathBuf::from("~/.local/share/sharecrypt"),
            prefix: "sharecrypt".into(),
            endpoint: "http://localhost:9000".into(),
            region: "us-east-1".into(),
            bucket: "sharecrypt".into(),
            enforce_tls: false,
        }
    }
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            algorithm: "aes-256-gcm".into(),
        }
    }
}
