//! Master key loading
//!
//! Resolution order: `envelope.master_key_file` if set, else the env var named
//! by `envelope.master_key_env`. Both hold the base64 32-byte key.

use secrecy::SecretString;
use sharecrypt_core::config::EnvelopeConfig;
use sharecrypt_crypto::{CryptoError, CryptoResult, KdfParams, KeyEnvelope, MasterKey, Nonce};
use tracing::info;

use crate::operator::expand_tilde;

/// Load the master key from the configured file or environment variable.
///
/// Any failure (unset, unreadable, malformed, wrong length) is reported as
/// [`CryptoError::Wrap`]: without a master key nothing can be wrapped.
pub fn load_master_key(cfg: &EnvelopeConfig) -> CryptoResult<MasterKey> {
    let encoded = match &cfg.master_key_file {
        Some(path) => {
            let path = expand_tilde(path);
            std::fs::read_to_string(&path).map_err(|e| {
                CryptoError::Wrap(format!("reading master key file {}: {e}", path.display()))
            })?
        }
        None => std::env::var(&cfg.master_key_env).map_err(|_| {
            CryptoError::Wrap(format!(
                "master key not configured: set {} or envelope.master_key_file",
                cfg.master_key_env
            ))
        })?,
    };

    MasterKey::from_base64(&SecretString::from(encoded.trim().to_string()))
}

/// Build the envelope, enabling fixed-IV unwrap when `legacy_iv_env` is configured.
pub fn load_envelope(cfg: &EnvelopeConfig) -> CryptoResult<KeyEnvelope> {
    let mut envelope = KeyEnvelope::new(load_master_key(cfg)?);

    if let Some(var) = &cfg.legacy_iv_env {
        let encoded = std::env::var(var)
            .map_err(|_| CryptoError::Wrap(format!("{var} is not set (legacy_iv_env)")))?;
        let nonce = Nonce::from_base64(encoded.trim())
            .map_err(|e| CryptoError::Wrap(format!("{var}: invalid legacy IV: {e}")))?;
        envelope = envelope.with_legacy_nonce(nonce);
    }

    info!(
        master = %envelope.fingerprint(),
        legacy = envelope.accepts_legacy(),
        "master key loaded"
    );
    Ok(envelope)
}

/// Argon2id parameters for `master-key derive`.
pub fn kdf_params(cfg: &EnvelopeConfig) -> KdfParams {
    KdfParams {
        mem_cost_kib: cfg.argon2_mem_cost_kib,
        time_cost: cfg.argon2_time_cost,
        parallelism: cfg.argon2_parallelism,
    }
}
