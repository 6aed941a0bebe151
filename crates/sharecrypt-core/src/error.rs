use sharecrypt_crypto::CryptoError;
use thiserror::Error;

pub type ShareCryptResult<T> = Result<T, ShareCryptError>;

#[derive(Debug, Error)]
pub enum ShareCryptError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("key store error: {0}")]
    KeyStore(String),

    #[error("invalid file id: {0:?}")]
    InvalidFileId(String),

    /// A wrapped key is already stored under this id; overwriting it would
    /// make the earlier file undecryptable.
    #[error("file id {0} already has a wrapped key")]
    FileIdExists(String),

    #[error("no wrapped key stored for file {0}")]
    MissingWrappedKey(String),

    #[error("config error: {0}")]
    Config(String),
}
