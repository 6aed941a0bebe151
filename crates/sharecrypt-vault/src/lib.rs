//! sharecrypt-vault: the caller side of the envelope pipeline
//!
//! - `operator`: OpenDAL operator factory (memory / fs / S3)
//! - `keystore`: wrapped keys persisted one object per file id
//! - `master`:   master key + legacy IV loading from config and environment
//! - `transfer`: encrypt → wrap → persist on upload, and the reverse on download

pub mod keystore;
pub mod master;
pub mod operator;
pub mod transfer;

pub use keystore::WrappedKeyStore;
pub use master::{load_envelope, load_master_key};
pub use operator::build_operator;
pub use transfer::{
    discard_key, open_download, rotate_all, rotate_key, seal_upload, FileUpload, KeyRotation,
    RotationReport, SealedUpload,
};
