pub mod config;
pub mod error;
pub mod types;

pub use error::{ShareCryptError, ShareCryptResult};
pub use types::FileRecord;
