use thiserror::Error;

use crate::auth::JwtError;
use crate::directory::DirectoryError;
use crate::orders::StorageError;

/// Startup and serving failures
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] JwtError),

    #[error("Storage initialization failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Directory initialization failed: {0}")]
    Directory(#[from] DirectoryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
