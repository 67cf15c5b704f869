//! Import pipeline errors

use super::session::SessionError;
use crate::archive::ArchiveError;
use crate::catalog::CatalogError;
use shared::error::{AppError, ErrorCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("No file received. Please choose a Product Porter package.")]
    MissingFile,

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("Unable to create a temporary directory for the import: {0}")]
    UploadDir(#[source] std::io::Error),

    #[error("The package does not contain any products.")]
    EmptyPackage,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Background task failed: {0}")]
    Join(String),
}

pub type ImportResult<T> = Result<T, ImportError>;

impl From<tokio::task::JoinError> for ImportError {
    fn from(err: tokio::task::JoinError) -> Self {
        ImportError::Join(err.to_string())
    }
}

impl From<ImportError> for AppError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::MissingFile => AppError::new(ErrorCode::MissingFile),
            ImportError::Archive(e) => e.into(),
            ImportError::UploadDir(e) => {
                AppError::with_message(ErrorCode::UploadDirUnavailable, e.to_string())
            }
            ImportError::EmptyPackage => AppError::new(ErrorCode::EmptyPackage),
            ImportError::Session(e) => e.into(),
            ImportError::Catalog(e) => e.into(),
            ImportError::Join(msg) => AppError::internal(msg),
        }
    }
}
