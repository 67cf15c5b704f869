//! Repository Module
//!
//! Free async functions over a `SqlitePool`, one module per table group.

pub mod attachment;
pub mod product;
pub mod setting;
pub mod term;

use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err
            && db_err.is_unique_violation()
        {
            return RepoError::Duplicate(db_err.message().to_string());
        }
        RepoError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(err: serde_json::Error) -> Self {
        RepoError::Database(format!("Invalid JSON column: {err}"))
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

impl From<RepoError> for shared::error::AppError {
    fn from(err: RepoError) -> Self {
        use shared::error::{AppError, ErrorCode};
        match err {
            RepoError::NotFound(msg) => AppError::with_message(ErrorCode::NotFound, msg),
            RepoError::Duplicate(msg) => AppError::with_message(ErrorCode::AlreadyExists, msg),
            RepoError::Validation(msg) => AppError::validation(msg),
            RepoError::Database(msg) => AppError::database(msg),
        }
    }
}
