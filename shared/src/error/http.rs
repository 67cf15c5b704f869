//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound
            | Self::ProductNotFound
            | Self::TermNotFound
            | Self::AttachmentNotFound
            | Self::ImportSessionNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::AlreadyExists | Self::DuplicateSku | Self::TermExists => StatusCode::CONFLICT,

            // 500 Internal Server Error (environment problems, not data problems)
            Self::InternalError
            | Self::DatabaseError
            | Self::ConfigError
            | Self::StorageError
            | Self::FileSystemError
            | Self::MediaStoreFailed
            | Self::UploadDirUnavailable
            | Self::TempFileFailed
            | Self::ArchiveOpenFailed
            | Self::EncodingFailed => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (default for validation / package errors)
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_status() {
        assert_eq!(ErrorCode::Success.http_status(), StatusCode::OK);
    }

    #[test]
    fn test_not_found_status() {
        assert_eq!(ErrorCode::NotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::ImportSessionNotFound.http_status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_conflict_status() {
        assert_eq!(ErrorCode::DuplicateSku.http_status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_package_errors_are_bad_request() {
        assert_eq!(ErrorCode::MissingFile.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::EmptyPackage.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ErrorCode::ManifestInvalid.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::EmptySelection.http_status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_environment_errors_are_internal() {
        assert_eq!(
            ErrorCode::TempFileFailed.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::UploadDirUnavailable.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::StorageError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
