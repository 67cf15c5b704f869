//! Unified error codes for Product Porter
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 6xxx: Catalog errors
//! - 7xxx: Transfer errors (import/export packages, sessions)
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field is missing
    RequiredField = 7,

    // ==================== 6xxx: Catalog ====================
    /// Product not found
    ProductNotFound = 6001,
    /// SKU already used by another product
    DuplicateSku = 6002,
    /// Term not found
    TermNotFound = 6003,
    /// Term slug already exists in taxonomy
    TermExists = 6004,
    /// Taxonomy is not registered
    TaxonomyNotRegistered = 6005,
    /// Attachment not found
    AttachmentNotFound = 6006,
    /// Media file could not be stored
    MediaStoreFailed = 6007,

    // ==================== 7xxx: Transfer ====================
    /// No package file in the request
    MissingFile = 7001,
    /// Uploaded file is not a readable zip archive
    InvalidArchive = 7002,
    /// products.json missing from the package
    ManifestMissing = 7003,
    /// products.json is not a JSON array
    ManifestInvalid = 7004,
    /// Package contains no products
    EmptyPackage = 7005,
    /// Import session unknown or expired
    ImportSessionNotFound = 7006,
    /// Import working directory could not be created
    UploadDirUnavailable = 7007,
    /// Archive could not be unpacked
    UnpackFailed = 7008,
    /// Export called without product ids
    EmptySelection = 7101,
    /// Scratch file for export could not be allocated
    TempFileFailed = 7102,
    /// Export archive could not be created
    ArchiveOpenFailed = 7103,
    /// Product data could not be encoded
    EncodingFailed = 7104,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Configuration error
    ConfigError = 9005,
    /// Session storage error
    StorageError = 9401,
    /// File system error
    FileSystemError = 9402,
}

impl ErrorCode {
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",

            // Catalog
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::DuplicateSku => "SKU is already used by another product",
            ErrorCode::TermNotFound => "Term not found",
            ErrorCode::TermExists => "A term with this slug already exists",
            ErrorCode::TaxonomyNotRegistered => "Taxonomy is not registered",
            ErrorCode::AttachmentNotFound => "Attachment not found",
            ErrorCode::MediaStoreFailed => "Unable to store media file",

            // Transfer
            ErrorCode::MissingFile => "No file received. Please choose a Product Porter package.",
            ErrorCode::InvalidArchive => "The uploaded file is not a valid zip archive",
            ErrorCode::ManifestMissing => "The package is missing products.json.",
            ErrorCode::ManifestInvalid => "The products.json file is invalid JSON.",
            ErrorCode::EmptyPackage => "The package does not contain any products.",
            ErrorCode::ImportSessionNotFound => {
                "The import session could not be found. Please restart the import."
            }
            ErrorCode::UploadDirUnavailable => {
                "Unable to create a temporary directory for the import."
            }
            ErrorCode::UnpackFailed => "Failed to unpack the package",
            ErrorCode::EmptySelection => "No products were selected for export.",
            ErrorCode::TempFileFailed => {
                "Unable to create a temporary file for the export package."
            }
            ErrorCode::ArchiveOpenFailed => "Unable to create the export archive.",
            ErrorCode::EncodingFailed => "Failed to encode products data to JSON.",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::StorageError => "Session storage error",
            ErrorCode::FileSystemError => "File system error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            7 => Ok(ErrorCode::RequiredField),

            // Catalog
            6001 => Ok(ErrorCode::ProductNotFound),
            6002 => Ok(ErrorCode::DuplicateSku),
            6003 => Ok(ErrorCode::TermNotFound),
            6004 => Ok(ErrorCode::TermExists),
            6005 => Ok(ErrorCode::TaxonomyNotRegistered),
            6006 => Ok(ErrorCode::AttachmentNotFound),
            6007 => Ok(ErrorCode::MediaStoreFailed),

            // Transfer
            7001 => Ok(ErrorCode::MissingFile),
            7002 => Ok(ErrorCode::InvalidArchive),
            7003 => Ok(ErrorCode::ManifestMissing),
            7004 => Ok(ErrorCode::ManifestInvalid),
            7005 => Ok(ErrorCode::EmptyPackage),
            7006 => Ok(ErrorCode::ImportSessionNotFound),
            7007 => Ok(ErrorCode::UploadDirUnavailable),
            7008 => Ok(ErrorCode::UnpackFailed),
            7101 => Ok(ErrorCode::EmptySelection),
            7102 => Ok(ErrorCode::TempFileFailed),
            7103 => Ok(ErrorCode::ArchiveOpenFailed),
            7104 => Ok(ErrorCode::EncodingFailed),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9005 => Ok(ErrorCode::ConfigError),
            9401 => Ok(ErrorCode::StorageError),
            9402 => Ok(ErrorCode::FileSystemError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
