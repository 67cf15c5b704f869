//! Error category classification

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// Error category classification based on error code ranges
///
/// - 0xxx: General errors
/// - 6xxx: Catalog errors
/// - 7xxx: Transfer errors
/// - 9xxx: System errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// General errors (0xxx)
    General,
    /// Catalog errors (6xxx)
    Catalog,
    /// Import/export errors (7xxx)
    Transfer,
    /// System errors (9xxx and anything unassigned)
    System,
}

impl ErrorCategory {
    /// Determine category from error code value
    pub fn from_code(code: u16) -> Self {
        match code {
            0..1000 => Self::General,
            6000..7000 => Self::Catalog,
            7000..8000 => Self::Transfer,
            _ => Self::System,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Catalog => "catalog",
            Self::Transfer => "transfer",
            Self::System => "system",
        }
    }
}

impl ErrorCode {
    /// Get the category for this error code
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}
