//! Error category classification

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// Error category classification based on error code ranges
///
/// Categories are determined by the code range:
/// - 0xxx: General errors
/// - 2xxx: Pricing / reference-data errors
/// - 4xxx: Order and quote state errors
/// - 5xxx: Confirmation token errors
/// - 9xxx: System errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// General errors (0xxx)
    General,
    /// Pricing / reference-data errors (2xxx)
    Pricing,
    /// Order and quote state errors (4xxx)
    State,
    /// Confirmation token errors (5xxx)
    Token,
    /// System errors (9xxx)
    System,
}

impl ErrorCategory {
    /// Determine category from error code value
    pub fn from_code(code: u16) -> Self {
        match code {
            0..1000 => Self::General,
            2000..3000 => Self::Pricing,
            4000..5000 => Self::State,
            5000..6000 => Self::Token,
            _ => Self::System,
        }
    }
}

impl ErrorCode {
    /// Get the category of this error code
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_ranges() {
        assert_eq!(ErrorCode::MissingFields.category(), ErrorCategory::General);
        assert_eq!(ErrorCode::DiamondPriceMissing.category(), ErrorCategory::Pricing);
        assert_eq!(ErrorCode::InvalidTransition.category(), ErrorCategory::State);
        assert_eq!(ErrorCode::AlreadyUsed.category(), ErrorCategory::Token);
        assert_eq!(ErrorCode::StorageError.category(), ErrorCategory::System);
    }
}
