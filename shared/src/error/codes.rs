//! Unified error codes for the atelier back-office
//!
//! Error codes are shared between the server and the admin frontend.
//! They are organized by category:
//! - 0xxx: General errors
//! - 2xxx: Pricing / reference-data errors
//! - 4xxx: Order and quote state errors
//! - 5xxx: Confirmation token errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// Codes are represented as u16 values for efficient serialization and
/// cross-language compatibility; [`ErrorCode::as_str`] gives the stable
/// snake_case wire code the admin UI matches on.
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
    /// Invalid request
    InvalidRequest = 4,
    /// Required submission fields missing
    MissingFields = 5,
    /// No order/quote record for the given request id
    RequestNotFound = 6,

    // ==================== 2xxx: Pricing ====================
    /// Metal weight is required for pricing
    MissingMetalWeight = 2001,
    /// Metal string could not be parsed into a known purity/color
    InvalidMetal = 2002,
    /// No positive cost-per-gram resolved for the requested metal
    MissingMetalCost = 2003,
    /// No diamond price band matched the requested stone
    DiamondPriceMissing = 2004,
    /// Quote option index out of range or slot empty
    InvalidOption = 2005,

    // ==================== 4xxx: Order / Quote state ====================
    /// Requested status is not reachable from the current status
    InvalidTransition = 4001,
    /// Fulfillment details required before shipping are missing
    MissingShippingDetails = 4002,
    /// Order status does not permit customer cancellation
    StatusNotCancellable = 4003,

    // ==================== 5xxx: Tokens ====================
    /// Token has passed its expiry
    Expired = 5001,
    /// Token was already terminally resolved
    AlreadyUsed = 5002,
    /// Changing an existing selection requires explicit confirmation
    ConfirmRequired = 5003,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Storage layer error
    StorageError = 9002,
    /// Email delivery error
    EmailError = 9003,
    /// Upstream provider rate limit
    RateLimited = 9004,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Stable snake_case wire code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Unknown => "unknown",
            Self::ValidationFailed => "validation_failed",
            Self::NotFound => "not_found",
            Self::InvalidRequest => "invalid_request",
            Self::MissingFields => "missing_fields",
            Self::RequestNotFound => "request_not_found",
            Self::MissingMetalWeight => "missing_metal_weight",
            Self::InvalidMetal => "invalid_metal",
            Self::MissingMetalCost => "missing_metal_cost",
            Self::DiamondPriceMissing => "diamond_price_missing",
            Self::InvalidOption => "invalid_option",
            Self::InvalidTransition => "invalid_transition",
            Self::MissingShippingDetails => "missing_shipping_details",
            Self::StatusNotCancellable => "status_not_cancellable",
            Self::Expired => "expired",
            Self::AlreadyUsed => "already_used",
            Self::ConfirmRequired => "confirm_required",
            Self::InternalError => "internal_error",
            Self::StorageError => "storage_error",
            Self::EmailError => "email_error",
            Self::RateLimited => "rate_limited",
        }
    }

    /// Default human-readable message
    pub fn message(&self) -> &'static str {
        match self {
            Self::Success => "OK",
            Self::Unknown => "Unknown error",
            Self::ValidationFailed => "Validation failed",
            Self::NotFound => "Resource not found",
            Self::InvalidRequest => "Invalid request",
            Self::MissingFields => "Required fields are missing",
            Self::RequestNotFound => "Request not found",
            Self::MissingMetalWeight => "Metal weight is required",
            Self::InvalidMetal => "Unrecognized metal",
            Self::MissingMetalCost => "No metal cost configured for the requested purity",
            Self::DiamondPriceMissing => "No diamond price band matches the requested stone",
            Self::InvalidOption => "Invalid quote option",
            Self::InvalidTransition => "Status transition not allowed",
            Self::MissingShippingDetails => "Fulfillment details are incomplete",
            Self::StatusNotCancellable => "Order can no longer be cancelled",
            Self::Expired => "Link has expired",
            Self::AlreadyUsed => "Link was already used",
            Self::ConfirmRequired => "Changing the existing selection requires confirmation",
            Self::InternalError => "Internal server error",
            Self::StorageError => "Storage error",
            Self::EmailError => "Email delivery failed",
            Self::RateLimited => "Rate limited by upstream provider",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> u16 {
        code.code()
    }
}

/// Error returned when converting an unknown u16 into [`ErrorCode`]
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
        let code = match value {
            0 => Self::Success,
            1 => Self::Unknown,
            2 => Self::ValidationFailed,
            3 => Self::NotFound,
            4 => Self::InvalidRequest,
            5 => Self::MissingFields,
            6 => Self::RequestNotFound,
            2001 => Self::MissingMetalWeight,
            2002 => Self::InvalidMetal,
            2003 => Self::MissingMetalCost,
            2004 => Self::DiamondPriceMissing,
            2005 => Self::InvalidOption,
            4001 => Self::InvalidTransition,
            4002 => Self::MissingShippingDetails,
            4003 => Self::StatusNotCancellable,
            5001 => Self::Expired,
            5002 => Self::AlreadyUsed,
            5003 => Self::ConfirmRequired,
            9001 => Self::InternalError,
            9002 => Self::StorageError,
            9003 => Self::EmailError,
            9004 => Self::RateLimited,
            other => return Err(InvalidErrorCode(other)),
        };
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_u16() {
        for code in [
            ErrorCode::Success,
            ErrorCode::MissingFields,
            ErrorCode::DiamondPriceMissing,
            ErrorCode::InvalidTransition,
            ErrorCode::AlreadyUsed,
            ErrorCode::RateLimited,
        ] {
            let raw: u16 = code.into();
            assert_eq!(ErrorCode::try_from(raw), Ok(code));
        }
    }

    #[test]
    fn test_unknown_code_rejected() {
        assert_eq!(ErrorCode::try_from(777), Err(InvalidErrorCode(777)));
    }

    #[test]
    fn test_wire_codes_are_snake_case() {
        assert_eq!(ErrorCode::DiamondPriceMissing.as_str(), "diamond_price_missing");
        assert_eq!(ErrorCode::MissingShippingDetails.as_str(), "missing_shipping_details");
        assert_eq!(ErrorCode::AlreadyUsed.as_str(), "already_used");
    }
}
