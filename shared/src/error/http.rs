//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound | Self::RequestNotFound => StatusCode::NOT_FOUND,

            // 400 Bad Request
            Self::ValidationFailed
            | Self::InvalidRequest
            | Self::MissingFields
            | Self::InvalidMetal
            | Self::InvalidOption => StatusCode::BAD_REQUEST,

            // 409 Conflict - state disagreements the caller must resolve
            Self::InvalidTransition
            | Self::AlreadyUsed
            | Self::ConfirmRequired
            | Self::StatusNotCancellable => StatusCode::CONFLICT,

            // 410 Gone - expired confirmation links
            Self::Expired => StatusCode::GONE,

            // 422 Unprocessable - reference data incomplete or gate unmet
            Self::MissingMetalWeight
            | Self::MissingMetalCost
            | Self::DiamondPriceMissing
            | Self::MissingShippingDetails => StatusCode::UNPROCESSABLE_ENTITY,

            // 429 Too Many Requests
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            Self::Unknown | Self::InternalError | Self::StorageError | Self::EmailError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
