//! Shared types for the atelier back-office
//!
//! Common types used across crates: error codes and the API response
//! envelope, plus the domain models (orders, quotes, pricing reference
//! data, confirmation tokens, status-email records).

pub mod error;
pub mod models;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use models::order::{OrderDetailsRecord, OrderRecord, OrderStatus};
pub use models::quote::{QuoteOption, QuoteRecord, QuoteStatus};
pub use models::token::{ConfirmationToken, TokenFlavor, TokenStatus};
