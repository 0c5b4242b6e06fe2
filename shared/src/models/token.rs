//! Confirmation/cancellation token records

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token flavor: each has its own key prefix, TTL, and terminal states
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TokenFlavor {
    /// Customer confirms an admin-proposed order change
    OrderChange,
    /// Customer cancels an order outright
    OrderCancel,
    /// Customer picks and accepts a quote option
    QuoteAccept,
}

impl TokenFlavor {
    /// Store key prefix for this flavor
    pub fn prefix(&self) -> &'static str {
        match self {
            TokenFlavor::OrderChange => "order_confirm",
            TokenFlavor::OrderCancel => "order_cancel",
            TokenFlavor::QuoteAccept => "quote_accept",
        }
    }

    /// Time-to-live in milliseconds
    pub fn ttl_millis(&self) -> i64 {
        match self {
            // Quote links go stale quickly; order links ride along with
            // the slower fulfillment conversation.
            TokenFlavor::QuoteAccept => 72 * 60 * 60 * 1000,
            TokenFlavor::OrderChange | TokenFlavor::OrderCancel => 168 * 60 * 60 * 1000,
        }
    }

    /// Public confirmation page path for this flavor
    pub fn url_path(&self) -> &'static str {
        match self {
            TokenFlavor::OrderChange => "/order_confirmation",
            TokenFlavor::OrderCancel => "/order_cancellation",
            TokenFlavor::QuoteAccept => "/quote_confirmation",
        }
    }
}

/// Token lifecycle status
///
/// Order flavors move Pending → Confirmed/Canceled/Expired. The quote
/// flavor distinguishes Selected (customer picked an option) from
/// Accepted (customer completed acceptance).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    #[default]
    Pending,
    Confirmed,
    Canceled,
    Selected,
    Accepted,
    Expired,
}

impl TokenStatus {
    /// Whether a read in this status may still be acted on
    pub fn is_actionable(&self) -> bool {
        matches!(self, TokenStatus::Pending | TokenStatus::Selected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Pending => "pending",
            TokenStatus::Confirmed => "confirmed",
            TokenStatus::Canceled => "canceled",
            TokenStatus::Selected => "selected",
            TokenStatus::Accepted => "accepted",
            TokenStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One proposed field change carried in an order-change snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldChange {
    /// Record field key, e.g. "metal_weight"
    pub field: String,
    /// Display label shown to the customer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
}

/// A single-use confirmation artifact stored under a flavor-specific key
///
/// The snapshot freezes exactly what the customer is being asked to
/// confirm; expiry is enforced logically on every read since store-level
/// TTL may lag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfirmationToken {
    /// Random unguessable token value (hex)
    pub token: String,
    pub flavor: TokenFlavor,
    /// The order/quote this token acts on
    pub request_id: String,
    pub status: TokenStatus,
    /// Flavor-specific payload the customer is confirming
    #[serde(default)]
    pub snapshot: Value,
    /// Unix millis
    pub created_at: i64,
    /// Unix millis
    pub expires_at: i64,
    /// Forward pointer set when a refresh superseded this token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<String>,
    /// Quote flavor: index of the option the customer selected (1-based)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<usize>,
    /// Quote flavor: metal variant the customer selected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_metal: Option<String>,
    /// Unix millis of the terminal resolution, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<i64>,
}

impl ConfirmationToken {
    pub fn new(
        token: impl Into<String>,
        flavor: TokenFlavor,
        request_id: impl Into<String>,
        snapshot: Value,
        now: i64,
    ) -> Self {
        Self {
            token: token.into(),
            flavor,
            request_id: request_id.into(),
            status: TokenStatus::Pending,
            snapshot,
            created_at: now,
            expires_at: now + flavor.ttl_millis(),
            superseded_by: None,
            selected_option: None,
            selected_metal: None,
            resolved_at: None,
        }
    }

    /// Logical expiry check, independent of store-level TTL
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}
