//! Order record, status machine edge table, and fulfillment side-record

use super::request::RequestDetails;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Order lifecycle status
///
/// Status only ever changes through the transition table below; the one
/// exception is the admin "request confirmation" action which may enter
/// `PENDING_CONFIRMATION` directly from `NEW`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    New,
    Acknowledged,
    PendingConfirmation,
    Invoiced,
    InvoicePaid,
    InvoiceExpired,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Statuses reachable from this one
    pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            New => &[Acknowledged, Cancelled],
            Acknowledged => &[PendingConfirmation, Invoiced, Cancelled],
            PendingConfirmation => &[Invoiced, Cancelled],
            Invoiced => &[InvoicePaid, InvoiceExpired, Cancelled],
            InvoiceExpired => &[Invoiced, Cancelled],
            InvoicePaid => &[Processing, Shipped],
            Processing => &[Shipped],
            Shipped => &[Delivered],
            Delivered => &[],
            // Reopen: a cancelled order can be re-invoiced
            Cancelled => &[Invoiced],
        }
    }

    /// Whether `target` appears in this status's allowed-edge set
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        self.allowed_transitions().contains(&target)
    }

    /// Statuses awaiting customer action that warrant periodic re-notification
    pub fn is_reminder_eligible(&self) -> bool {
        matches!(
            self,
            OrderStatus::PendingConfirmation | OrderStatus::Invoiced | OrderStatus::InvoiceExpired
        )
    }

    /// Whether a customer cancellation link is still honored in this status
    pub fn is_cancellable(&self) -> bool {
        self.can_transition_to(OrderStatus::Cancelled)
    }

    /// Parse a raw status string, tolerating the legacy alias
    /// `INVOICE_NOT_PAID` for `INVOICE_EXPIRED`.
    pub fn parse(raw: &str) -> Option<OrderStatus> {
        use OrderStatus::*;
        let normalized = raw.trim().to_uppercase();
        Some(match normalized.as_str() {
            "NEW" | "" => New,
            "ACKNOWLEDGED" => Acknowledged,
            "PENDING_CONFIRMATION" => PendingConfirmation,
            "INVOICED" => Invoiced,
            "INVOICE_PAID" => InvoicePaid,
            "INVOICE_EXPIRED" | "INVOICE_NOT_PAID" => InvoiceExpired,
            "PROCESSING" => Processing,
            "SHIPPED" => Shipped,
            "DELIVERED" => Delivered,
            "CANCELLED" => Cancelled,
            _ => return None,
        })
    }

    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Acknowledged => "ACKNOWLEDGED",
            OrderStatus::PendingConfirmation => "PENDING_CONFIRMATION",
            OrderStatus::Invoiced => "INVOICED",
            OrderStatus::InvoicePaid => "INVOICE_PAID",
            OrderStatus::InvoiceExpired => "INVOICE_EXPIRED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// All statuses, for exhaustive validation sweeps
    pub fn all() -> &'static [OrderStatus] {
        use OrderStatus::*;
        &[
            New,
            Acknowledged,
            PendingConfirmation,
            Invoiced,
            InvoicePaid,
            InvoiceExpired,
            Processing,
            Shipped,
            Delivered,
            Cancelled,
        ]
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A customer order
///
/// Retained for audit after any terminal status; the notes field is an
/// append-only trail of timestamped entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRecord {
    pub request_id: String,
    /// Unix millis of submission
    pub created_at: i64,
    pub status: OrderStatus,
    /// Unix millis of the last status change
    pub status_updated_at: i64,
    /// Append-only audit trail
    #[serde(default)]
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(flatten)]
    pub details: RequestDetails,

    // === Shipping address ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    // === Attribution ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_medium: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_campaign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl OrderRecord {
    /// Create a fresh order in the initial status
    pub fn new(request_id: impl Into<String>, now: i64) -> Self {
        Self {
            request_id: request_id.into(),
            created_at: now,
            status: OrderStatus::New,
            status_updated_at: now,
            notes: String::new(),
            last_error: None,
            source: None,
            details: RequestDetails::default(),
            address_line1: None,
            address_line2: None,
            city: None,
            state: None,
            postal_code: None,
            country: None,
            utm_source: None,
            utm_medium: None,
            utm_campaign: None,
            referrer: None,
            origin: None,
        }
    }

    /// Append a timestamped line to the audit trail
    pub fn append_note(&mut self, note: &str, now: i64) {
        let stamp = Utc
            .timestamp_millis_opt(now)
            .single()
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .unwrap_or_else(|| now.to_string());
        if !self.notes.is_empty() {
            self.notes.push('\n');
        }
        self.notes.push_str(&format!("[{}] {}", stamp, note));
    }
}

/// Fulfillment detail fields that must exist before an order can ship
pub const REQUIRED_SHIPPING_FIELDS: &[&str] = &[
    "shipping_carrier",
    "tracking_number",
    "certificates",
    "care_details",
    "warranty_details",
    "service_details",
];

/// Fulfillment side-record, upserted independently of the order status
///
/// Consulted by the state machine to gate SHIPPED/DELIVERED.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OrderDetailsRecord {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_carrier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_eta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificates: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub care_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warranty_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_details: Option<String>,
    /// Payment link prepared when the order enters INVOICED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_link: Option<String>,
    /// Unix millis when the carrier reported delivery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<i64>,
    /// Unix millis of the last shipping-status poll
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_shipping_check_at: Option<i64>,
}

impl OrderDetailsRecord {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            ..Default::default()
        }
    }

    /// Read one field by name (shipping-gate check)
    pub fn get(&self, field: &str) -> Option<&str> {
        let value = match field {
            "shipping_method" => &self.shipping_method,
            "shipping_carrier" => &self.shipping_carrier,
            "tracking_number" => &self.tracking_number,
            "tracking_url" => &self.tracking_url,
            "shipping_status" => &self.shipping_status,
            "delivery_eta" => &self.delivery_eta,
            "shipping_notes" => &self.shipping_notes,
            "certificates" => &self.certificates,
            "care_details" => &self.care_details,
            "warranty_details" => &self.warranty_details,
            "service_details" => &self.service_details,
            "payment_link" => &self.payment_link,
            _ => return None,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }

    /// Upsert one field by name; empty values clear. Unknown keys are rejected.
    pub fn set(&mut self, field: &str, raw: &str) -> crate::error::AppResult<()> {
        let value = raw.trim();
        let slot = match field {
            "shipping_method" => &mut self.shipping_method,
            "shipping_carrier" => &mut self.shipping_carrier,
            "tracking_number" => &mut self.tracking_number,
            "tracking_url" => &mut self.tracking_url,
            "shipping_status" => &mut self.shipping_status,
            "delivery_eta" => &mut self.delivery_eta,
            "shipping_notes" => &mut self.shipping_notes,
            "certificates" => &mut self.certificates,
            "care_details" => &mut self.care_details,
            "warranty_details" => &mut self.warranty_details,
            "service_details" => &mut self.service_details,
            "payment_link" => &mut self.payment_link,
            other => {
                return Err(crate::error::AppError::invalid_request(format!(
                    "Unknown fulfillment field: {}",
                    other
                )));
            }
        };
        *slot = if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        };
        Ok(())
    }

    /// Names of required shipping fields still missing
    pub fn missing_shipping_fields(&self) -> Vec<String> {
        REQUIRED_SHIPPING_FIELDS
            .iter()
            .filter(|field| self.get(field).is_none())
            .map(|field| field.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table_matches_flow() {
        use OrderStatus::*;
        assert!(New.can_transition_to(Acknowledged));
        assert!(New.can_transition_to(Cancelled));
        assert!(!New.can_transition_to(Shipped));

        assert!(Invoiced.can_transition_to(InvoicePaid));
        assert!(Invoiced.can_transition_to(InvoiceExpired));
        assert!(!Invoiced.can_transition_to(Processing));

        assert!(Cancelled.can_transition_to(Invoiced));
        assert!(!Cancelled.can_transition_to(New));

        assert!(Delivered.allowed_transitions().is_empty());
    }

    #[test]
    fn test_status_never_regresses_to_new() {
        for status in OrderStatus::all() {
            assert!(
                !status.can_transition_to(OrderStatus::New),
                "{} must not regress to NEW",
                status
            );
        }
    }

    #[test]
    fn test_legacy_alias_normalizes() {
        assert_eq!(
            OrderStatus::parse("INVOICE_NOT_PAID"),
            Some(OrderStatus::InvoiceExpired)
        );
        assert_eq!(OrderStatus::parse("shipped"), Some(OrderStatus::Shipped));
        assert_eq!(OrderStatus::parse(""), Some(OrderStatus::New));
        assert_eq!(OrderStatus::parse("MELTED"), None);
    }

    #[test]
    fn test_reminder_eligible_set() {
        let eligible: Vec<_> = OrderStatus::all()
            .iter()
            .filter(|s| s.is_reminder_eligible())
            .collect();
        assert_eq!(
            eligible,
            vec![
                &OrderStatus::PendingConfirmation,
                &OrderStatus::Invoiced,
                &OrderStatus::InvoiceExpired
            ]
        );
    }

    #[test]
    fn test_append_note_accumulates() {
        let mut order = OrderRecord::new("HW-1001", 1_700_000_000_000);
        order.append_note("status → ACKNOWLEDGED", 1_700_000_000_000);
        order.append_note("status → INVOICED", 1_700_000_100_000);

        let lines: Vec<_> = order.notes.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("ACKNOWLEDGED"));
        assert!(lines[1].contains("INVOICED"));
        assert!(lines[0].starts_with('['));
    }

    #[test]
    fn test_missing_shipping_fields() {
        let mut details = OrderDetailsRecord::new("HW-1001");
        details.set("shipping_carrier", "DHL").unwrap();
        details.set("certificates", "IGI 1234").unwrap();

        let missing = details.missing_shipping_fields();
        assert!(missing.contains(&"tracking_number".to_string()));
        assert!(!missing.contains(&"shipping_carrier".to_string()));
    }

    #[test]
    fn test_details_set_blank_clears() {
        let mut details = OrderDetailsRecord::new("HW-1001");
        details.set("tracking_number", "XYZ123").unwrap();
        assert_eq!(details.get("tracking_number"), Some("XYZ123"));
        details.set("tracking_number", "   ").unwrap();
        assert_eq!(details.get("tracking_number"), None);
    }

    #[test]
    fn test_details_set_unknown_rejected() {
        let mut details = OrderDetailsRecord::new("HW-1001");
        assert!(details.set("giftwrap", "yes").is_err());
    }
}
