//! Order admin actions: guarded status transitions with gated side effects
//!
//! A transition is legal only if the target appears in the current status's
//! allowed-edge set; the single exception is entering PENDING_CONFIRMATION
//! from NEW as part of an explicit "request confirmation" action. All
//! validation happens before the first write, and the order, its audit
//! note, and the fulfillment side-record commit in one transaction.

use crate::db::BackofficeStorage;
use crate::utils::to_iso;
use sha2::{Digest, Sha256};
use shared::error::{AppError, AppResult};
use shared::models::{OrderDetailsRecord, OrderStatus};
use std::collections::HashMap;

/// Admin action against an order
#[derive(Debug, Clone, PartialEq)]
pub enum OrderAction {
    Acknowledge,
    SendInvoice,
    MarkPaid,
    MarkInvoiceExpired,
    MarkProcessing,
    MarkShipped,
    MarkDelivered,
    Cancel,
    /// Admin asks the customer to confirm a proposed change; may enter
    /// PENDING_CONFIRMATION straight from NEW.
    RequestConfirmation,
    /// Explicit target status, validated against the same edge table
    SetStatus(OrderStatus),
    /// Field/notes update without a status change
    Edit,
}

impl OrderAction {
    /// Parse the wire action name; `set_status` needs the separate status value.
    pub fn parse(action: &str, status: Option<&str>) -> AppResult<OrderAction> {
        Ok(match action.trim().to_lowercase().as_str() {
            "acknowledge" => OrderAction::Acknowledge,
            "send_invoice" => OrderAction::SendInvoice,
            "mark_paid" => OrderAction::MarkPaid,
            "mark_invoice_expired" => OrderAction::MarkInvoiceExpired,
            "mark_processing" => OrderAction::MarkProcessing,
            "mark_shipped" => OrderAction::MarkShipped,
            "mark_delivered" => OrderAction::MarkDelivered,
            "cancel" => OrderAction::Cancel,
            "request_confirmation" => OrderAction::RequestConfirmation,
            "set_status" => {
                let raw = status.ok_or_else(|| {
                    AppError::invalid_request("set_status requires a status value")
                })?;
                let parsed = OrderStatus::parse(raw).ok_or_else(|| {
                    AppError::invalid_request(format!("Unknown status: {}", raw))
                })?;
                OrderAction::SetStatus(parsed)
            }
            "edit" => OrderAction::Edit,
            other => {
                return Err(AppError::invalid_request(format!(
                    "Unknown order action: {}",
                    other
                )));
            }
        })
    }

    /// Status this action moves the order to, if any
    fn target(&self) -> Option<OrderStatus> {
        match self {
            OrderAction::Acknowledge => Some(OrderStatus::Acknowledged),
            OrderAction::SendInvoice => Some(OrderStatus::Invoiced),
            OrderAction::MarkPaid => Some(OrderStatus::InvoicePaid),
            OrderAction::MarkInvoiceExpired => Some(OrderStatus::InvoiceExpired),
            OrderAction::MarkProcessing => Some(OrderStatus::Processing),
            OrderAction::MarkShipped => Some(OrderStatus::Shipped),
            OrderAction::MarkDelivered => Some(OrderStatus::Delivered),
            OrderAction::Cancel => Some(OrderStatus::Cancelled),
            OrderAction::RequestConfirmation => Some(OrderStatus::PendingConfirmation),
            OrderAction::SetStatus(status) => Some(*status),
            OrderAction::Edit => None,
        }
    }
}

/// Result of a successful order action
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderActionOutcome {
    pub request_id: String,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_link: Option<String>,
}

/// Deterministic payment link slug for an order
fn payment_link_for(base_url: &str, request_id: &str) -> String {
    let digest = Sha256::digest(request_id.as_bytes());
    format!(
        "{}/pay/{}",
        base_url.trim_end_matches('/'),
        &hex::encode(digest)[..16]
    )
}

/// Apply one admin action to an order.
///
/// Validates the edit fields, the fulfillment updates, the transition, and
/// the shipping gate before any write; then commits status, audit note, and
/// side-record together.
pub fn apply_order_action(
    storage: &BackofficeStorage,
    request_id: &str,
    action: OrderAction,
    fields: &HashMap<String, String>,
    details_updates: &HashMap<String, String>,
    note: Option<&str>,
    base_url: &str,
    now: i64,
) -> AppResult<OrderActionOutcome> {
    let txn = storage.begin_write()?;

    let mut order = storage
        .get_order_txn(&txn, request_id)?
        .ok_or_else(|| AppError::request_not_found(request_id))?;

    // Field edits are validated against the closed field set up front
    for (key, value) in fields {
        order.details.apply_field(key, value)?;
    }

    let mut details = storage
        .get_order_details_txn(&txn, request_id)?
        .unwrap_or_else(|| OrderDetailsRecord::new(request_id));
    for (key, value) in details_updates {
        details.set(key, value)?;
    }
    let details_changed = !details_updates.is_empty();

    let mut payment_link = None;

    if let Some(target) = action.target() {
        let exception = action == OrderAction::RequestConfirmation
            && order.status == OrderStatus::New
            && target == OrderStatus::PendingConfirmation;

        if !order.status.can_transition_to(target) && !exception {
            return Err(AppError::invalid_transition(
                order.status.as_str(),
                target.as_str(),
            ));
        }

        if target == OrderStatus::Shipped {
            let missing = details.missing_shipping_fields();
            if !missing.is_empty() {
                return Err(AppError::missing_shipping_details(missing));
            }
        }

        order.status = target;
        order.status_updated_at = now;
        order.append_note(&format!("status → {}", target), now);

        match target {
            OrderStatus::Invoiced => {
                let link = payment_link_for(base_url, request_id);
                order.append_note(&format!("payment link prepared: {}", link), now);
                details.payment_link = Some(link.clone());
                payment_link = Some(link);
            }
            OrderStatus::Delivered => {
                details.delivered_at = Some(now);
            }
            _ => {}
        }
    }

    if let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) {
        order.append_note(note, now);
    }

    storage.put_order(&txn, &order)?;
    if details_changed || payment_link.is_some() || order.status == OrderStatus::Delivered {
        storage.put_order_details(&txn, &details)?;
    }
    txn.commit().map_err(crate::db::StorageError::from)?;

    tracing::info!(
        request_id,
        status = %order.status,
        "Order action applied ({} at {})",
        order.status,
        to_iso(now)
    );

    Ok(OrderActionOutcome {
        request_id: request_id.to_string(),
        status: order.status,
        payment_link,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::error::ErrorCode;
    use shared::models::OrderRecord;

    fn seeded_storage(status: OrderStatus) -> BackofficeStorage {
        let storage = BackofficeStorage::open_in_memory().unwrap();
        let mut order = OrderRecord::new("HW-1001", 1_000);
        order.status = status;
        storage.upsert_order(&order).unwrap();
        storage
    }

    fn act(
        storage: &BackofficeStorage,
        action: OrderAction,
    ) -> AppResult<OrderActionOutcome> {
        apply_order_action(
            storage,
            "HW-1001",
            action,
            &HashMap::new(),
            &HashMap::new(),
            None,
            "https://www.example.com",
            2_000,
        )
    }

    fn shipping_details() -> HashMap<String, String> {
        [
            ("shipping_carrier", "DHL"),
            ("tracking_number", "XYZ123"),
            ("certificates", "IGI 555"),
            ("care_details", "Polish with soft cloth"),
            ("warranty_details", "Lifetime warranty"),
            ("service_details", "Free resize within 60 days"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_every_illegal_transition_is_rejected() {
        for current in OrderStatus::all() {
            for target in OrderStatus::all() {
                if current.can_transition_to(*target) {
                    continue;
                }
                let storage = seeded_storage(*current);
                let err = act(&storage, OrderAction::SetStatus(*target)).unwrap_err();
                assert_eq!(
                    err.code,
                    ErrorCode::InvalidTransition,
                    "{} → {} must be rejected",
                    current,
                    target
                );
                // Status untouched
                assert_eq!(
                    storage.get_order("HW-1001").unwrap().unwrap().status,
                    *current
                );
            }
        }
    }

    #[test]
    fn test_legal_transitions_apply_and_audit() {
        let storage = seeded_storage(OrderStatus::New);
        let outcome = act(&storage, OrderAction::Acknowledge).unwrap();
        assert_eq!(outcome.status, OrderStatus::Acknowledged);

        let order = storage.get_order("HW-1001").unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Acknowledged);
        assert_eq!(order.status_updated_at, 2_000);
        assert!(order.notes.contains("status → ACKNOWLEDGED"));
    }

    #[test]
    fn test_request_confirmation_exception_from_new() {
        let storage = seeded_storage(OrderStatus::New);
        let outcome = act(&storage, OrderAction::RequestConfirmation).unwrap();
        assert_eq!(outcome.status, OrderStatus::PendingConfirmation);

        // SetStatus does not get the exception
        let storage = seeded_storage(OrderStatus::New);
        let err = act(
            &storage,
            OrderAction::SetStatus(OrderStatus::PendingConfirmation),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransition);

        // And the exception does not apply elsewhere
        let storage = seeded_storage(OrderStatus::Invoiced);
        let err = act(&storage, OrderAction::RequestConfirmation).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransition);
    }

    #[test]
    fn test_shipped_gate_names_missing_fields() {
        let storage = seeded_storage(OrderStatus::InvoicePaid);

        let mut partial = shipping_details();
        partial.remove("tracking_number");
        let err = apply_order_action(
            &storage,
            "HW-1001",
            OrderAction::MarkShipped,
            &HashMap::new(),
            &partial,
            None,
            "https://www.example.com",
            2_000,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingShippingDetails);
        let details = err.details.unwrap();
        let missing = details.get("missing").unwrap().as_array().unwrap();
        assert!(missing.iter().any(|f| f == "tracking_number"));

        // Nothing mutated: status unchanged, side-record absent
        let order = storage.get_order("HW-1001").unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::InvoicePaid);
        assert!(storage.get_order_details("HW-1001").unwrap().is_none());
    }

    #[test]
    fn test_shipped_with_details_supplied_in_action() {
        let storage = seeded_storage(OrderStatus::InvoicePaid);
        let outcome = apply_order_action(
            &storage,
            "HW-1001",
            OrderAction::MarkShipped,
            &HashMap::new(),
            &shipping_details(),
            None,
            "https://www.example.com",
            2_000,
        )
        .unwrap();
        assert_eq!(outcome.status, OrderStatus::Shipped);

        let details = storage.get_order_details("HW-1001").unwrap().unwrap();
        assert_eq!(details.get("tracking_number"), Some("XYZ123"));
    }

    #[test]
    fn test_shipped_gate_accepts_preexisting_details() {
        let storage = seeded_storage(OrderStatus::InvoicePaid);
        // Fulfillment details saved earlier, separately from the transition
        apply_order_action(
            &storage,
            "HW-1001",
            OrderAction::Edit,
            &HashMap::new(),
            &shipping_details(),
            None,
            "https://www.example.com",
            1_500,
        )
        .unwrap();

        let outcome = act(&storage, OrderAction::MarkShipped).unwrap();
        assert_eq!(outcome.status, OrderStatus::Shipped);
    }

    #[test]
    fn test_invoiced_prepares_payment_link() {
        let storage = seeded_storage(OrderStatus::Acknowledged);
        let outcome = act(&storage, OrderAction::SendInvoice).unwrap();

        let link = outcome.payment_link.unwrap();
        assert!(link.starts_with("https://www.example.com/pay/"));

        let order = storage.get_order("HW-1001").unwrap().unwrap();
        assert!(order.notes.contains(&link));
        let details = storage.get_order_details("HW-1001").unwrap().unwrap();
        assert_eq!(details.payment_link.as_deref(), Some(link.as_str()));

        // Deterministic slug
        assert_eq!(
            payment_link_for("https://www.example.com", "HW-1001"),
            link
        );
    }

    #[test]
    fn test_reopen_cancelled_to_invoiced() {
        let storage = seeded_storage(OrderStatus::Cancelled);
        let outcome = act(&storage, OrderAction::SendInvoice).unwrap();
        assert_eq!(outcome.status, OrderStatus::Invoiced);
    }

    #[test]
    fn test_delivered_stamps_side_record() {
        let storage = seeded_storage(OrderStatus::Shipped);
        act(&storage, OrderAction::MarkDelivered).unwrap();
        let details = storage.get_order_details("HW-1001").unwrap().unwrap();
        assert_eq!(details.delivered_at, Some(2_000));
    }

    #[test]
    fn test_edit_applies_fields_without_status_change() {
        let storage = seeded_storage(OrderStatus::Acknowledged);
        let fields: HashMap<String, String> =
            [("metal_weight".to_string(), "6.5".to_string())].into();
        let outcome = apply_order_action(
            &storage,
            "HW-1001",
            OrderAction::Edit,
            &fields,
            &HashMap::new(),
            Some("customer asked for thicker band"),
            "https://www.example.com",
            2_000,
        )
        .unwrap();
        assert_eq!(outcome.status, OrderStatus::Acknowledged);

        let order = storage.get_order("HW-1001").unwrap().unwrap();
        assert_eq!(order.details.metal_weight, Some(6.5));
        assert!(order.notes.contains("thicker band"));
    }

    #[test]
    fn test_bad_edit_field_blocks_whole_action() {
        let storage = seeded_storage(OrderStatus::New);
        let fields: HashMap<String, String> =
            [("metal_weight".to_string(), "heavy".to_string())].into();
        let err = apply_order_action(
            &storage,
            "HW-1001",
            OrderAction::Acknowledge,
            &fields,
            &HashMap::new(),
            None,
            "https://www.example.com",
            2_000,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);

        // The transition did not happen either
        let order = storage.get_order("HW-1001").unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::New);
    }

    #[test]
    fn test_unknown_request_id() {
        let storage = BackofficeStorage::open_in_memory().unwrap();
        let err = act(&storage, OrderAction::Acknowledge).unwrap_err();
        assert_eq!(err.code, ErrorCode::RequestNotFound);
    }

    #[test]
    fn test_action_parse() {
        assert_eq!(
            OrderAction::parse("mark_shipped", None).unwrap(),
            OrderAction::MarkShipped
        );
        assert_eq!(
            OrderAction::parse("set_status", Some("INVOICE_NOT_PAID")).unwrap(),
            OrderAction::SetStatus(OrderStatus::InvoiceExpired)
        );
        assert!(OrderAction::parse("set_status", None).is_err());
        assert!(OrderAction::parse("melt", None).is_err());
    }
}
