//! Order admin routes: action dispatcher and confirmation issuance

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::json;
use shared::error::{AppError, AppResult};
use shared::models::{FieldChange, TokenFlavor};
use shared::ApiResponse;
use std::collections::HashMap;

use crate::core::ServerState;
use crate::orders::{apply_order_action, OrderAction, OrderActionOutcome};
use crate::tokens::IssuedToken;
use crate::utils::now_millis;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/orders/action", post(action))
        .route("/orders/confirm", post(confirm))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderActionPayload {
    #[serde(alias = "requestId")]
    pub request_id: String,
    pub action: String,
    /// Target status for `set_status`
    #[serde(default)]
    pub status: Option<String>,
    /// Record field edits
    #[serde(default)]
    pub fields: HashMap<String, String>,
    /// Fulfillment detail updates applied with the action
    #[serde(default)]
    pub details: HashMap<String, String>,
    /// Free-text note appended to the audit trail
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn action(
    State(state): State<ServerState>,
    Json(payload): Json<OrderActionPayload>,
) -> AppResult<ApiResponse<OrderActionOutcome>> {
    let action = OrderAction::parse(&payload.action, payload.status.as_deref())?;
    let outcome = apply_order_action(
        &state.storage,
        &payload.request_id,
        action,
        &payload.fields,
        &payload.details,
        payload.notes.as_deref(),
        &state.config.public_base_url,
        now_millis(),
    )?;
    Ok(ApiResponse::success(outcome))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderConfirmPayload {
    #[serde(alias = "requestId")]
    pub request_id: String,
    /// The field changes the customer is asked to confirm
    pub changes: Vec<FieldChange>,
}

/// Issue an order-change confirmation token.
///
/// The snapshot freezes the proposed changes; the admin follows up with a
/// `request_confirmation` action once the email is on its way.
pub async fn confirm(
    State(state): State<ServerState>,
    Json(payload): Json<OrderConfirmPayload>,
) -> AppResult<ApiResponse<IssuedToken>> {
    if payload.changes.is_empty() {
        return Err(AppError::invalid_request("No changes to confirm"));
    }
    let order = state
        .storage
        .get_order(&payload.request_id)?
        .ok_or_else(|| AppError::request_not_found(&payload.request_id))?;

    let snapshot = json!({
        "changes": payload.changes,
        "product_name": order.details.product_name,
        "price": order.details.price,
    });
    let issued = state.tokens.issue(
        TokenFlavor::OrderChange,
        &payload.request_id,
        snapshot,
        now_millis(),
    )?;
    Ok(ApiResponse::success(issued))
}
