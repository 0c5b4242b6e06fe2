//! Public confirmation routes
//!
//! These are the customer-facing endpoints behind the emailed links. Every
//! mutating call re-validates the token's status immediately before acting;
//! a reused link answers `already_used`, a stale one `expired` (with a
//! redirect token when a refresh superseded it).

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{QuoteStatus, TokenFlavor};
use shared::ApiResponse;
use std::collections::HashMap;

use crate::core::ServerState;
use crate::orders::{apply_order_action, OrderAction};
use crate::tokens::{TokenAction, TokenResolution};
use crate::utils::now_millis;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/confirmation/order", get(peek_order).post(resolve_order))
        .route(
            "/confirmation/order-cancel",
            get(peek_cancel).post(resolve_cancel),
        )
        .route("/confirmation/quote", get(peek_quote).post(resolve_quote))
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

async fn peek_order(
    State(state): State<ServerState>,
    Query(query): Query<TokenQuery>,
) -> AppResult<ApiResponse<TokenResolution>> {
    let resolution = state
        .tokens
        .peek(TokenFlavor::OrderChange, &query.token, now_millis())?;
    Ok(ApiResponse::success(resolution))
}

async fn peek_cancel(
    State(state): State<ServerState>,
    Query(query): Query<TokenQuery>,
) -> AppResult<ApiResponse<TokenResolution>> {
    let resolution = state
        .tokens
        .peek(TokenFlavor::OrderCancel, &query.token, now_millis())?;
    Ok(ApiResponse::success(resolution))
}

async fn peek_quote(
    State(state): State<ServerState>,
    Query(query): Query<TokenQuery>,
) -> AppResult<ApiResponse<TokenResolution>> {
    let resolution = state
        .tokens
        .peek(TokenFlavor::QuoteAccept, &query.token, now_millis())?;
    Ok(ApiResponse::success(resolution))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderResolvePayload {
    pub token: String,
    /// "confirm" accepts the proposed update; "cancel" declines and
    /// cancels the order
    pub action: String,
}

async fn resolve_order(
    State(state): State<ServerState>,
    Json(payload): Json<OrderResolvePayload>,
) -> AppResult<ApiResponse<TokenResolution>> {
    let now = now_millis();
    match payload.action.trim().to_lowercase().as_str() {
        "confirm" => {
            let resolution =
                state
                    .tokens
                    .resolve(TokenFlavor::OrderChange, &payload.token, TokenAction::Confirm, now)?;
            apply_order_action(
                &state.storage,
                &resolution.request_id,
                OrderAction::Edit,
                &HashMap::new(),
                &HashMap::new(),
                Some("customer confirmed order update"),
                &state.config.public_base_url,
                now,
            )?;
            Ok(ApiResponse::success(resolution))
        }
        "cancel" => {
            let resolution = cancel_order_via_token(
                &state,
                TokenFlavor::OrderChange,
                &payload.token,
                TokenAction::Cancel,
                now,
            )?;
            Ok(ApiResponse::success(resolution))
        }
        other => Err(AppError::invalid_request(format!(
            "Unknown confirmation action: {}",
            other
        ))),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CancelResolvePayload {
    pub token: String,
}

async fn resolve_cancel(
    State(state): State<ServerState>,
    Json(payload): Json<CancelResolvePayload>,
) -> AppResult<ApiResponse<TokenResolution>> {
    let resolution = cancel_order_via_token(
        &state,
        TokenFlavor::OrderCancel,
        &payload.token,
        TokenAction::Confirm,
        now_millis(),
    )?;
    Ok(ApiResponse::success(resolution))
}

/// Shared cancel path: verify the order can still be cancelled before
/// burning the single-use token, then flip both.
fn cancel_order_via_token(
    state: &ServerState,
    flavor: TokenFlavor,
    token: &str,
    action: TokenAction,
    now: i64,
) -> AppResult<TokenResolution> {
    let pending = state.tokens.peek(flavor, token, now)?;
    let order = state
        .storage
        .get_order(&pending.request_id)?
        .ok_or_else(|| AppError::request_not_found(&pending.request_id))?;
    if !order.status.is_cancellable() {
        return Err(AppError::new(ErrorCode::StatusNotCancellable)
            .with_detail("status", order.status.as_str()));
    }

    let resolution = state.tokens.resolve(flavor, token, action, now)?;
    apply_order_action(
        &state.storage,
        &resolution.request_id,
        OrderAction::Cancel,
        &HashMap::new(),
        &HashMap::new(),
        Some("cancelled by customer"),
        &state.config.public_base_url,
        now,
    )?;
    Ok(resolution)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuoteResolvePayload {
    pub token: String,
    /// "select" or "accept"
    pub action: String,
    /// 1-based option slot for "select"
    #[serde(default)]
    pub option: Option<usize>,
    #[serde(default)]
    pub metal: Option<String>,
    /// Required to change an existing selection
    #[serde(default)]
    pub confirm: bool,
}

async fn resolve_quote(
    State(state): State<ServerState>,
    Json(payload): Json<QuoteResolvePayload>,
) -> AppResult<ApiResponse<TokenResolution>> {
    let now = now_millis();
    match payload.action.trim().to_lowercase().as_str() {
        "select" => {
            let option = payload
                .option
                .filter(|o| (1..=shared::models::QUOTE_OPTION_SLOTS).contains(o))
                .ok_or_else(|| AppError::new(ErrorCode::InvalidOption))?;
            let resolution = state.tokens.resolve(
                TokenFlavor::QuoteAccept,
                &payload.token,
                TokenAction::Select {
                    option,
                    metal: payload.metal.clone(),
                    confirm: payload.confirm,
                },
                now,
            )?;
            Ok(ApiResponse::success(resolution))
        }
        "accept" => {
            let resolution = state.tokens.resolve(
                TokenFlavor::QuoteAccept,
                &payload.token,
                TokenAction::Accept,
                now,
            )?;

            // The quote moves on once the customer completes acceptance
            if let Some(mut quote) = state.storage.get_quote(&resolution.request_id)? {
                if quote.status.can_transition_to(QuoteStatus::QuoteActioned) {
                    quote.status = QuoteStatus::QuoteActioned;
                    quote.status_updated_at = now;
                    let picked = resolution
                        .selected_option
                        .map(|o| o.to_string())
                        .unwrap_or_default();
                    quote.append_note(
                        &format!("customer accepted quote option {}", picked),
                        now,
                    );
                    quote.append_note(&format!("status → {}", quote.status), now);
                    state.storage.upsert_quote(&quote)?;
                }
            }
            Ok(ApiResponse::success(resolution))
        }
        other => Err(AppError::invalid_request(format!(
            "Unknown quote action: {}",
            other
        ))),
    }
}
