//! Quote admin routes

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use shared::error::AppResult;
use shared::ApiResponse;
use std::collections::HashMap;

use crate::core::ServerState;
use crate::quotes::{apply_quote_action, QuoteAction, QuoteActionOutcome};
use crate::utils::now_millis;

pub fn router() -> Router<ServerState> {
    Router::new().route("/quotes/action", post(action))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuoteActionPayload {
    #[serde(alias = "requestId")]
    pub request_id: String,
    pub action: String,
    /// `true` forces a full recompute on submit (refresh semantics)
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub fields: HashMap<String, String>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn action(
    State(state): State<ServerState>,
    Json(payload): Json<QuoteActionPayload>,
) -> AppResult<ApiResponse<QuoteActionOutcome>> {
    let mut action = QuoteAction::parse(&payload.action)?;
    if action == QuoteAction::SubmitQuote && payload.force {
        action = QuoteAction::RefreshQuote;
    }
    let outcome = apply_quote_action(
        &state.storage,
        &state.tokens,
        &payload.request_id,
        action,
        &payload.fields,
        payload.notes.as_deref(),
        now_millis(),
    )?;
    Ok(ApiResponse::success(outcome))
}
