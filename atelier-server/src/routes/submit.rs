//! Inbound submission route
//!
//! Accepts website order/quote submissions. Submissions are deduplicated on
//! request id before any side effect, so a double-posted form converges on
//! the first record instead of duplicating it.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, AppResult};
use shared::models::{OrderRecord, QuoteRecord};
use shared::ApiResponse;
use validator::Validate;

use crate::core::ServerState;
use crate::utils::now_millis;

pub fn router() -> Router<ServerState> {
    Router::new().route("/submit", post(submit))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SubmitPayload {
    #[serde(alias = "requestId")]
    pub request_id: String,
    /// "order" or "quote"
    #[serde(default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_url: Option<String>,
    #[serde(default)]
    pub design_code: Option<String>,
    #[serde(default)]
    pub metal: Option<String>,
    #[serde(default)]
    pub metal_weight: Option<String>,
    #[serde(default)]
    pub stone: Option<String>,
    #[serde(default)]
    pub stone_weight: Option<String>,
    #[serde(default)]
    pub diamond_breakdown: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub size_label: Option<String>,
    #[serde(default)]
    pub timeline: Option<String>,
    #[serde(default)]
    pub timeline_adjustment_weeks: Option<String>,

    #[serde(default)]
    pub address_line1: Option<String>,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,

    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub utm_source: Option<String>,
    #[serde(default)]
    pub utm_medium: Option<String>,
    #[serde(default)]
    pub utm_campaign: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResult {
    pub request_id: String,
    pub kind: String,
    /// True when this request id was already stored; no new side effects
    pub duplicate: bool,
}

fn require(fields: &[(&str, &Option<String>)]) -> AppResult<()> {
    let missing: Vec<String> = fields
        .iter()
        .filter(|(_, value)| {
            value
                .as_deref()
                .map(|v| v.trim().is_empty())
                .unwrap_or(true)
        })
        .map(|(name, _)| name.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::missing_fields(missing))
    }
}

pub async fn submit(
    State(state): State<ServerState>,
    Json(payload): Json<SubmitPayload>,
) -> AppResult<ApiResponse<SubmitResult>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let request_id = payload.request_id.trim().to_string();
    if request_id.is_empty() {
        return Err(AppError::missing_fields(vec!["request_id".to_string()]));
    }
    require(&[("name", &payload.name), ("email", &payload.email)])?;

    let kind = payload
        .kind
        .as_deref()
        .unwrap_or("quote")
        .trim()
        .to_lowercase();
    let is_order = match kind.as_str() {
        "order" => true,
        "quote" => false,
        other => {
            return Err(AppError::invalid_request(format!(
                "Unknown submission kind: {}",
                other
            )));
        }
    };

    if is_order {
        require(&[
            ("phone", &payload.phone),
            ("address_line1", &payload.address_line1),
            ("city", &payload.city),
            ("state", &payload.state),
            ("postal_code", &payload.postal_code),
            ("country", &payload.country),
        ])?;
    }

    let now = now_millis();
    let txn = state.storage.begin_write()?;

    // Dedup before any side effect
    if state.storage.check_and_mark_submission(&txn, &request_id)? {
        tracing::info!(request_id = %request_id, "Duplicate submission ignored");
        return Ok(ApiResponse::success(SubmitResult {
            request_id,
            kind,
            duplicate: true,
        }));
    }

    // Shared priceable fields route through the same normalization as edits
    let detail_fields = [
        ("name", &payload.name),
        ("email", &payload.email),
        ("phone", &payload.phone),
        ("product_name", &payload.product_name),
        ("product_url", &payload.product_url),
        ("design_code", &payload.design_code),
        ("metal", &payload.metal),
        ("metal_weight", &payload.metal_weight),
        ("stone", &payload.stone),
        ("stone_weight", &payload.stone_weight),
        ("diamond_breakdown", &payload.diamond_breakdown),
        ("size", &payload.size),
        ("size_label", &payload.size_label),
        ("timeline", &payload.timeline),
        ("timeline_adjustment_weeks", &payload.timeline_adjustment_weeks),
    ];

    if is_order {
        let mut order = OrderRecord::new(&request_id, now);
        for (key, value) in detail_fields {
            if let Some(value) = value {
                order.details.apply_field(key, value)?;
            }
        }
        order.source = payload.source.clone();
        order.address_line1 = payload.address_line1.clone();
        order.address_line2 = payload.address_line2.clone();
        order.city = payload.city.clone();
        order.state = payload.state.clone();
        order.postal_code = payload.postal_code.clone();
        order.country = payload.country.clone();
        order.utm_source = payload.utm_source.clone();
        order.utm_medium = payload.utm_medium.clone();
        order.utm_campaign = payload.utm_campaign.clone();
        order.referrer = payload.referrer.clone();
        order.origin = payload.origin.clone();
        order.append_note("order received", now);
        state.storage.put_order(&txn, &order)?;
    } else {
        let mut quote = QuoteRecord::new(&request_id, now);
        for (key, value) in detail_fields {
            if let Some(value) = value {
                quote.apply_field(key, value)?;
            }
        }
        quote.append_note("quote request received", now);
        state.storage.put_quote(&txn, &quote)?;
    }

    txn.commit().map_err(crate::db::StorageError::from)?;
    tracing::info!(request_id = %request_id, kind = %kind, "Submission stored");

    Ok(ApiResponse::success(SubmitResult {
        request_id,
        kind,
        duplicate: false,
    }))
}
