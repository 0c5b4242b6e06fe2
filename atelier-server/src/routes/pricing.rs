//! Pricing estimate route

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use shared::error::AppResult;
use shared::models::RequestDetails;
use shared::ApiResponse;

use crate::core::ServerState;
use crate::pricing::{compute_option_price, resolve_discount, PriceBreakdown};
use crate::quotes::load_pricing_refs;

pub fn router() -> Router<ServerState> {
    Router::new().route("/pricing/estimate", post(estimate))
}

/// Estimate request: the priceable fields plus the option's clarity/color.
/// Values arrive as strings from the admin form and are normalized through
/// the same boundary as record edits.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EstimatePayload {
    #[serde(default)]
    pub metal: Option<String>,
    #[serde(default)]
    pub metal_weight: Option<String>,
    #[serde(default)]
    pub metal_weight_adjustment: Option<String>,
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
    pub size_ring: Option<String>,
    #[serde(default)]
    pub size_bracelet: Option<String>,
    #[serde(default)]
    pub size_wrist: Option<String>,
    #[serde(default)]
    pub size_chain: Option<String>,
    #[serde(default)]
    pub size_neck: Option<String>,
    #[serde(default)]
    pub timeline: Option<String>,
    #[serde(default)]
    pub timeline_adjustment_weeks: Option<String>,
    #[serde(default)]
    pub quote_discount_type: Option<String>,
    #[serde(default)]
    pub quote_discount_percent: Option<String>,
    #[serde(default)]
    pub clarity: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    /// Include the per-term breakdown in the response
    #[serde(default)]
    pub debug: bool,
}

impl EstimatePayload {
    fn into_details(self) -> AppResult<(RequestDetails, String, String, bool)> {
        let mut details = RequestDetails::default();
        let fields = [
            ("metal", &self.metal),
            ("metal_weight", &self.metal_weight),
            ("metal_weight_adjustment", &self.metal_weight_adjustment),
            ("stone", &self.stone),
            ("stone_weight", &self.stone_weight),
            ("diamond_breakdown", &self.diamond_breakdown),
            ("size", &self.size),
            ("size_label", &self.size_label),
            ("size_ring", &self.size_ring),
            ("size_bracelet", &self.size_bracelet),
            ("size_wrist", &self.size_wrist),
            ("size_chain", &self.size_chain),
            ("size_neck", &self.size_neck),
            ("timeline", &self.timeline),
            ("timeline_adjustment_weeks", &self.timeline_adjustment_weeks),
            ("quote_discount_type", &self.quote_discount_type),
            ("quote_discount_percent", &self.quote_discount_percent),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                details.apply_field(key, value)?;
            }
        }
        Ok((
            details,
            self.clarity.unwrap_or_default(),
            self.color.unwrap_or_default(),
            self.debug,
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct EstimateResult {
    pub price: i64,
    pub discount_summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<PriceBreakdown>,
}

pub async fn estimate(
    State(state): State<ServerState>,
    Json(payload): Json<EstimatePayload>,
) -> AppResult<ApiResponse<EstimateResult>> {
    let (details, clarity, color, debug) = payload.into_details()?;
    let (costs, entries, groups) = load_pricing_refs(&state.storage)?;
    let discount = resolve_discount(&details, &costs);
    let quote =
        compute_option_price(&details, &clarity, &color, &costs, &entries, &groups, &discount)?;

    Ok(ApiResponse::success(EstimateResult {
        price: quote.price,
        discount_summary: discount.summary,
        debug: debug.then_some(quote.breakdown),
    }))
}
