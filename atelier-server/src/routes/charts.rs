//! Reference chart admin routes: cost chart and diamond price chart upkeep

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use shared::error::{AppError, AppResult};
use shared::models::{CostSettingRow, DiamondPriceEntry};
use shared::ApiResponse;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/cost-chart/action", post(cost_chart_action))
        .route("/diamond-price-chart/action", post(diamond_chart_action))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CostChartPayload {
    /// "edit" upserts, "delete" removes
    pub action: String,
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn cost_chart_action(
    State(state): State<ServerState>,
    Json(payload): Json<CostChartPayload>,
) -> AppResult<ApiResponse<()>> {
    let key = payload.key.trim().to_lowercase();
    if key.is_empty() {
        return Err(AppError::validation("Setting key is required"));
    }
    match payload.action.trim().to_lowercase().as_str() {
        "edit" => {
            let value = payload
                .value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AppError::validation("Setting value is required"))?;
            state.storage.upsert_cost_setting(&CostSettingRow {
                key,
                value: value.to_string(),
                unit: payload.unit,
                notes: payload.notes,
            })?;
        }
        "delete" => {
            state.storage.delete_cost_setting(&key)?;
        }
        other => {
            return Err(AppError::invalid_request(format!(
                "Unknown chart action: {}",
                other
            )));
        }
    }
    Ok(ApiResponse::ok())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiamondChartPayload {
    pub action: String,
    /// Existing row to overwrite or delete; absent on insert
    #[serde(default, alias = "rowNumber")]
    pub row_number: Option<u64>,
    #[serde(default)]
    pub clarity: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub weight_min: Option<f64>,
    #[serde(default)]
    pub weight_max: Option<f64>,
    #[serde(default)]
    pub price_per_ct: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn diamond_chart_action(
    State(state): State<ServerState>,
    Json(payload): Json<DiamondChartPayload>,
) -> AppResult<ApiResponse<serde_json::Value>> {
    match payload.action.trim().to_lowercase().as_str() {
        "edit" => {
            let price = payload
                .price_per_ct
                .filter(|p| *p > 0.0)
                .ok_or_else(|| AppError::validation("price_per_ct must be positive"))?;
            let entry = DiamondPriceEntry {
                clarity: payload.clarity.unwrap_or_default().to_uppercase(),
                color: payload.color.unwrap_or_default().to_uppercase(),
                weight_min: payload.weight_min.unwrap_or(0.0),
                weight_max: payload.weight_max,
                price_per_ct: price,
                notes: payload.notes,
            };
            let row = state.storage.upsert_diamond_entry(payload.row_number, &entry)?;
            Ok(ApiResponse::success(serde_json::json!({ "row_number": row })))
        }
        "delete" => {
            let row = payload
                .row_number
                .ok_or_else(|| AppError::validation("row_number is required for delete"))?;
            state.storage.delete_diamond_entry(row)?;
            Ok(ApiResponse::success(serde_json::json!({ "row_number": row })))
        }
        other => Err(AppError::invalid_request(format!(
            "Unknown chart action: {}",
            other
        ))),
    }
}
