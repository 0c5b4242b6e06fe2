//! Shared priceable-request fields
//!
//! Orders and quotes carry the same customer/material/timeline core; the
//! pricing engine consumes this struct regardless of which record kind it
//! came from.

use super::pricing::DiscountType;
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Production timeline selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Timeline {
    /// Standard production schedule
    #[default]
    Standard,
    /// Expedited production, priced with the rush fee
    Rush,
}

impl Timeline {
    /// Normalize a free-text timeline value. Unknown values read as standard.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("rush") {
            Timeline::Rush
        } else {
            Timeline::Standard
        }
    }
}

/// Customer/material/timeline core shared by orders and quotes
///
/// Flattened into [`super::OrderRecord`] and [`super::QuoteRecord`].
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RequestDetails {
    // === Contact ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    // === Product ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design_code: Option<String>,

    // === Material ===
    /// Raw metal label, e.g. "18K Yellow Gold" (parsed at the pricing boundary)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metal: Option<String>,
    /// Declared metal weight in grams
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metal_weight: Option<f64>,
    /// Manual weight adjustment in grams (signed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metal_weight_adjustment: Option<f64>,
    /// Stone kind label, e.g. "Lab Grown Diamond" / "Natural Diamond"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stone: Option<String>,
    /// Flat total stone weight in carats (fallback when no breakdown given)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stone_weight: Option<f64>,
    /// Itemized stone lines: "0.50 x 2, 0.02 x 10 lab"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diamond_breakdown: Option<String>,

    // === Sizing ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_label: Option<String>,
    /// Ring size (US scale)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_ring: Option<f64>,
    /// Bracelet/wrist length in cm
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_wrist: Option<f64>,
    /// Chain/neck length in cm
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_chain: Option<f64>,

    // === Timeline ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Timeline>,
    /// Extra production weeks beyond the standard schedule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline_adjustment_weeks: Option<f64>,

    // === Discount ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_discount_type: Option<DiscountType>,
    /// Override percent, only honored for the custom discount type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_discount_percent: Option<f64>,

    /// Last computed price in whole currency units
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
}

impl RequestDetails {
    /// Whether the request has any diamond content at all
    ///
    /// Gold-only requests price slot 1 without a stone term.
    pub fn has_diamond_content(&self) -> bool {
        if self.stone_weight.map(|w| w > 0.0).unwrap_or(false) {
            return true;
        }
        self.diamond_breakdown
            .as_deref()
            .map(|b| !b.trim().is_empty())
            .unwrap_or(false)
    }

    /// Apply one admin edit field, normalizing the raw string value.
    ///
    /// Unknown keys are rejected so loose frontend payloads cannot smuggle
    /// arbitrary data into the record. Empty values clear the field.
    pub fn apply_field(&mut self, key: &str, raw: &str) -> AppResult<()> {
        let value = raw.trim();
        match key {
            "name" => self.name = non_empty(value),
            "email" => self.email = non_empty(value),
            "phone" => self.phone = non_empty(value),
            "product_name" => self.product_name = non_empty(value),
            "product_url" => self.product_url = non_empty(value),
            "design_code" => self.design_code = non_empty(value),
            "metal" => self.metal = non_empty(value),
            "metal_weight" => self.metal_weight = parse_number(key, value)?,
            "metal_weight_adjustment" => self.metal_weight_adjustment = parse_number(key, value)?,
            "stone" => self.stone = non_empty(value),
            "stone_weight" => self.stone_weight = parse_number(key, value)?,
            "diamond_breakdown" => self.diamond_breakdown = non_empty(value),
            "size" => self.size = non_empty(value),
            "size_label" => self.size_label = non_empty(value),
            "size_ring" => self.size_ring = parse_number(key, value)?,
            "size_wrist" | "size_bracelet" => self.size_wrist = parse_number(key, value)?,
            "size_chain" | "size_neck" => self.size_chain = parse_number(key, value)?,
            "timeline" => self.timeline = non_empty(value).map(|v| Timeline::parse(&v)),
            "timeline_adjustment_weeks" => {
                self.timeline_adjustment_weeks = parse_number(key, value)?
            }
            "quote_discount_type" => {
                self.quote_discount_type = non_empty(value).map(|v| DiscountType::parse(&v))
            }
            "quote_discount_percent" => self.quote_discount_percent = parse_number(key, value)?,
            "price" => {
                self.price = parse_number(key, value)?.map(|p: f64| p.round() as i64);
            }
            other => {
                return Err(AppError::invalid_request(format!(
                    "Unknown edit field: {}",
                    other
                )));
            }
        }
        Ok(())
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_number(key: &str, value: &str) -> AppResult<Option<f64>> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<f64>()
        .map(Some)
        .map_err(|_| AppError::validation(format!("Invalid number for {}: {}", key, value)))
}
