//! Cost chart loading and normalization
//!
//! The cost chart is a list of named numeric settings maintained by the
//! operator. Percent-like values may be entered either as fractions (0.18)
//! or whole percents (18); anything with magnitude above 1 is divided by
//! 100 when read through [`CostValues::percent`].

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{CostSettingRow, MetalVariant};
use std::collections::HashMap;

/// Parsed cost chart, loaded once per computation and never mutated
#[derive(Debug, Clone, Default)]
pub struct CostValues {
    values: HashMap<String, f64>,
}

impl CostValues {
    pub fn from_rows(rows: &[CostSettingRow]) -> Self {
        let mut values = HashMap::new();
        for row in rows {
            let key = row.key.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            match row.value.trim().parse::<f64>() {
                Ok(value) => {
                    values.insert(key, value);
                }
                Err(_) => {
                    tracing::warn!(key = %row.key, value = %row.value, "Unparseable cost setting ignored");
                }
            }
        }
        Self { values }
    }

    /// Build directly from key/value pairs (tests, fixtures)
    pub fn from_pairs(pairs: &[(&str, f64)]) -> Self {
        Self {
            values: pairs
                .iter()
                .map(|(k, v)| (k.to_lowercase(), *v))
                .collect(),
        }
    }

    /// Raw numeric value
    pub fn amount(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Raw numeric value, defaulting to zero
    pub fn amount_or_zero(&self, key: &str) -> f64 {
        self.amount(key).unwrap_or(0.0)
    }

    /// Percent-like value normalized to a fraction; missing reads as zero
    pub fn percent(&self, key: &str) -> f64 {
        self.percent_or(key, 0.0)
    }

    /// Percent-like value normalized to a fraction, with a default
    pub fn percent_or(&self, key: &str, default: f64) -> f64 {
        let raw = match self.amount(key) {
            Some(value) => value,
            None => return default,
        };
        normalize_percent(raw)
    }

    /// Cost per gram for a metal variant, resolved through the priority
    /// key list (purity+color → purity → next purity down → generic gold).
    ///
    /// Fails with `missing_metal_cost` if no candidate resolves to a
    /// positive number; a zero row must never silently price metal at zero.
    pub fn metal_cost_per_gram(&self, metal: &MetalVariant) -> AppResult<f64> {
        let candidates = metal.price_key_candidates();
        for key in &candidates {
            if let Some(value) = self.amount(key)
                && value > 0.0
            {
                return Ok(value);
            }
        }
        Err(
            AppError::with_message(
                ErrorCode::MissingMetalCost,
                "No positive cost-per-gram configured for the requested metal",
            )
            .with_detail("keys_tried", candidates),
        )
    }
}

/// Normalize a percent-like value: magnitudes above 1 are whole percents.
pub fn normalize_percent(raw: f64) -> f64 {
    if raw.abs() > 1.0 { raw / 100.0 } else { raw }
}
