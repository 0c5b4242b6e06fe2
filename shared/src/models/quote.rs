//! Quote record, quote lifecycle, and priced option slots

use super::request::RequestDetails;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of priced alternatives a quote may carry
pub const QUOTE_OPTION_SLOTS: usize = 3;

/// Quote lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteStatus {
    #[default]
    New,
    Acknowledged,
    Quoted,
    QuoteActioned,
    Dropped,
}

impl QuoteStatus {
    /// Statuses reachable from this one
    pub fn allowed_transitions(&self) -> &'static [QuoteStatus] {
        use QuoteStatus::*;
        match self {
            New => &[Acknowledged, Dropped],
            Acknowledged => &[Quoted, Dropped],
            // Quoted → Quoted covers re-sending a refreshed quote link
            Quoted => &[QuoteActioned, Quoted, Dropped],
            QuoteActioned => &[Dropped],
            Dropped => &[],
        }
    }

    pub fn can_transition_to(&self, target: QuoteStatus) -> bool {
        self.allowed_transitions().contains(&target)
    }

    pub fn parse(raw: &str) -> Option<QuoteStatus> {
        use QuoteStatus::*;
        Some(match raw.trim().to_uppercase().as_str() {
            "NEW" | "" => New,
            "ACKNOWLEDGED" => Acknowledged,
            "QUOTED" => Quoted,
            "QUOTE_ACTIONED" => QuoteActioned,
            "DROPPED" => Dropped,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::New => "NEW",
            QuoteStatus::Acknowledged => "ACKNOWLEDGED",
            QuoteStatus::Quoted => "QUOTED",
            QuoteStatus::QuoteActioned => "QUOTE_ACTIONED",
            QuoteStatus::Dropped => "DROPPED",
        }
    }
}

impl std::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One priced clarity/color alternative
///
/// `price_18k` is the baseline; `prices` maps every requested metal variant
/// (e.g. "14K Yellow Gold") to its recomputed price.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct QuoteOption {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Baseline price at 18K in whole currency units
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_18k: Option<i64>,
    /// Metal variant → price
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub prices: BTreeMap<String, i64>,
}

impl QuoteOption {
    /// A slot participates in pricing when it names a stone grade,
    /// or (slot 1 only) when the request is gold-only.
    pub fn is_active(&self) -> bool {
        self.clarity.is_some() || self.color.is_some()
    }

    pub fn has_price(&self) -> bool {
        self.price_18k.is_some()
    }
}

/// A quote request with up to three priced alternatives
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuoteRecord {
    pub request_id: String,
    /// Unix millis of submission
    pub created_at: i64,
    pub status: QuoteStatus,
    /// Unix millis of the last status change
    pub status_updated_at: i64,
    /// Append-only audit trail
    #[serde(default)]
    pub notes: String,

    #[serde(flatten)]
    pub details: RequestDetails,

    /// Comma-separated metal variants to price each option for,
    /// e.g. "18K Yellow Gold, 14K Yellow Gold"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_metal_options: Option<String>,

    /// Fixed-size option slots (always [`QUOTE_OPTION_SLOTS`] long)
    #[serde(default = "default_options")]
    pub options: Vec<QuoteOption>,
}

fn default_options() -> Vec<QuoteOption> {
    vec![QuoteOption::default(); QUOTE_OPTION_SLOTS]
}

impl QuoteRecord {
    pub fn new(request_id: impl Into<String>, now: i64) -> Self {
        Self {
            request_id: request_id.into(),
            created_at: now,
            status: QuoteStatus::New,
            status_updated_at: now,
            notes: String::new(),
            details: RequestDetails::default(),
            quote_metal_options: None,
            options: default_options(),
        }
    }

    /// Metal variants to price options for; defaults to the record's metal.
    pub fn requested_metals(&self) -> Vec<String> {
        let raw = self
            .quote_metal_options
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .or(self.details.metal.as_deref())
            .unwrap_or_default();
        raw.split(',')
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect()
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

    /// Apply one admin edit field, routing quote-only keys locally and
    /// everything else into the shared details.
    pub fn apply_field(&mut self, key: &str, raw: &str) -> crate::error::AppResult<()> {
        let value = raw.trim();
        if key == "quote_metal_options" {
            self.quote_metal_options = if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            };
            return Ok(());
        }
        if let Some((slot, field)) = parse_option_key(key) {
            let option = &mut self.options[slot];
            match field {
                OptionField::Clarity => {
                    option.clarity = if value.is_empty() {
                        None
                    } else {
                        Some(value.to_uppercase())
                    }
                }
                OptionField::Color => {
                    option.color = if value.is_empty() {
                        None
                    } else {
                        Some(value.to_uppercase())
                    }
                }
                OptionField::Price18k => {
                    option.price_18k = if value.is_empty() {
                        None
                    } else {
                        Some(value.parse::<f64>().map_err(|_| {
                            crate::error::AppError::validation(format!(
                                "Invalid price for {}: {}",
                                key, value
                            ))
                        })? as i64)
                    }
                }
            }
            return Ok(());
        }
        self.details.apply_field(key, raw)
    }
}

enum OptionField {
    Clarity,
    Color,
    Price18k,
}

/// Map the flat legacy field names (`quote_option_2_clarity`, ...) onto
/// a (slot index, field) pair.
fn parse_option_key(key: &str) -> Option<(usize, OptionField)> {
    let rest = key.strip_prefix("quote_option_")?;
    let (index, field) = rest.split_once('_')?;
    let slot = index.parse::<usize>().ok()?.checked_sub(1)?;
    if slot >= QUOTE_OPTION_SLOTS {
        return None;
    }
    let field = match field {
        "clarity" => OptionField::Clarity,
        "color" => OptionField::Color,
        "price_18k" => OptionField::Price18k,
        _ => return None,
    };
    Some((slot, field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_flow() {
        use QuoteStatus::*;
        assert!(New.can_transition_to(Acknowledged));
        assert!(Acknowledged.can_transition_to(Quoted));
        assert!(Quoted.can_transition_to(Quoted));
        assert!(Quoted.can_transition_to(QuoteActioned));
        assert!(!QuoteActioned.can_transition_to(Quoted));
        assert!(Dropped.allowed_transitions().is_empty());
    }

    #[test]
    fn test_requested_metals_falls_back_to_record_metal() {
        let mut quote = QuoteRecord::new("HW-2001", 0);
        quote.details.metal = Some("18K Yellow Gold".to_string());
        assert_eq!(quote.requested_metals(), vec!["18K Yellow Gold"]);

        quote.quote_metal_options = Some("18K Yellow Gold, 14K White Gold".to_string());
        assert_eq!(
            quote.requested_metals(),
            vec!["18K Yellow Gold", "14K White Gold"]
        );
    }

    #[test]
    fn test_option_field_routing() {
        let mut quote = QuoteRecord::new("HW-2001", 0);
        quote.apply_field("quote_option_2_clarity", "vs1").unwrap();
        quote.apply_field("quote_option_2_color", "F").unwrap();
        quote.apply_field("quote_option_2_price_18k", "2450").unwrap();

        let option = &quote.options[1];
        assert_eq!(option.clarity.as_deref(), Some("VS1"));
        assert_eq!(option.color.as_deref(), Some("F"));
        assert_eq!(option.price_18k, Some(2450));
        assert!(quote.options[0].clarity.is_none());
    }

    #[test]
    fn test_option_key_out_of_range_falls_through() {
        let mut quote = QuoteRecord::new("HW-2001", 0);
        // Slot 4 does not exist; the unknown key is rejected downstream
        assert!(quote.apply_field("quote_option_4_clarity", "VS1").is_err());
    }

    #[test]
    fn test_shared_fields_route_to_details() {
        let mut quote = QuoteRecord::new("HW-2001", 0);
        quote.apply_field("metal_weight", "4.2").unwrap();
        assert_eq!(quote.details.metal_weight, Some(4.2));
    }
}
