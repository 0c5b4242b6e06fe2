//! Discount resolution
//!
//! Precedence: explicit "none" → zero; "custom" with a positive override;
//! a named preset from the cost chart; otherwise automatic: the highest of
//! all positive presets, labels joined on ties. The applied percent is
//! always capped by `max_discount_pct`.

use super::settings::{normalize_percent, CostValues};
use serde::Serialize;
use shared::models::{DiscountType, RequestDetails};

/// Cost-chart preset keys, paired with their human labels
const PRESETS: &[(DiscountType, &str, &str)] = &[
    (
        DiscountType::FriendsFamily,
        "friends & family",
        "discount_friends_family_pct",
    ),
    (DiscountType::Welcome, "welcome", "discount_welcome_pct"),
    (DiscountType::OfferCode, "offer code", "discount_offer_code_pct"),
];

/// Resolved discount, carried alongside the computed price
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DiscountDetails {
    /// Fraction actually applied (post-cap)
    pub applied_percent: f64,
    /// Fraction before the cap
    pub raw_percent: f64,
    /// Label(s) of the winning preset, "custom", or "none"
    pub label: String,
    /// Human-readable summary for the admin UI and audit notes
    pub summary: String,
    /// Whether the cap reduced the raw percent
    pub capped: bool,
}

impl DiscountDetails {
    pub fn none() -> Self {
        Self {
            applied_percent: 0.0,
            raw_percent: 0.0,
            label: "none".to_string(),
            summary: "none".to_string(),
            capped: false,
        }
    }
}

/// Resolve the discount for a record against the cost chart.
pub fn resolve_discount(details: &RequestDetails, costs: &CostValues) -> DiscountDetails {
    let selection = details.quote_discount_type.unwrap_or_default();

    let (label, raw) = match selection {
        DiscountType::None => return DiscountDetails::none(),
        DiscountType::Custom => {
            let override_pct = details
                .quote_discount_percent
                .map(normalize_percent)
                .filter(|p| *p > 0.0);
            match override_pct {
                Some(pct) => ("custom".to_string(), pct),
                None => return DiscountDetails::none(),
            }
        }
        DiscountType::FriendsFamily | DiscountType::Welcome | DiscountType::OfferCode => {
            match PRESETS.iter().find(|(kind, _, _)| *kind == selection) {
                Some((_, label, key)) => {
                    let pct = costs.percent(key);
                    if pct <= 0.0 {
                        return DiscountDetails::none();
                    }
                    (label.to_string(), pct)
                }
                None => return DiscountDetails::none(),
            }
        }
        DiscountType::Auto => {
            let mut best: f64 = 0.0;
            let mut labels: Vec<&str> = Vec::new();
            for (_, label, key) in PRESETS {
                let pct = costs.percent(key);
                if pct <= 0.0 {
                    continue;
                }
                if pct > best {
                    best = pct;
                    labels = vec![label];
                } else if (pct - best).abs() < 1e-9 {
                    labels.push(label);
                }
            }
            if best <= 0.0 {
                return DiscountDetails::none();
            }
            (labels.join(" / "), best)
        }
    };

    let cap = costs.percent("max_discount_pct");
    let (applied, capped) = if cap > 0.0 && raw > cap {
        (cap, true)
    } else {
        (raw, false)
    };

    let mut summary = format!("{} {:.0}%", label, applied * 100.0);
    if capped {
        summary.push_str(" (capped)");
    }

    DiscountDetails {
        applied_percent: applied,
        raw_percent: raw,
        label,
        summary,
        capped,
    }
}
