//! Pricing reference data: cost settings, diamond price bands, clarity
//! groups, metal variants, and discount selection

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One row of the cost chart: a named numeric or percentage setting
///
/// Values are stored as entered by the operator; percent normalization
/// (0.18 vs 18) happens when the chart is loaded into the calculator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostSettingRow {
    pub key: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One diamond price band: price per carat for a clarity/color/weight range
///
/// Clarity and color may be wildcards (empty / `ANY` / `ALL`); a missing
/// `weight_max` means the band is open-ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiamondPriceEntry {
    #[serde(default)]
    pub clarity: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub weight_min: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_max: Option<f64>,
    pub price_per_ct: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl DiamondPriceEntry {
    /// Whether the band's weight range contains the given stone weight
    pub fn contains_weight(&self, weight: f64) -> bool {
        weight >= self.weight_min && self.weight_max.map(|max| weight <= max).unwrap_or(true)
    }

    /// Width of the weight range; open-ended bands read as infinite
    pub fn range_width(&self) -> f64 {
        self.weight_max
            .map(|max| max - self.weight_min)
            .unwrap_or(f64::INFINITY)
    }

    /// Absolute distance from the stone weight to the nearest range edge
    pub fn distance_to(&self, weight: f64) -> f64 {
        if self.contains_weight(weight) {
            0.0
        } else if weight < self.weight_min {
            self.weight_min - weight
        } else {
            // weight is above the (finite) max
            weight - self.weight_max.unwrap_or(f64::INFINITY)
        }
    }
}

/// Mapping between detail clarity grades and the composite grade used for
/// very small stones (< 0.30 ct), e.g. VVS1 → IF-VVS
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClarityGroups {
    #[serde(default)]
    pub groups: HashMap<String, String>,
}

impl ClarityGroups {
    pub fn new(groups: HashMap<String, String>) -> Self {
        Self { groups }
    }

    /// Composite grade for a detail grade, if one is defined
    pub fn composite_for(&self, detail: &str) -> Option<&str> {
        self.groups.get(&detail.trim().to_uppercase()).map(|s| s.as_str())
    }

    /// Whether a clarity token is a composite grade (appears as a group value)
    pub fn is_composite(&self, clarity: &str) -> bool {
        let token = clarity.trim().to_uppercase();
        token.contains('-') || self.groups.values().any(|v| v.eq_ignore_ascii_case(&token))
    }
}

/// Gold fineness (or platinum) of a metal variant
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MetalPurity {
    K14,
    K18,
    K24,
    Platinum,
}

impl MetalPurity {
    /// Cost-chart key fragment, e.g. "18k"
    pub fn key_fragment(&self) -> &'static str {
        match self {
            MetalPurity::K14 => "14k",
            MetalPurity::K18 => "18k",
            MetalPurity::K24 => "24k",
            MetalPurity::Platinum => "platinum",
        }
    }

    /// The next purity down, used as a pricing fallback when the chart has
    /// no row for the requested purity.
    pub fn next_lower(&self) -> Option<MetalPurity> {
        match self {
            MetalPurity::K24 => Some(MetalPurity::K18),
            MetalPurity::K18 => Some(MetalPurity::K14),
            MetalPurity::K14 => None,
            MetalPurity::Platinum => None,
        }
    }
}

/// Color tone of a gold variant
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MetalColor {
    Yellow,
    White,
    Rose,
}

impl MetalColor {
    pub fn key_fragment(&self) -> &'static str {
        match self {
            MetalColor::Yellow => "yellow",
            MetalColor::White => "white",
            MetalColor::Rose => "rose",
        }
    }
}

/// A parsed metal label: purity plus optional color tone
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MetalVariant {
    pub purity: MetalPurity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<MetalColor>,
}

impl MetalVariant {
    /// Parse a free-text metal label like "18K Yellow Gold" or "Platinum".
    pub fn parse(raw: &str) -> Option<MetalVariant> {
        let lower = raw.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        let purity = if lower.contains("platinum") {
            MetalPurity::Platinum
        } else if lower.contains("24k") || lower.contains("24 k") {
            MetalPurity::K24
        } else if lower.contains("18k") || lower.contains("18 k") {
            MetalPurity::K18
        } else if lower.contains("14k") || lower.contains("14 k") {
            MetalPurity::K14
        } else {
            return None;
        };
        let color = if lower.contains("white") {
            Some(MetalColor::White)
        } else if lower.contains("rose") {
            Some(MetalColor::Rose)
        } else if lower.contains("yellow") {
            Some(MetalColor::Yellow)
        } else {
            None
        };
        Some(MetalVariant { purity, color })
    }

    /// Cost-chart keys to try, most specific first:
    /// purity+color → purity → next purity down → generic gold per gram.
    pub fn price_key_candidates(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if let Some(color) = self.color {
            keys.push(format!(
                "price_gram_{}_{}",
                self.purity.key_fragment(),
                color.key_fragment()
            ));
        }
        keys.push(format!("price_gram_{}", self.purity.key_fragment()));
        let mut lower = self.purity.next_lower();
        while let Some(purity) = lower {
            keys.push(format!("price_gram_{}", purity.key_fragment()));
            lower = purity.next_lower();
        }
        keys.push("price_gram_gold".to_string());
        keys
    }
}

/// Discount selection on a quote/order record
///
/// An absent value means automatic: the highest positive preset applies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// No discount at all
    None,
    /// Operator-entered override percent
    Custom,
    /// Friends & family preset from the cost chart
    FriendsFamily,
    /// Welcome preset from the cost chart
    Welcome,
    /// Offer-code preset from the cost chart
    OfferCode,
    /// Highest positive preset wins
    #[default]
    Auto,
}

impl DiscountType {
    pub fn parse(raw: &str) -> DiscountType {
        match raw.trim().to_lowercase().as_str() {
            "none" => DiscountType::None,
            "custom" => DiscountType::Custom,
            "friends_family" | "friends&family" | "friends and family" => {
                DiscountType::FriendsFamily
            }
            "welcome" => DiscountType::Welcome,
            "offer_code" | "offer code" => DiscountType::OfferCode,
            _ => DiscountType::Auto,
        }
    }
}
