//! Cost-based price calculator
//!
//! Turns a request's material/labor/size parameters plus resolved diamond
//! prices into a final quoted price. Uses rust_decimal internally so the
//! same inputs always round to the same whole-currency price.
//!
//! Missing required inputs (metal weight, metal cost, diamond price) are
//! hard failures so the operator fixes reference data instead of the
//! calculator silently pricing a term at zero.

use super::diamond::resolve_price_per_ct;
use super::discount::DiscountDetails;
use super::settings::CostValues;
use rust_decimal::prelude::*;
use serde::Serialize;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{ClarityGroups, DiamondPriceEntry, MetalVariant, RequestDetails, Timeline};

/// Default lab-grown cost ratio relative to natural stones
const DEFAULT_LAB_RATIO: f64 = 0.20;

/// Rounding for breakdown display values (2 decimal places, half-up)
const DISPLAY_PLACES: u32 = 2;

#[inline]
fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

#[inline]
fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DISPLAY_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

/// One stone line: weight per stone, stone count, lab/natural flag
#[derive(Debug, Clone, PartialEq)]
pub struct DiamondPiece {
    pub weight_ct: f64,
    pub count: u32,
    pub lab: bool,
}

/// Parse itemized breakdown lines: `"0.50 x 2, 0.02 x 10 lab"`.
///
/// Pieces without an explicit `lab`/`natural` tag inherit the record's
/// stone kind.
pub fn parse_diamond_breakdown(raw: &str, default_lab: bool) -> AppResult<Vec<DiamondPiece>> {
    let mut pieces = Vec::new();
    for segment in raw.split([',', '\n', ';']) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let lower = segment.to_lowercase();
        let (body, lab) = if let Some(stripped) = lower.strip_suffix("lab") {
            (stripped.trim_end(), true)
        } else if let Some(stripped) = lower.strip_suffix("natural") {
            (stripped.trim_end(), false)
        } else {
            (lower.as_str(), default_lab)
        };

        let (weight, count) = match body.split_once(['x', '*']) {
            Some((weight, count)) => {
                let weight = weight.trim().parse::<f64>();
                let count = count.trim().parse::<u32>();
                match (weight, count) {
                    (Ok(weight), Ok(count)) => (weight, count),
                    _ => {
                        return Err(AppError::validation(format!(
                            "Invalid diamond breakdown line: {}",
                            segment
                        )));
                    }
                }
            }
            // A bare number reads as a single stone of that weight
            None => match body.trim().parse::<f64>() {
                Ok(weight) => (weight, 1),
                Err(_) => {
                    return Err(AppError::validation(format!(
                        "Invalid diamond breakdown line: {}",
                        segment
                    )));
                }
            },
        };

        if weight <= 0.0 || count == 0 {
            continue;
        }
        pieces.push(DiamondPiece {
            weight_ct: weight,
            count,
            lab,
        });
    }
    Ok(pieces)
}

/// Stone pieces for a record: itemized breakdown when present, otherwise
/// the flat stone weight as a single piece. Gold-only records yield none.
pub fn diamond_pieces(details: &RequestDetails) -> AppResult<Vec<DiamondPiece>> {
    let default_lab = details
        .stone
        .as_deref()
        .map(|s| s.to_lowercase().contains("lab"))
        .unwrap_or(false);

    if let Some(breakdown) = details.diamond_breakdown.as_deref()
        && !breakdown.trim().is_empty()
    {
        return parse_diamond_breakdown(breakdown, default_lab);
    }

    match details.stone_weight.filter(|w| *w > 0.0) {
        Some(weight) => Ok(vec![DiamondPiece {
            weight_ct: weight,
            count: 1,
            lab: default_lab,
        }]),
        None => Ok(Vec::new()),
    }
}

/// Size-based metal weight additions, one term per sizing dimension
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SizeAdjustments {
    pub ring_adjustment: f64,
    pub wrist_adjustment: f64,
    pub chain_adjustment: f64,
}

impl SizeAdjustments {
    pub fn total(&self) -> f64 {
        self.ring_adjustment + self.wrist_adjustment + self.chain_adjustment
    }
}

/// Compute size adjustments: `max(0, measured − base) × weight_step` per
/// dimension. Dimensions without a measured value or configured base/step
/// contribute nothing.
pub fn compute_size_adjustments(details: &RequestDetails, costs: &CostValues) -> SizeAdjustments {
    let generic = details
        .size
        .as_deref()
        .and_then(|s| s.trim().parse::<f64>().ok());
    let label = details
        .size_label
        .as_deref()
        .map(|l| l.to_lowercase())
        .unwrap_or_default();

    let measured = |explicit: Option<f64>, label_terms: &[&str]| {
        explicit.or_else(|| {
            if label_terms.iter().any(|term| label.contains(term)) {
                generic
            } else {
                None
            }
        })
    };

    let adjustment = |value: Option<f64>, base_key: &str, step_key: &str| {
        match (value, costs.amount(base_key), costs.amount(step_key)) {
            (Some(measured), Some(base), Some(step)) => (measured - base).max(0.0) * step,
            _ => 0.0,
        }
    };

    SizeAdjustments {
        ring_adjustment: adjustment(
            measured(details.size_ring, &["ring"]),
            "ring_size_base",
            "ring_size_weight_step_g",
        ),
        wrist_adjustment: adjustment(
            measured(details.size_wrist, &["bracelet", "wrist", "bangle"]),
            "wrist_length_base",
            "wrist_weight_step_g",
        ),
        chain_adjustment: adjustment(
            measured(details.size_chain, &["chain", "neck"]),
            "chain_length_base",
            "chain_weight_step_g",
        ),
    }
}

/// Per-term cost breakdown, returned alongside the price for the admin
/// estimate endpoint's debug view
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PriceBreakdown {
    pub effective_metal_weight: f64,
    pub metal_cost: f64,
    pub diamond_cost: f64,
    pub diamond_carats: f64,
    pub piece_count: u32,
    pub material_cost: f64,
    pub labor_cost: f64,
    pub tariff_cost: f64,
    pub shipping_cost: f64,
    pub time_cost: f64,
    pub risk_cost: f64,
    pub rush_fee: f64,
    pub base_cost: f64,
    pub price_with_margin: f64,
    pub discount_percent: f64,
    pub discount_summary: String,
}

/// A computed price in whole currency units plus its term breakdown
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PriceQuote {
    pub price: i64,
    pub breakdown: PriceBreakdown,
}

/// Compute the full price for one clarity/color option of a record.
///
/// Deterministic: identical (record, settings, charts, discount) inputs
/// always produce the same price.
pub fn compute_option_price(
    details: &RequestDetails,
    clarity: &str,
    color: &str,
    costs: &CostValues,
    entries: &[DiamondPriceEntry],
    groups: &ClarityGroups,
    discount: &DiscountDetails,
) -> AppResult<PriceQuote> {
    // 1. Effective metal weight
    let declared = details
        .metal_weight
        .filter(|w| *w > 0.0)
        .ok_or_else(|| AppError::new(ErrorCode::MissingMetalWeight))?;
    let manual = details.metal_weight_adjustment.unwrap_or(0.0);
    let sizes = compute_size_adjustments(details, costs);
    let effective_weight = (declared + manual + sizes.total()).max(0.0);

    // 2. Metal cost
    let metal_label = details.metal.as_deref().unwrap_or_default();
    let metal = MetalVariant::parse(metal_label).ok_or_else(|| {
        AppError::with_message(
            ErrorCode::InvalidMetal,
            format!("Unrecognized metal: {}", metal_label),
        )
    })?;
    let per_gram = costs.metal_cost_per_gram(&metal)?;
    let metal_cost = to_decimal(effective_weight) * to_decimal(per_gram);

    // 3. Diamond pieces
    let lab_ratio = costs.percent_or("lab_diamonds_relative_cost_pct", DEFAULT_LAB_RATIO);
    let pieces = diamond_pieces(details)?;
    let mut diamond_cost = Decimal::ZERO;
    let mut diamond_carats = Decimal::ZERO;
    let mut piece_count = 0u32;
    for piece in &pieces {
        let price_per_ct = resolve_price_per_ct(clarity, color, piece.weight_ct, entries, groups)?;
        let carats = to_decimal(piece.weight_ct) * Decimal::from(piece.count);
        let mut cost = carats * to_decimal(price_per_ct);
        if piece.lab {
            cost *= to_decimal(lab_ratio);
        }
        diamond_cost += cost;
        diamond_carats += carats;
        piece_count += piece.count;
    }

    let material_cost = metal_cost + diamond_cost;

    // 4. Labor
    let labor_base = to_decimal(costs.amount_or_zero("labor_flat"))
        + to_decimal(costs.amount_or_zero("labor_per_gram")) * to_decimal(effective_weight)
        + to_decimal(costs.amount_or_zero("labor_per_ct")) * diamond_carats
        + to_decimal(costs.amount_or_zero("labor_per_piece")) * Decimal::from(piece_count);
    let labor_cost = labor_base * (Decimal::ONE + to_decimal(costs.percent("labor_margin_percent")));

    // 5. Tariff and currency-risk buffer
    let tariff_cost = material_cost * to_decimal(costs.percent("tariff_percent"));
    let risk_cost = (material_cost + labor_cost) * to_decimal(costs.percent("dollar_risk_pct"));

    // 6. Shipping, timeline, rush
    let shipping_cost = to_decimal(costs.amount_or_zero("shipping_cost_usd"));
    let extra_weeks = details.timeline_adjustment_weeks.unwrap_or(0.0).max(0.0);
    let time_cost = to_decimal(costs.amount_or_zero("time_cost_flat"))
        + to_decimal(costs.amount_or_zero("time_cost_per_week")) * to_decimal(extra_weeks);
    let rush_fee = if details.timeline == Some(Timeline::Rush) {
        material_cost * to_decimal(costs.percent("rush_fee_pct"))
            + to_decimal(costs.amount_or_zero("rush_fee_flat"))
    } else {
        Decimal::ZERO
    };

    // 7. Base cost
    let base_cost =
        material_cost + labor_cost + tariff_cost + shipping_cost + time_cost + risk_cost + rush_fee;

    // 8. Margins
    let margin = to_decimal(costs.percent("price_premium_pct"))
        + to_decimal(costs.percent("profit_margin_production_pct"))
        + to_decimal(costs.percent("profit_margin_sales_pct"));
    let price_with_margin = base_cost * (Decimal::ONE + margin);

    // 9. Discount and final rounding
    let final_price = price_with_margin
        * (Decimal::ONE - to_decimal(discount.applied_percent));
    let price = final_price
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| AppError::internal("Price overflow"))?;

    Ok(PriceQuote {
        price,
        breakdown: PriceBreakdown {
            effective_metal_weight: effective_weight,
            metal_cost: to_f64(metal_cost),
            diamond_cost: to_f64(diamond_cost),
            diamond_carats: to_f64(diamond_carats),
            piece_count,
            material_cost: to_f64(material_cost),
            labor_cost: to_f64(labor_cost),
            tariff_cost: to_f64(tariff_cost),
            shipping_cost: to_f64(shipping_cost),
            time_cost: to_f64(time_cost),
            risk_cost: to_f64(risk_cost),
            rush_fee: to_f64(rush_fee),
            base_cost: to_f64(base_cost),
            price_with_margin: to_f64(price_with_margin),
            discount_percent: discount.applied_percent,
            discount_summary: discount.summary.clone(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(clarity: &str, color: &str, min: f64, max: f64, price: f64) -> DiamondPriceEntry {
        DiamondPriceEntry {
            clarity: clarity.to_string(),
            color: color.to_string(),
            weight_min: min,
            weight_max: Some(max),
            price_per_ct: price,
            notes: None,
        }
    }

    fn basic_details() -> RequestDetails {
        RequestDetails {
            metal: Some("18K Yellow Gold".to_string()),
            metal_weight: Some(5.0),
            stone: Some("Natural Diamond".to_string()),
            stone_weight: Some(0.5),
            ..Default::default()
        }
    }

    #[test]
    fn test_bare_material_price() {
        // 5.0 g × 80 + 0.5 ct × 4000 = 2400, no other levers configured
        let costs = CostValues::from_pairs(&[("price_gram_18k", 80.0)]);
        let entries = vec![band("VS1", "F", 0.3, 1.0, 4000.0)];
        let quote = compute_option_price(
            &basic_details(),
            "VS1",
            "F",
            &costs,
            &entries,
            &ClarityGroups::default(),
            &DiscountDetails::none(),
        )
        .unwrap();

        assert_eq!(quote.price, 2400);
        assert_eq!(quote.breakdown.metal_cost, 400.0);
        assert_eq!(quote.breakdown.diamond_cost, 2000.0);
    }

    #[test]
    fn test_deterministic() {
        let costs = CostValues::from_pairs(&[
            ("price_gram_18k", 80.0),
            ("labor_flat", 137.5),
            ("tariff_percent", 7.0),
            ("price_premium_pct", 0.1),
        ]);
        let entries = vec![band("VS1", "F", 0.3, 1.0, 4000.0)];
        let compute = || {
            compute_option_price(
                &basic_details(),
                "VS1",
                "F",
                &costs,
                &entries,
                &ClarityGroups::default(),
                &DiscountDetails::none(),
            )
            .unwrap()
            .price
        };
        let first = compute();
        for _ in 0..10 {
            assert_eq!(compute(), first);
        }
    }

    #[test]
    fn test_breakdown_pieces_with_lab_ratio() {
        // (0.2×10)×1000 + (1.5×2)×2000 = 8000, ×0.2 lab = 1600, + 1 g metal
        let mut details = basic_details();
        details.metal_weight = Some(1.0);
        details.stone = Some("Lab Grown Diamond".to_string());
        details.stone_weight = None;
        details.diamond_breakdown = Some("0.2 x 10, 1.5 x 2".to_string());

        let costs = CostValues::from_pairs(&[
            ("price_gram_18k", 1.0),
            ("lab_diamonds_relative_cost_pct", 0.2),
        ]);
        let entries = vec![
            band("VS1", "F", 0.0, 0.99, 1000.0),
            band("VS1", "F", 1.0, 5.0, 2000.0),
        ];
        let quote = compute_option_price(
            &details,
            "VS1",
            "F",
            &costs,
            &entries,
            &ClarityGroups::default(),
            &DiscountDetails::none(),
        )
        .unwrap();
        assert_eq!(quote.price, 1601);

        // Same stones, natural: no lab multiplier
        details.stone = Some("Natural Diamond".to_string());
        let quote = compute_option_price(
            &details,
            "VS1",
            "F",
            &costs,
            &entries,
            &ClarityGroups::default(),
            &DiscountDetails::none(),
        )
        .unwrap();
        assert_eq!(quote.price, 8001);
    }

    #[test]
    fn test_size_adjustment_feeds_metal_cost() {
        let mut details = basic_details();
        details.stone_weight = None;
        details.size_ring = Some(8.0);

        let costs = CostValues::from_pairs(&[
            ("price_gram_18k", 100.0),
            ("ring_size_base", 6.0),
            ("ring_size_weight_step_g", 0.1),
        ]);
        let quote = compute_option_price(
            &details,
            "",
            "",
            &costs,
            &[],
            &ClarityGroups::default(),
            &DiscountDetails::none(),
        )
        .unwrap();

        // 5.0 + (8 − 6) × 0.1 = 5.2 g
        assert!((quote.breakdown.effective_metal_weight - 5.2).abs() < 1e-9);
        assert_eq!(quote.price, 520);
    }

    #[test]
    fn test_size_below_base_never_subtracts() {
        let details = RequestDetails {
            metal: Some("18K Yellow Gold".to_string()),
            metal_weight: Some(5.0),
            size_ring: Some(4.0),
            ..Default::default()
        };
        let costs = CostValues::from_pairs(&[
            ("price_gram_18k", 100.0),
            ("ring_size_base", 6.0),
            ("ring_size_weight_step_g", 0.1),
        ]);
        let quote = compute_option_price(
            &details,
            "",
            "",
            &costs,
            &[],
            &ClarityGroups::default(),
            &DiscountDetails::none(),
        )
        .unwrap();
        assert!((quote.breakdown.effective_metal_weight - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_generic_size_field_with_label() {
        let details = RequestDetails {
            metal: Some("18K Yellow Gold".to_string()),
            metal_weight: Some(5.0),
            size: Some("7".to_string()),
            size_label: Some("Ring".to_string()),
            ..Default::default()
        };
        let costs = CostValues::from_pairs(&[
            ("price_gram_18k", 100.0),
            ("ring_size_base", 6.0),
            ("ring_size_weight_step_g", 0.1),
        ]);
        let sizes = compute_size_adjustments(&details, &costs);
        assert!((sizes.ring_adjustment - 0.1).abs() < 1e-9);
        assert!((sizes.total() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_full_lever_stack() {
        // Worked example exercising every additive term:
        // metal 10×50=500, diamond 1.5×3000×0.2=900 → material 1400
        // labor (100+2×10+10×1.5)×1.1 = 148.5
        // tariff 1400×0.1 = 140, risk (1400+148.5)×0.02 = 30.97
        // shipping 20, base = 1739.47
        // margin ×(1+0.1+0.2+0.1) = ×1.4 → 2435.258 → 2435
        let details = RequestDetails {
            metal: Some("18K Yellow Gold".to_string()),
            metal_weight: Some(10.0),
            stone: Some("Lab Grown Diamond".to_string()),
            stone_weight: Some(1.5),
            ..Default::default()
        };
        let costs = CostValues::from_pairs(&[
            ("price_gram_18k", 50.0),
            ("labor_flat", 100.0),
            ("labor_per_gram", 2.0),
            ("labor_per_ct", 10.0),
            ("labor_margin_percent", 0.1),
            ("tariff_percent", 0.1),
            ("dollar_risk_pct", 0.02),
            ("shipping_cost_usd", 20.0),
            ("price_premium_pct", 0.1),
            ("profit_margin_production_pct", 0.2),
            ("profit_margin_sales_pct", 0.1),
            ("lab_diamonds_relative_cost_pct", 0.2),
        ]);
        let entries = vec![band("VS1", "F", 0.0, 2.0, 3000.0)];
        let quote = compute_option_price(
            &details,
            "VS1",
            "F",
            &costs,
            &entries,
            &ClarityGroups::default(),
            &DiscountDetails::none(),
        )
        .unwrap();

        assert_eq!(quote.breakdown.material_cost, 1400.0);
        assert_eq!(quote.breakdown.labor_cost, 148.5);
        assert_eq!(quote.breakdown.tariff_cost, 140.0);
        assert_eq!(quote.breakdown.risk_cost, 30.97);
        assert_eq!(quote.price, 2435);
    }

    #[test]
    fn test_rush_fee_only_for_rush_timeline() {
        let mut details = basic_details();
        details.stone_weight = None;
        let costs = CostValues::from_pairs(&[
            ("price_gram_18k", 100.0),
            ("rush_fee_pct", 0.1),
            ("rush_fee_flat", 25.0),
        ]);

        let standard = compute_option_price(
            &details,
            "",
            "",
            &costs,
            &[],
            &ClarityGroups::default(),
            &DiscountDetails::none(),
        )
        .unwrap();
        assert_eq!(standard.breakdown.rush_fee, 0.0);
        assert_eq!(standard.price, 500);

        details.timeline = Some(Timeline::Rush);
        let rush = compute_option_price(
            &details,
            "",
            "",
            &costs,
            &[],
            &ClarityGroups::default(),
            &DiscountDetails::none(),
        )
        .unwrap();
        // 500 + 500×0.1 + 25 = 575
        assert_eq!(rush.breakdown.rush_fee, 75.0);
        assert_eq!(rush.price, 575);
    }

    #[test]
    fn test_missing_metal_weight_is_hard_failure() {
        let mut details = basic_details();
        details.metal_weight = None;
        let costs = CostValues::from_pairs(&[("price_gram_18k", 80.0)]);
        let err = compute_option_price(
            &details,
            "VS1",
            "F",
            &costs,
            &[],
            &ClarityGroups::default(),
            &DiscountDetails::none(),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingMetalWeight);
    }

    #[test]
    fn test_missing_metal_cost_is_hard_failure() {
        let costs = CostValues::from_pairs(&[]);
        let err = compute_option_price(
            &basic_details(),
            "VS1",
            "F",
            &costs,
            &[],
            &ClarityGroups::default(),
            &DiscountDetails::none(),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingMetalCost);
    }

    #[test]
    fn test_missing_diamond_band_aborts() {
        let costs = CostValues::from_pairs(&[("price_gram_18k", 80.0)]);
        let err = compute_option_price(
            &basic_details(),
            "VS1",
            "F",
            &costs,
            &[],
            &ClarityGroups::default(),
            &DiscountDetails::none(),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::DiamondPriceMissing);
    }

    #[test]
    fn test_discount_applies_and_rounds() {
        let costs = CostValues::from_pairs(&[("price_gram_18k", 80.0)]);
        let entries = vec![band("VS1", "F", 0.3, 1.0, 4000.0)];
        let discount = DiscountDetails {
            applied_percent: 0.15,
            raw_percent: 0.15,
            label: "welcome".to_string(),
            summary: "welcome 15%".to_string(),
            capped: false,
        };
        let quote = compute_option_price(
            &basic_details(),
            "VS1",
            "F",
            &costs,
            &entries,
            &ClarityGroups::default(),
            &discount,
        )
        .unwrap();
        // 2400 × 0.85 = 2040
        assert_eq!(quote.price, 2040);
        assert_eq!(quote.breakdown.discount_summary, "welcome 15%");
    }

    #[test]
    fn test_parse_breakdown_lines() {
        let pieces = parse_diamond_breakdown("0.5 x 2, 0.02 x 10 lab\n1.1 natural", false).unwrap();
        assert_eq!(
            pieces,
            vec![
                DiamondPiece { weight_ct: 0.5, count: 2, lab: false },
                DiamondPiece { weight_ct: 0.02, count: 10, lab: true },
                DiamondPiece { weight_ct: 1.1, count: 1, lab: false },
            ]
        );

        assert!(parse_diamond_breakdown("0.5 x two", false).is_err());
        assert!(parse_diamond_breakdown("", true).unwrap().is_empty());
    }
}
