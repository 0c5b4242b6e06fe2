//! Quote option builder
//!
//! Prices up to three clarity/color alternatives across every requested
//! metal variant. The "compute missing prices" admin action only fills
//! slots without a price unless forced; slot 1 doubles as the gold-only
//! option when the request carries no diamond content.

use super::calculator::compute_option_price;
use super::discount::{resolve_discount, DiscountDetails};
use super::settings::CostValues;
use shared::error::AppResult;
use shared::models::{ClarityGroups, DiamondPriceEntry, QuoteOption, QuoteRecord};
use std::collections::HashMap;

/// Result of pricing a quote's option slots
#[derive(Debug, Clone)]
pub struct QuoteComputation {
    /// Updated option slots (same length and order as the record's)
    pub options: Vec<QuoteOption>,
    /// Discount applied to every computed price
    pub discount: DiscountDetails,
    /// Flat field map for the admin frontend
    /// (`quote_option_1_price_18k` → "2450", ...)
    pub fields: HashMap<String, String>,
}

/// Compute prices for a quote's option slots.
///
/// `force` recomputes slots that already carry a price; otherwise only
/// empty slots are filled (the "compute missing prices" action).
pub fn compute_quote_option_prices(
    quote: &QuoteRecord,
    force: bool,
    costs: &CostValues,
    entries: &[DiamondPriceEntry],
    groups: &ClarityGroups,
) -> AppResult<QuoteComputation> {
    let discount = resolve_discount(&quote.details, costs);
    let gold_only = !quote.details.has_diamond_content();
    let metals = quote.requested_metals();

    let mut options = quote.options.clone();
    let mut fields = HashMap::new();

    for (index, option) in options.iter_mut().enumerate() {
        let active = option.is_active() || (index == 0 && gold_only);
        if !active {
            continue;
        }
        if option.has_price() && !force {
            continue;
        }

        let clarity = option.clarity.clone().unwrap_or_default();
        let color = option.color.clone().unwrap_or_default();

        if metals.is_empty() {
            return Err(shared::error::AppError::with_message(
                shared::error::ErrorCode::InvalidMetal,
                "No metal specified for quote pricing",
            ));
        }

        let mut prices = std::collections::BTreeMap::new();
        for metal in &metals {
            let mut details = quote.details.clone();
            details.metal = Some(metal.clone());
            let result =
                compute_option_price(&details, &clarity, &color, costs, entries, groups, &discount)?;
            prices.insert(metal.clone(), result.price);
        }

        // Baseline: the 18K variant when priced, otherwise the first metal
        let baseline = prices
            .iter()
            .find(|(metal, _)| metal.to_lowercase().contains("18k"))
            .or_else(|| prices.iter().next())
            .map(|(_, price)| *price);

        option.price_18k = baseline;
        option.prices = prices;

        if let Some(price) = baseline {
            fields.insert(
                format!("quote_option_{}_price_18k", index + 1),
                price.to_string(),
            );
        }
    }

    fields.insert("quote_discount_summary".to_string(), discount.summary.clone());

    Ok(QuoteComputation {
        options,
        discount,
        fields,
    })
}
