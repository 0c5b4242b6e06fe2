//! Pricing engine
//!
//! - **settings**: cost chart loading, percent normalization, metal cost
//!   resolution
//! - **diamond**: tiered, fallback-aware price band matching
//! - **calculator**: the additive/multiplicative cost formula
//! - **discount**: preset/override resolution with capping
//! - **options**: quote option slots across metal variants
//!
//! All computations are pure over the loaded reference data; charts are
//! read once per computation and never mutated here.

pub mod calculator;
pub mod diamond;
pub mod discount;
pub mod options;
pub mod settings;

pub use calculator::{compute_option_price, PriceBreakdown, PriceQuote};
pub use diamond::resolve_price_per_ct;
pub use discount::{resolve_discount, DiscountDetails};
pub use options::{compute_quote_option_prices, QuoteComputation};
pub use settings::CostValues;
