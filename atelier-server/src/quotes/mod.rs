//! Quote lifecycle

pub mod actions;

pub use actions::{apply_quote_action, load_pricing_refs, QuoteAction, QuoteActionOutcome};
