//! Domain models for the atelier back-office
//!
//! All records serialize as opaque JSON. Optional fields are explicit
//! `Option`s; the empty-string-means-unset convention of the legacy admin
//! sheet is translated at the ingestion boundary, never inside the core.

pub mod order;
pub mod pricing;
pub mod quote;
pub mod request;
pub mod status_email;
pub mod token;

pub use order::{OrderDetailsRecord, OrderRecord, OrderStatus, REQUIRED_SHIPPING_FIELDS};
pub use pricing::{
    ClarityGroups, CostSettingRow, DiamondPriceEntry, DiscountType, MetalColor, MetalPurity,
    MetalVariant,
};
pub use quote::{QuoteOption, QuoteRecord, QuoteStatus, QUOTE_OPTION_SLOTS};
pub use request::{RequestDetails, Timeline};
pub use status_email::StatusEmailRecord;
pub use token::{ConfirmationToken, FieldChange, TokenFlavor, TokenStatus};
