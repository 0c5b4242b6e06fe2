//! Confirmation/cancellation token lifecycle

pub mod lifecycle;

pub use lifecycle::{IssuedToken, TokenAction, TokenResolution, TokenService};
