//! Atelier back-office server
//!
//! The back office of a made-to-order jewelry business: it ingests
//! quote/order submissions, prices custom pieces from raw material and
//! labor costs, walks each order through a fulfillment lifecycle, and
//! drives confirmation/cancellation workflows via single-use tokens.
//!
//! # Module structure
//!
//! ```text
//! atelier-server/src/
//! ├── core/          # configuration, state, server, background tasks
//! ├── db/            # embedded redb storage
//! ├── pricing/       # diamond resolver, cost calculator, discounts, options
//! ├── orders/        # order status state machine and admin actions
//! ├── quotes/        # quote lifecycle and option pricing
//! ├── tokens/        # confirmation/cancellation token lifecycle
//! ├── notify/        # mailer and status email scheduler
//! ├── routes/        # HTTP API
//! └── utils/         # logging, time helpers
//! ```

pub mod core;
pub mod db;
pub mod notify;
pub mod orders;
pub mod pricing;
pub mod quotes;
pub mod routes;
pub mod tokens;
pub mod utils;

// Re-export public types
pub use crate::core::{Config, Server, ServerState};
pub use db::BackofficeStorage;
pub use notify::{StatusEmailScheduler, SweepStats};
pub use tokens::TokenService;

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// Prepare the process environment: dotenv, working directory, logging
pub fn setup_environment() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    init_logger_with_file(log_level.as_deref(), log_dir.as_deref());

    Ok(())
}
