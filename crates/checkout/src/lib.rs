//! Checkout transaction engine for the marketplace.
//!
//! A checkout turns a user's whole cart into one order, or changes nothing.
//! The attempt runs through these steps:
//! 1. Load the cart
//! 2. Validate every entry against the catalog
//! 3. Claim each product with a conditional `mark_sold`
//! 4. Record the order and consume the cart in one ledger transaction
//!
//! If a claim loses a race or the ledger write fails, every claim already
//! made is released in reverse order.

pub mod engine;
pub mod error;
pub mod state;

pub use engine::{CheckoutEngine, CheckoutReceipt};
pub use error::CheckoutError;
pub use state::CheckoutState;
