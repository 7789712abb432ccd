//! Checkout error types.

use common::{CartEntryId, ProductId, UserId};
use domain::{ErrorKind, StaleEntry};
use store::StoreError;
use thiserror::Error;

use crate::state::CheckoutState;

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The user's cart has no entries.
    #[error("Cart of user {0} is empty")]
    EmptyCart(UserId),

    /// Some entries cannot be bought, either because the cart was stale when
    /// validated (`Rejected`) or because another checkout won a race for a
    /// product (`PartiallyConflicted`). Nothing remains written either way.
    #[error("{} item(s) are no longer available", items.len())]
    ItemsUnavailable {
        items: Vec<StaleEntry>,
        during: CheckoutState,
    },

    /// Entries were removed from the cart while the checkout held claims on
    /// their products. The listed claims were released and no order exists.
    #[error("Cart changed during checkout: {} entry(ies) were removed", entries.len())]
    CartChanged {
        entries: Vec<CartEntryId>,
        released: Vec<ProductId>,
    },

    /// A durable write failed after products were claimed. The listed claims
    /// were released before this error was returned.
    #[error("Checkout failed: {reason}")]
    CheckoutFailed {
        reason: String,
        released: Vec<ProductId>,
    },

    /// The engine attempted an illegal state transition.
    #[error("Invalid checkout transition: {from} -> {to}")]
    InvalidTransition {
        from: CheckoutState,
        to: CheckoutState,
    },

    /// A store read failed before anything was written.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CheckoutError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckoutError::EmptyCart(_) => ErrorKind::Validation,
            CheckoutError::ItemsUnavailable { .. } | CheckoutError::CartChanged { .. } => {
                ErrorKind::Conflict
            }
            CheckoutError::CheckoutFailed { .. } => ErrorKind::Integrity,
            CheckoutError::InvalidTransition { .. } | CheckoutError::Store(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Returns the terminal state the attempt ended in, if it got that far.
    pub fn final_state(&self) -> Option<CheckoutState> {
        match self {
            CheckoutError::EmptyCart(_) => Some(CheckoutState::Rejected),
            CheckoutError::ItemsUnavailable { during, .. } => Some(*during),
            CheckoutError::CartChanged { .. } => Some(CheckoutState::PartiallyConflicted),
            CheckoutError::CheckoutFailed { .. } => Some(CheckoutState::Failed),
            CheckoutError::InvalidTransition { .. } | CheckoutError::Store(_) => None,
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
