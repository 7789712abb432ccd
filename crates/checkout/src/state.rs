//! Checkout state machine.

use serde::{Deserialize, Serialize};

/// The state of a checkout attempt.
///
/// State transitions:
/// ```text
/// Initiated ──► Validating ──┬──► Rejected
///     │                      └──► Reserving ──┬──► Committed
///     └──► Rejected                           ├──► PartiallyConflicted
///                                             └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CheckoutState {
    /// The cart is being loaded.
    #[default]
    Initiated,

    /// Every cart entry is being checked against the catalog.
    Validating,

    /// The cart was empty or held stale entries. Nothing was written (terminal state).
    Rejected,

    /// Products are being claimed one by one.
    Reserving,

    /// A claim lost a race; earlier claims were released (terminal state).
    PartiallyConflicted,

    /// The order was recorded and the cart consumed (terminal state).
    Committed,

    /// Recording the order failed; claims were released (terminal state).
    Failed,
}

impl CheckoutState {
    /// Returns true if the attempt may move from this state to `next`.
    pub fn can_transition_to(&self, next: CheckoutState) -> bool {
        use CheckoutState::*;
        matches!(
            (self, next),
            (Initiated, Validating)
                | (Initiated, Rejected)
                | (Validating, Rejected)
                | (Validating, Reserving)
                | (Reserving, PartiallyConflicted)
                | (Reserving, Committed)
                | (Reserving, Failed)
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckoutState::Rejected
                | CheckoutState::PartiallyConflicted
                | CheckoutState::Committed
                | CheckoutState::Failed
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::Initiated => "Initiated",
            CheckoutState::Validating => "Validating",
            CheckoutState::Rejected => "Rejected",
            CheckoutState::Reserving => "Reserving",
            CheckoutState::PartiallyConflicted => "PartiallyConflicted",
            CheckoutState::Committed => "Committed",
            CheckoutState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
