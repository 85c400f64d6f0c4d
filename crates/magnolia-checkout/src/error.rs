//! Error Types

use thiserror::Error;

use crate::session::CheckoutState;

/// Result type alias for checkout operations
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Checkout error types
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// Missing or invalid configuration (fatal at boot)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested plan is not in the catalog or cannot be sold
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    /// No identity attached to the request
    #[error("Authentication required")]
    AuthRequired,

    /// Creating the payment intent failed
    #[error("Payment intent creation failed: {0}")]
    IntentCreation(String),

    /// Payment provider call failed (retrieve, network, API)
    #[error("Payment provider error: {0}")]
    Provider(String),

    /// Free plan activation failed
    #[error("Plan activation failed: {0}")]
    Activation(String),

    /// Provider reported a status outside the known set
    #[error("Unknown payment status: {0}")]
    UnknownStatus(String),

    /// Return parameters point at an intent this session did not create
    #[error("Payment intent {0} does not belong to this checkout")]
    IntentMismatch(String),

    /// Session not found in the store
    #[error("Checkout session not found: {0}")]
    SessionNotFound(String),

    /// State machine edge not allowed
    #[error("Invalid checkout transition: {from:?} -> {to:?}")]
    InvalidTransition { from: CheckoutState, to: CheckoutState },

    /// Session storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CheckoutError {
    /// Check if the user can retry the failed step
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::IntentCreation(_)
                | CheckoutError::Provider(_)
                | CheckoutError::Activation(_)
                | CheckoutError::UnknownStatus(_)
                | CheckoutError::Storage(_)
        )
    }

    /// Convert to a user-friendly message.
    ///
    /// Never includes provider internals.
    pub fn user_message(&self) -> String {
        match self {
            CheckoutError::Config(_) => "Checkout is not available right now.".into(),
            CheckoutError::InvalidPlan(_) => {
                "We couldn't find that plan. Please choose a plan to continue.".into()
            }
            CheckoutError::AuthRequired => "Please sign in to continue.".into(),
            CheckoutError::IntentCreation(_) | CheckoutError::Provider(_) => {
                "We couldn't reach our payment processor. Please try again.".into()
            }
            CheckoutError::Activation(_) => {
                "We couldn't activate your plan. Please try again.".into()
            }
            CheckoutError::UnknownStatus(_) => {
                "Something went wrong with your payment. Please try again.".into()
            }
            CheckoutError::SessionNotFound(_) => {
                "Your checkout session has expired. Please start again.".into()
            }
            _ => "An unexpected error occurred.".into(),
        }
    }
}
