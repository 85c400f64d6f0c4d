//! Checkout Views
//!
//! What the frontend should render after each controller step. Serialized
//! with a `view` tag so the browser can match on it exhaustively.

use serde::{Deserialize, Serialize};

use crate::catalog::{BillingCycle, Plan, PlanId};
use crate::provider::ClientSecret;
use crate::session::SessionId;

/// Plan details shown next to the payment form
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub id: PlanId,
    pub display_name: String,
    pub description: String,
    pub cycle: BillingCycle,
    pub amount_cents: u64,
    pub display_price: String,
}

impl PlanSummary {
    pub fn new(plan: &Plan, cycle: BillingCycle) -> Self {
        Self {
            id: plan.id.clone(),
            display_name: plan.display_name.clone(),
            description: plan.description.clone(),
            cycle,
            amount_cents: plan.amount_for(cycle),
            display_price: plan.display_price(cycle),
        }
    }
}

/// Step the user can retry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryAction {
    CreateIntent,
    ActivateFreePlan,
    CheckStatus,
}

/// Rendered checkout state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum CheckoutView {
    /// Navigate immediately (sign-in, dashboard after free activation)
    Redirect { location: String },

    /// Payment collection form bound to a client secret
    PaymentForm {
        session_id: SessionId,
        publishable_key: String,
        client_secret: ClientSecret,
        return_url: String,
        plan: PlanSummary,
        error: Option<String>,
    },

    /// Plan could not be resolved or sold
    InvalidPlan {
        requested: Option<String>,
        message: String,
        plans_url: String,
    },

    /// Recoverable failure with a retry control
    Retry {
        session_id: SessionId,
        action: RetryAction,
        message: String,
    },

    /// Provider is still processing; account not yet active
    Processing { message: String },

    /// Payment succeeded; redirect after a short delay
    Success {
        message: String,
        redirect_to: String,
        delay_ms: u64,
    },
}

impl CheckoutView {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            CheckoutView::Redirect { .. } => "redirect",
            CheckoutView::PaymentForm { .. } => "payment_form",
            CheckoutView::InvalidPlan { .. } => "invalid_plan",
            CheckoutView::Retry { .. } => "retry",
            CheckoutView::Processing { .. } => "processing",
            CheckoutView::Success { .. } => "success",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_is_tagged() {
        let view = CheckoutView::Processing {
            message: "Your payment is processing.".into(),
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["view"], "processing");
        assert_eq!(view.kind(), "processing");
    }

    #[test]
    fn test_retry_view_round_trips() {
        let view = CheckoutView::Retry {
            session_id: SessionId::from_string("s1"),
            action: RetryAction::CreateIntent,
            message: "Try again".into(),
        };
        let json = serde_json::to_string(&view).unwrap();
        assert!(json.contains("\"action\":\"create_intent\""));
        let back: CheckoutView = serde_json::from_str(&json).unwrap();
        assert_eq!(back, view);
    }
}
