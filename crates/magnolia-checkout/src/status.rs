//! Payment Status
//!
//! Maps raw provider status strings onto the checkout's status set and
//! decides what each one means for the flow.

use serde::{Deserialize, Serialize};

/// Payment status as reported by the provider
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Succeeded,
    RequiresPaymentMethod,
    Failed,
    Canceled,
}

impl PaymentStatus {
    /// Map a provider status string. Returns `None` for anything unrecognised.
    pub fn from_provider(raw: &str) -> Option<Self> {
        match raw {
            "succeeded" => Some(PaymentStatus::Succeeded),
            "processing" => Some(PaymentStatus::Processing),
            "requires_payment_method" => Some(PaymentStatus::RequiresPaymentMethod),
            "requires_confirmation" | "requires_action" | "requires_capture" | "pending" => {
                Some(PaymentStatus::Pending)
            }
            "canceled" => Some(PaymentStatus::Canceled),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::RequiresPaymentMethod => "requires_payment_method",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Canceled => "canceled",
        }
    }

    /// No further client action changes the outcome
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Succeeded | PaymentStatus::Canceled)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the controller should do with a returned status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusOutcome {
    /// Show success, redirect to the dashboard
    Succeeded,
    /// Tell the user the payment is processing, no redirect
    Processing,
    /// Keep the form up and ask for another payment method
    RetryPaymentMethod,
    /// Generic retriable failure
    Failed,
}

/// Interpret a mapped status. Unknown statuses never count as success.
pub fn interpret(status: Option<PaymentStatus>) -> StatusOutcome {
    match status {
        Some(PaymentStatus::Succeeded) => StatusOutcome::Succeeded,
        Some(PaymentStatus::Processing) => StatusOutcome::Processing,
        Some(PaymentStatus::RequiresPaymentMethod) => StatusOutcome::RetryPaymentMethod,
        Some(PaymentStatus::Pending | PaymentStatus::Failed | PaymentStatus::Canceled) | None => {
            StatusOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_mapping() {
        assert_eq!(
            PaymentStatus::from_provider("succeeded"),
            Some(PaymentStatus::Succeeded)
        );
        assert_eq!(
            PaymentStatus::from_provider("requires_action"),
            Some(PaymentStatus::Pending)
        );
        assert_eq!(PaymentStatus::from_provider("exploded"), None);
    }

    #[test]
    fn test_interpretation() {
        assert_eq!(interpret(Some(PaymentStatus::Succeeded)), StatusOutcome::Succeeded);
        assert_eq!(interpret(Some(PaymentStatus::Processing)), StatusOutcome::Processing);
        assert_eq!(
            interpret(Some(PaymentStatus::RequiresPaymentMethod)),
            StatusOutcome::RetryPaymentMethod
        );
        assert_eq!(interpret(Some(PaymentStatus::Canceled)), StatusOutcome::Failed);
        assert_eq!(interpret(None), StatusOutcome::Failed);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(PaymentStatus::Succeeded.is_terminal());
        assert!(PaymentStatus::Canceled.is_terminal());
        assert!(!PaymentStatus::Processing.is_terminal());
        assert!(!PaymentStatus::RequiresPaymentMethod.is_terminal());
    }
}
