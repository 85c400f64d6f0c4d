//! Payment Form State
//!
//! Local state of the payment collection form: the last error message and a
//! `submitting` flag that only drives the disabled/spinner UI. Neither is used
//! for flow decisions.

use serde::{Deserialize, Serialize};

use crate::provider::ClientSecret;

const GENERIC_CONFIRM_ERROR: &str = "An unexpected error occurred. Please try again.";
const FALLBACK_INPUT_ERROR: &str = "Please check your payment details and try again.";

/// Provider error category for a failed confirmation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmErrorKind {
    /// Card was declined or rejected
    CardError,
    /// Input failed provider-side validation
    ValidationError,
    /// Anything else
    Other,
}

impl ConfirmErrorKind {
    /// Map the provider's error `type` field
    pub fn from_provider(kind: &str) -> Self {
        match kind {
            "card_error" => ConfirmErrorKind::CardError,
            "validation_error" => ConfirmErrorKind::ValidationError,
            _ => ConfirmErrorKind::Other,
        }
    }
}

/// Failed confirmation reported by the provider SDK
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmError {
    pub kind: ConfirmErrorKind,
    /// Provider's human-readable message, if any
    pub message: Option<String>,
}

impl ConfirmError {
    pub fn new(kind: ConfirmErrorKind, message: Option<String>) -> Self {
        Self { kind, message }
    }

    /// Message shown inline on the form.
    ///
    /// Input problems show the provider message so the user knows what to
    /// fix; everything else gets a generic message.
    pub fn user_message(&self) -> String {
        match self.kind {
            ConfirmErrorKind::CardError | ConfirmErrorKind::ValidationError => self
                .message
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| FALLBACK_INPUT_ERROR.into()),
            ConfirmErrorKind::Other => GENERIC_CONFIRM_ERROR.into(),
        }
    }
}

/// Successful confirmation call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Provider is navigating to the return URL
    Redirecting,
    /// Provider resolved without a redirect; raw intent status attached
    Completed { status: String },
}

/// Arguments for the provider's confirm call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmRequest {
    pub client_secret: ClientSecret,
    pub return_url: String,
}

/// Payment form state
#[derive(Clone, Debug)]
pub struct PaymentForm {
    client_secret: ClientSecret,
    return_url: String,
    submitting: bool,
    error: Option<String>,
}

impl PaymentForm {
    /// A form can only exist once a client secret has been issued
    pub fn new(client_secret: ClientSecret, return_url: impl Into<String>) -> Self {
        Self {
            client_secret,
            return_url: return_url.into(),
            submitting: false,
            error: None,
        }
    }

    /// Start with an error already shown (e.g. after `requires_payment_method`)
    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }

    pub fn client_secret(&self) -> &ClientSecret {
        &self.client_secret
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn can_submit(&self) -> bool {
        !self.submitting
    }

    /// Begin a submission. Returns `None` if one is already in flight.
    pub fn begin_submit(&mut self) -> Option<ConfirmRequest> {
        if self.submitting {
            return None;
        }
        self.submitting = true;
        self.error = None;
        Some(ConfirmRequest {
            client_secret: self.client_secret.clone(),
            return_url: self.return_url.clone(),
        })
    }

    /// Record the result of the confirm call
    pub fn finish(
        &mut self,
        result: Result<ConfirmOutcome, ConfirmError>,
    ) -> Option<ConfirmOutcome> {
        match result {
            Ok(ConfirmOutcome::Redirecting) => Some(ConfirmOutcome::Redirecting),
            Ok(outcome) => {
                self.submitting = false;
                Some(outcome)
            }
            Err(err) => {
                tracing::debug!(kind = ?err.kind, "Payment confirmation failed");
                self.submitting = false;
                self.error = Some(err.user_message());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> PaymentForm {
        PaymentForm::new(
            ClientSecret::new("pi_1_secret_1"),
            "https://example.test/checkout/complete",
        )
    }

    #[test]
    fn test_single_submission_in_flight() {
        let mut form = form();
        let request = form.begin_submit().unwrap();
        assert_eq!(request.client_secret.as_str(), "pi_1_secret_1");
        assert!(form.is_submitting());
        assert!(form.begin_submit().is_none());
    }

    #[test]
    fn test_card_error_shows_provider_message() {
        let mut form = form();
        form.begin_submit();
        let outcome = form.finish(Err(ConfirmError::new(
            ConfirmErrorKind::CardError,
            Some("Your card was declined.".into()),
        )));
        assert!(outcome.is_none());
        assert!(form.can_submit());
        assert_eq!(form.error(), Some("Your card was declined."));
    }

    #[test]
    fn test_unexpected_error_is_generic() {
        let mut form = form();
        form.begin_submit();
        form.finish(Err(ConfirmError::new(
            ConfirmErrorKind::Other,
            Some("internal: rate limiter exploded".into()),
        )));
        assert_eq!(form.error(), Some(GENERIC_CONFIRM_ERROR));
    }

    #[test]
    fn test_new_error_replaces_previous() {
        let mut form = form().with_error(Some("Your card was declined.".into()));
        form.begin_submit();
        assert!(form.error().is_none());
        form.finish(Err(ConfirmError::new(
            ConfirmErrorKind::ValidationError,
            Some("Your card number is incomplete.".into()),
        )));
        assert_eq!(form.error(), Some("Your card number is incomplete."));
    }

    #[test]
    fn test_redirect_keeps_form_disabled() {
        let mut form = form();
        form.begin_submit();
        let outcome = form.finish(Ok(ConfirmOutcome::Redirecting));
        assert_eq!(outcome, Some(ConfirmOutcome::Redirecting));
        assert!(form.is_submitting());
    }

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            ConfirmErrorKind::from_provider("card_error"),
            ConfirmErrorKind::CardError
        );
        assert_eq!(
            ConfirmErrorKind::from_provider("api_error"),
            ConfirmErrorKind::Other
        );
    }
}
