//! Stripe Payment Intents
//!
//! Implements [`PaymentProvider`] with Stripe's Payment Intents API. The
//! browser completes payment with Stripe Elements using the client secret
//! returned here.

use async_trait::async_trait;
use magnolia_checkout::provider::{IntentRequest, PaymentIntent, PaymentProvider};
use magnolia_checkout::{ClientSecret, CheckoutError};
use stripe::{
    Client, CreatePaymentIntent, CreatePaymentIntentAutomaticPaymentMethods, Currency,
    PaymentIntent as StripePaymentIntent, PaymentIntentId,
};

use crate::error::{PaymentError, Result};

/// Stripe client wrapper
pub struct StripeProvider {
    client: Client,
}

impl StripeProvider {
    /// Create a new Stripe provider
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
        }
    }
}

/// Map our lowercase currency code onto Stripe's enum
pub(crate) fn stripe_currency(code: &str) -> Result<Currency> {
    match code.to_ascii_lowercase().as_str() {
        "usd" => Ok(Currency::USD),
        "cad" => Ok(Currency::CAD),
        "eur" => Ok(Currency::EUR),
        "gbp" => Ok(Currency::GBP),
        other => Err(PaymentError::Config(format!("unsupported currency '{other}'"))),
    }
}

fn to_intent(intent: StripePaymentIntent) -> Result<PaymentIntent> {
    let client_secret = intent
        .client_secret
        .ok_or_else(|| PaymentError::Stripe("No client secret returned".into()))?;

    Ok(PaymentIntent {
        id: intent.id.to_string(),
        client_secret: ClientSecret::new(client_secret),
        status: intent.status.as_str().to_string(),
        amount_cents: u64::try_from(intent.amount).unwrap_or_default(),
        metadata: intent.metadata,
    })
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn name(&self) -> &str {
        "stripe"
    }

    fn supports_currency(&self, currency: &str) -> bool {
        stripe_currency(currency).is_ok()
    }

    async fn create_payment_intent(
        &self,
        request: &IntentRequest,
    ) -> magnolia_checkout::Result<PaymentIntent> {
        let amount = i64::try_from(request.amount_cents)
            .map_err(|_| CheckoutError::IntentCreation("amount out of range".into()))?;
        let currency = stripe_currency(&request.currency)?;

        let mut params = CreatePaymentIntent::new(amount, currency);
        params.metadata = Some(request.metadata.to_map());
        params.automatic_payment_methods = Some(CreatePaymentIntentAutomaticPaymentMethods {
            enabled: true,
            allow_redirects: None,
        });

        tracing::debug!(
            amount_cents = request.amount_cents,
            plan = %request.metadata.plan_id,
            cycle = %request.metadata.cycle,
            "Creating Stripe payment intent"
        );

        let intent = StripePaymentIntent::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        Ok(to_intent(intent)?)
    }

    async fn retrieve_payment_intent(
        &self,
        intent_id: &str,
    ) -> magnolia_checkout::Result<PaymentIntent> {
        let id: PaymentIntentId = intent_id
            .parse()
            .map_err(|_| PaymentError::InvalidId(intent_id.to_string()))?;

        let intent = StripePaymentIntent::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        Ok(to_intent(intent)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_mapping() {
        assert_eq!(stripe_currency("usd").unwrap(), Currency::USD);
        assert_eq!(stripe_currency("USD").unwrap(), Currency::USD);
        assert!(matches!(stripe_currency("doubloons"), Err(PaymentError::Config(_))));
    }

    #[test]
    fn test_provider_name() {
        let provider = StripeProvider::new("sk_test_123");
        assert_eq!(provider.name(), "stripe");
    }

    #[tokio::test]
    async fn test_unsupported_currency_fails_at_boot() {
        use crate::{MemoryAccountStore, MemoryIdentityStore};
        use magnolia_checkout::{CheckoutConfig, CheckoutController, PlanCatalog};
        use std::sync::Arc;

        let build = |currency: &str| {
            CheckoutController::new(
                Arc::new(PlanCatalog::midnight_magnolia().unwrap()),
                CheckoutConfig::new("pk_test_123", "https://mm.test").with_currency(currency),
                Arc::new(StripeProvider::new("sk_test_123")),
                Arc::new(MemoryIdentityStore::new()),
                Arc::new(MemoryAccountStore::new()),
            )
        };

        assert!(build("usd").is_ok());
        assert!(matches!(build("xyz"), Err(CheckoutError::Config(_))));
    }
}
