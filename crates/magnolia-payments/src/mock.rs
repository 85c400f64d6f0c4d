//! Mock payment provider
//!
//! Stores intents in memory and can be told to fail the next call or to
//! report a given status, for tests and for running the server without
//! Stripe credentials.

use async_trait::async_trait;
use magnolia_checkout::provider::{IntentRequest, PaymentIntent, PaymentProvider};
use magnolia_checkout::{CheckoutError, ClientSecret};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory stand-in for Stripe
#[derive(Default)]
pub struct MockPaymentProvider {
    intents: Arc<RwLock<HashMap<String, PaymentIntent>>>,
    fail_next: Arc<RwLock<bool>>,
    next_status: Arc<RwLock<Option<String>>>,
    create_calls: AtomicUsize,
    retrieve_calls: AtomicUsize,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures whether the next operation should fail.
    pub async fn set_fail_next(&self, fail: bool) {
        *self.fail_next.write().await = fail;
    }

    /// Status every stored intent reports on its next retrieve
    pub async fn set_next_status(&self, status: impl Into<String>) {
        *self.next_status.write().await = Some(status.into());
    }

    /// Number of create calls, including failed ones
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn retrieve_calls(&self) -> usize {
        self.retrieve_calls.load(Ordering::SeqCst)
    }

    /// Number of stored intents
    pub async fn intent_count(&self) -> usize {
        self.intents.read().await.len()
    }

    /// Look up a stored intent
    pub async fn intent(&self, id: &str) -> Option<PaymentIntent> {
        self.intents.read().await.get(id).cloned()
    }

    async fn take_failure(&self) -> bool {
        std::mem::take(&mut *self.fail_next.write().await)
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create_payment_intent(
        &self,
        request: &IntentRequest,
    ) -> magnolia_checkout::Result<PaymentIntent> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if self.take_failure().await {
            return Err(CheckoutError::Provider("Mock configured to fail".into()));
        }
        if request.amount_cents == 0 {
            return Err(CheckoutError::Provider(
                "Amount must be greater than zero".into(),
            ));
        }

        let id = format!("pi_mock_{}", Uuid::new_v4().simple());
        let intent = PaymentIntent {
            id: id.clone(),
            client_secret: ClientSecret::new(format!("{id}_secret_{}", Uuid::new_v4().simple())),
            status: "requires_payment_method".into(),
            amount_cents: request.amount_cents,
            metadata: request.metadata.to_map(),
        };

        self.intents.write().await.insert(id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_payment_intent(
        &self,
        intent_id: &str,
    ) -> magnolia_checkout::Result<PaymentIntent> {
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);

        if self.take_failure().await {
            return Err(CheckoutError::Provider("Mock configured to fail".into()));
        }

        let mut intents = self.intents.write().await;
        let intent = intents
            .get_mut(intent_id)
            .ok_or_else(|| CheckoutError::Provider(format!("No such payment intent: {intent_id}")))?;

        if let Some(status) = self.next_status.read().await.clone() {
            intent.status = status;
        }
        Ok(intent.clone())
    }
}
