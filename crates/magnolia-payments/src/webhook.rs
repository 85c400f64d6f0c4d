//! Stripe Webhook Handling
//!
//! Authoritative activation for paid plans. The browser's view of a
//! succeeded payment is provisional; the subscription only becomes active
//! when Stripe reports `payment_intent.succeeded` server-to-server.

use magnolia_checkout::{IntentMetadata, PlanCatalog};
use std::sync::Arc;
use stripe::{Event, EventObject, EventType, Webhook};

use crate::account::{AccountStore, SubscriptionStatus};
use crate::error::{PaymentError, Result};

/// Parsed webhook event
#[derive(Clone, Debug)]
pub enum WebhookEvent {
    /// Payment settled - activate the subscription
    PaymentSucceeded {
        intent_id: String,
        metadata: Option<IntentMetadata>,
    },

    /// Payment attempt failed - mark past due
    PaymentFailed {
        intent_id: String,
        metadata: Option<IntentMetadata>,
    },

    /// Intent canceled
    PaymentCanceled { intent_id: String },

    /// Unhandled event type
    Other { event_type: String },
}

/// Webhook handler
pub struct WebhookHandler<S: AccountStore> {
    accounts: Arc<S>,
    catalog: Arc<PlanCatalog>,
}

impl<S: AccountStore> WebhookHandler<S> {
    pub fn new(accounts: Arc<S>, catalog: Arc<PlanCatalog>) -> Self {
        Self { accounts, catalog }
    }

    /// Verify webhook signature and parse event
    pub fn parse_event(&self, payload: &str, signature: &str, secret: &str) -> Result<Event> {
        Webhook::construct_event(payload, signature, secret)
            .map_err(|e| PaymentError::WebhookSignature(e.to_string()))
    }

    /// Process a verified Stripe event
    pub fn handle(&self, event: &Event) -> Result<WebhookEvent> {
        tracing::info!(event_type = ?event.type_, "Processing Stripe webhook");

        let parsed = Self::parse_webhook_event(event)?;
        self.apply(&parsed)?;
        Ok(parsed)
    }

    /// Apply an event to the account store. Safe to call again for a
    /// re-delivered event.
    pub fn apply(&self, event: &WebhookEvent) -> Result<()> {
        match event {
            WebhookEvent::PaymentSucceeded { intent_id, metadata } => {
                let Some(metadata) = metadata else {
                    tracing::warn!(intent_id = %intent_id, "Succeeded intent carries no checkout metadata");
                    return Ok(());
                };
                if !self.catalog.contains(metadata.plan_id.as_str()) {
                    return Err(PaymentError::WebhookParse(format!(
                        "unknown plan '{}' on intent {intent_id}",
                        metadata.plan_id
                    )));
                }

                let subscription = self.accounts.activate_paid(
                    &metadata.user_id,
                    metadata.plan_id.clone(),
                    metadata.cycle,
                    intent_id,
                )?;

                tracing::info!(
                    intent_id = %intent_id,
                    user_id = %subscription.user_id,
                    plan = %subscription.plan_id,
                    "Activated paid subscription"
                );
            }

            WebhookEvent::PaymentFailed { intent_id, metadata } => {
                let updated = self
                    .accounts
                    .set_status_by_intent(intent_id, SubscriptionStatus::PastDue)?;
                tracing::warn!(
                    intent_id = %intent_id,
                    user_id = ?metadata.as_ref().map(|m| m.user_id.as_str()),
                    had_subscription = updated.is_some(),
                    "Payment failed"
                );
            }

            WebhookEvent::PaymentCanceled { intent_id } => {
                tracing::info!(intent_id = %intent_id, "Payment intent canceled");
            }

            WebhookEvent::Other { event_type } => {
                tracing::debug!(event_type = %event_type, "Unhandled webhook event");
            }
        }

        Ok(())
    }

    /// Parse Stripe event into our event type
    fn parse_webhook_event(event: &Event) -> Result<WebhookEvent> {
        match event.type_ {
            EventType::PaymentIntentSucceeded
            | EventType::PaymentIntentPaymentFailed
            | EventType::PaymentIntentCanceled => {
                let EventObject::PaymentIntent(intent) = &event.data.object else {
                    return Err(PaymentError::WebhookParse("Invalid payment intent data".into()));
                };
                let intent_id = intent.id.to_string();
                let metadata = IntentMetadata::from_map(&intent.metadata);

                Ok(match event.type_ {
                    EventType::PaymentIntentSucceeded => {
                        WebhookEvent::PaymentSucceeded { intent_id, metadata }
                    }
                    EventType::PaymentIntentPaymentFailed => {
                        WebhookEvent::PaymentFailed { intent_id, metadata }
                    }
                    _ => WebhookEvent::PaymentCanceled { intent_id },
                })
            }

            _ => Ok(WebhookEvent::Other {
                event_type: serde_json::to_value(&event.type_)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_else(|| format!("{:?}", event.type_)),
            }),
        }
    }
}
