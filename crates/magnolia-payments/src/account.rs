//! Account Subscriptions
//!
//! Records which plan each member is on. Free plans are activated directly
//! by the checkout controller; paid plans are activated by the Stripe
//! webhook once the payment intent has succeeded.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use magnolia_checkout::{AccountService, BillingCycle, PlanId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{PaymentError, Result};

/// Subscription lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    /// Last payment attempt failed
    PastDue,
}

/// A member's subscription record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subscription {
    /// Owning user
    pub user_id: String,

    pub plan_id: PlanId,

    /// `None` for free plans
    pub cycle: Option<BillingCycle>,

    pub status: SubscriptionStatus,

    /// Stripe payment intent that paid for this subscription
    pub payment_intent_id: Option<String>,

    pub activated_at: Option<DateTime<Utc>>,

    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Active free-tier subscription
    pub fn free(user_id: impl Into<String>, plan_id: PlanId) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            plan_id,
            cycle: None,
            status: SubscriptionStatus::Active,
            payment_intent_id: None,
            activated_at: Some(now),
            updated_at: now,
        }
    }

    /// Paid subscription, active once its payment has settled
    pub fn paid(
        user_id: impl Into<String>,
        plan_id: PlanId,
        cycle: BillingCycle,
        payment_intent_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            plan_id,
            cycle: Some(cycle),
            status: SubscriptionStatus::Active,
            payment_intent_id: Some(payment_intent_id.into()),
            activated_at: Some(now),
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    pub fn is_paid(&self) -> bool {
        self.payment_intent_id.is_some()
    }

    pub fn set_status(&mut self, status: SubscriptionStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Subscription storage trait
pub trait AccountStore: Send + Sync {
    /// Save or replace the user's subscription
    fn save(&self, subscription: &Subscription) -> Result<()>;

    /// Get subscription by user
    fn get(&self, user_id: &str) -> Result<Option<Subscription>>;

    /// Get subscription by the payment intent that paid for it
    fn get_by_payment_intent(&self, intent_id: &str) -> Result<Option<Subscription>>;

    /// Remove a user's subscription
    fn delete(&self, user_id: &str) -> Result<()>;

    /// Activate a paid plan. Re-delivery of the same intent is a no-op.
    fn activate_paid(
        &self,
        user_id: &str,
        plan_id: PlanId,
        cycle: BillingCycle,
        intent_id: &str,
    ) -> Result<Subscription> {
        if let Some(existing) = self.get_by_payment_intent(intent_id)? {
            if existing.is_active() {
                return Ok(existing);
            }
        }
        let subscription = Subscription::paid(user_id, plan_id, cycle, intent_id);
        self.save(&subscription)?;
        Ok(subscription)
    }

    /// Update the status of whatever the intent paid for
    fn set_status_by_intent(
        &self,
        intent_id: &str,
        status: SubscriptionStatus,
    ) -> Result<Option<Subscription>> {
        let Some(mut subscription) = self.get_by_payment_intent(intent_id)? else {
            return Ok(None);
        };
        subscription.set_status(status);
        self.save(&subscription)?;
        Ok(Some(subscription))
    }
}

/// In-memory account store (for development)
pub struct MemoryAccountStore {
    subscriptions: RwLock<HashMap<String, Subscription>>,
    by_intent: RwLock<HashMap<String, String>>,
}

impl Default for MemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            by_intent: RwLock::new(HashMap::new()),
        }
    }
}

fn poisoned<T>(_: T) -> PaymentError {
    PaymentError::Storage("account store lock poisoned".into())
}

impl AccountStore for MemoryAccountStore {
    fn save(&self, subscription: &Subscription) -> Result<()> {
        let mut subscriptions = self.subscriptions.write().map_err(poisoned)?;
        let mut by_intent = self.by_intent.write().map_err(poisoned)?;

        if let Some(intent_id) = &subscription.payment_intent_id {
            by_intent.insert(intent_id.clone(), subscription.user_id.clone());
        }
        subscriptions.insert(subscription.user_id.clone(), subscription.clone());

        Ok(())
    }

    fn get(&self, user_id: &str) -> Result<Option<Subscription>> {
        let subscriptions = self.subscriptions.read().map_err(poisoned)?;
        Ok(subscriptions.get(user_id).cloned())
    }

    fn get_by_payment_intent(&self, intent_id: &str) -> Result<Option<Subscription>> {
        let by_intent = self.by_intent.read().map_err(poisoned)?;
        let subscriptions = self.subscriptions.read().map_err(poisoned)?;

        Ok(by_intent
            .get(intent_id)
            .and_then(|user_id| subscriptions.get(user_id))
            .filter(|s| s.payment_intent_id.as_deref() == Some(intent_id))
            .cloned())
    }

    fn delete(&self, user_id: &str) -> Result<()> {
        let mut subscriptions = self.subscriptions.write().map_err(poisoned)?;
        let mut by_intent = self.by_intent.write().map_err(poisoned)?;

        if let Some(subscription) = subscriptions.remove(user_id) {
            if let Some(intent_id) = subscription.payment_intent_id {
                by_intent.remove(&intent_id);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl AccountService for MemoryAccountStore {
    async fn activate_free_plan(
        &self,
        user_id: &str,
        plan_id: &PlanId,
    ) -> magnolia_checkout::Result<()> {
        if let Some(existing) = self.get(user_id)? {
            if existing.is_active() && &existing.plan_id == plan_id {
                tracing::debug!(user_id, plan = %plan_id, "Free plan already active");
                return Ok(());
            }
            // Never replace a live paid membership with the free tier
            if existing.is_active() && existing.is_paid() {
                tracing::info!(
                    user_id,
                    plan = %plan_id,
                    current_plan = %existing.plan_id,
                    "Paid plan active; free activation skipped"
                );
                return Ok(());
            }
        }

        self.save(&Subscription::free(user_id, plan_id.clone()))?;
        tracing::info!(user_id, plan = %plan_id, "Activated free plan");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_free_activation_is_idempotent() {
        let store = MemoryAccountStore::new();
        let plan = PlanId::new("magnolia-seed");

        store.activate_free_plan("user_1", &plan).await.unwrap();
        let first = store.get("user_1").unwrap().unwrap();
        store.activate_free_plan("user_1", &plan).await.unwrap();
        let second = store.get("user_1").unwrap().unwrap();

        assert!(second.is_active());
        assert_eq!(first.activated_at, second.activated_at);
    }

    #[tokio::test]
    async fn test_free_activation_keeps_paid_plan() {
        let store = MemoryAccountStore::new();
        store
            .activate_paid("user_1", PlanId::new("golden-grove"), BillingCycle::Yearly, "pi_9")
            .unwrap();

        store
            .activate_free_plan("user_1", &PlanId::new("magnolia-seed"))
            .await
            .unwrap();

        let current = store.get("user_1").unwrap().unwrap();
        assert_eq!(current.plan_id.as_str(), "golden-grove");
        assert_eq!(current.cycle, Some(BillingCycle::Yearly));
        assert!(store.get_by_payment_intent("pi_9").unwrap().is_some());

        // A lapsed paid plan may drop to the free tier
        store.set_status_by_intent("pi_9", SubscriptionStatus::PastDue).unwrap();
        store
            .activate_free_plan("user_1", &PlanId::new("magnolia-seed"))
            .await
            .unwrap();
        let current = store.get("user_1").unwrap().unwrap();
        assert_eq!(current.plan_id.as_str(), "magnolia-seed");
        assert!(current.is_active());
    }

    #[test]
    fn test_paid_activation_by_intent() {
        let store = MemoryAccountStore::new();
        let sub = store
            .activate_paid("user_1", PlanId::new("golden-grove"), BillingCycle::Yearly, "pi_1")
            .unwrap();
        assert!(sub.is_active());

        let again = store
            .activate_paid("user_1", PlanId::new("golden-grove"), BillingCycle::Yearly, "pi_1")
            .unwrap();
        assert_eq!(sub.activated_at, again.activated_at);

        let found = store.get_by_payment_intent("pi_1").unwrap().unwrap();
        assert_eq!(found.user_id, "user_1");
    }

    #[test]
    fn test_status_by_intent() {
        let store = MemoryAccountStore::new();
        store
            .activate_paid("user_1", PlanId::new("crescent-bloom"), BillingCycle::Monthly, "pi_2")
            .unwrap();

        let updated = store
            .set_status_by_intent("pi_2", SubscriptionStatus::PastDue)
            .unwrap()
            .unwrap();
        assert!(!updated.is_active());
        assert!(store.set_status_by_intent("pi_missing", SubscriptionStatus::PastDue).unwrap().is_none());
    }

    #[test]
    fn test_delete() {
        let store = MemoryAccountStore::new();
        store
            .activate_paid("user_1", PlanId::new("golden-grove"), BillingCycle::Yearly, "pi_3")
            .unwrap();
        store.delete("user_1").unwrap();
        assert!(store.get("user_1").unwrap().is_none());
        assert!(store.get_by_payment_intent("pi_3").unwrap().is_none());
    }
}
