//! Collaborator Capabilities
//!
//! The controller talks to three collaborators through traits so each can
//! be swapped (Stripe in production, in-memory fakes in tests):
//!
//! - [`PaymentProvider`] creates and retrieves payment intents
//! - [`IdentityProvider`] resolves the signed-in user
//! - [`AccountService`] activates free plans
//!
//! ## Usage
//!
//! ```rust,ignore
//! use magnolia_checkout::provider::{IntentRequest, PaymentProvider};
//!
//! let intent = provider.create_payment_intent(&request).await?;
//! // Hand intent.client_secret to the payment form
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::catalog::{BillingCycle, PlanId};
use crate::error::Result;

/// Opaque token authorizing the browser to complete one payment intent
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientSecret(String);

impl ClientSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Intent id prefix of a `pi_..._secret_...` secret
    pub fn intent_id(&self) -> Option<&str> {
        self.0
            .split_once("_secret_")
            .map(|(id, _)| id)
            .filter(|id| !id.is_empty())
    }
}

impl std::fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ClientSecret(..)")
    }
}

/// Metadata attached to every intent.
///
/// Stable for a given `(plan, cycle, user)` so the provider can reconcile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentMetadata {
    pub plan_id: PlanId,
    pub cycle: BillingCycle,
    pub user_id: String,
}

impl IntentMetadata {
    pub const PLAN_KEY: &'static str = "plan_id";
    pub const CYCLE_KEY: &'static str = "cycle";
    pub const USER_KEY: &'static str = "user_id";

    /// Flatten into provider key/value metadata
    pub fn to_map(&self) -> HashMap<String, String> {
        HashMap::from([
            (Self::PLAN_KEY.to_string(), self.plan_id.to_string()),
            (Self::CYCLE_KEY.to_string(), self.cycle.as_str().to_string()),
            (Self::USER_KEY.to_string(), self.user_id.clone()),
        ])
    }

    /// Rebuild from provider metadata. Returns `None` if a key is missing.
    pub fn from_map(map: &HashMap<String, String>) -> Option<Self> {
        Some(Self {
            plan_id: PlanId::new(map.get(Self::PLAN_KEY)?.clone()),
            cycle: BillingCycle::parse(Some(map.get(Self::CYCLE_KEY)?.as_str())),
            user_id: map.get(Self::USER_KEY)?.clone(),
        })
    }
}

/// Request to create a payment intent
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntentRequest {
    /// Amount in minor units
    pub amount_cents: u64,

    /// ISO currency code, lowercase (e.g. "usd")
    pub currency: String,

    pub metadata: IntentMetadata,
}

/// Provider-side payment intent
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Provider id (e.g. `pi_...`)
    pub id: String,

    pub client_secret: ClientSecret,

    /// Raw provider status string
    pub status: String,

    pub amount_cents: u64,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Creates and retrieves payment intents
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Provider name (for logging)
    fn name(&self) -> &str;

    /// Whether intents can be created in this lowercase ISO currency
    fn supports_currency(&self, currency: &str) -> bool {
        currency.len() == 3 && currency.bytes().all(|b| b.is_ascii_lowercase())
    }

    /// Create a payment intent for the given amount
    async fn create_payment_intent(&self, request: &IntentRequest) -> Result<PaymentIntent>;

    /// Fetch the current state of an intent
    async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent>;
}

/// Signed-in user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}

/// Resolves the current user from request credentials
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns `None` when no one is signed in
    async fn current_user(&self, token: Option<&str>) -> Result<Option<Identity>>;
}

/// Account/subscription collaborator
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Mark a zero-cost plan active for the user
    async fn activate_free_plan(&self, user_id: &str, plan_id: &PlanId) -> Result<()>;
}
