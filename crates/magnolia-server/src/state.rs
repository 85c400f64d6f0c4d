//! Application State

use std::sync::Arc;

use magnolia_checkout::{CheckoutController, MemoryCheckoutSessionStore, PlanCatalog};
use magnolia_payments::MemoryAccountStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Checkout orchestration, with its collaborators injected
    pub controller: Arc<CheckoutController>,

    /// Live checkout sessions
    pub sessions: Arc<MemoryCheckoutSessionStore>,

    /// Subscription records, shared with the webhook handler
    pub accounts: Arc<MemoryAccountStore>,

    pub catalog: Arc<PlanCatalog>,

    /// Stripe webhook signing secret (optional - webhook disabled if None)
    pub webhook_secret: Option<Arc<str>>,
}
