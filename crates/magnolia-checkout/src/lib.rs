//! # magnolia-checkout
//!
//! Checkout and subscription activation for Midnight Magnolia memberships.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     CheckoutController                            │
//! │  ┌─────────────┐  ┌──────────────────┐  ┌──────────────────────┐  │
//! │  │ PlanCatalog │  │ CheckoutSession  │  │ PaymentProvider      │  │
//! │  │  (lookup)   │──│ (state machine)  │──│ IdentityProvider     │  │
//! │  │             │  │                  │  │ AccountService       │  │
//! │  └─────────────┘  └──────────────────┘  └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Collaborators are injected as trait objects so Stripe, the identity
//! backend and the account store can be replaced by fakes in tests.

pub mod catalog;
pub mod config;
pub mod controller;
pub mod error;
pub mod form;
pub mod provider;
pub mod session;
pub mod status;
pub mod view;

pub use catalog::{BillingCycle, Plan, PlanCatalog, PlanId};
pub use config::CheckoutConfig;
pub use controller::{Checkout, CheckoutController, EntryParams, ReturnParams};
pub use error::{CheckoutError, Result};
pub use form::{ConfirmError, ConfirmErrorKind, ConfirmOutcome, PaymentForm};
pub use provider::{
    AccountService, ClientSecret, Identity, IdentityProvider, IntentMetadata, IntentRequest,
    PaymentIntent, PaymentProvider,
};
pub use session::{CheckoutSession, CheckoutSessionStore, CheckoutState, MemoryCheckoutSessionStore, SessionId};
pub use status::PaymentStatus;
pub use view::{CheckoutView, PlanSummary, RetryAction};
