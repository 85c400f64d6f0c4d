//! # magnolia-payments
//!
//! Stripe payment intents, webhook reconciliation and account storage for
//! Midnight Magnolia checkout.
//!
//! ## Payment flow (Stripe Elements)
//!
//! The payment form is embedded in our checkout page; the user never leaves
//! the site except for bank redirects Stripe may require.
//!
//! ```text
//! ┌──────────────┐  create intent  ┌──────────┐
//! │   Checkout   │────────────────▶│  Stripe  │
//! │  controller  │◀────────────────│   API    │
//! └──────┬───────┘  client secret  └────┬─────┘
//!        │                              │ payment_intent.succeeded
//!        ▼                              ▼
//! ┌──────────────┐ confirmPayment ┌──────────────┐
//! │ Payment form │───────────────▶│   Webhook    │──▶ subscription active
//! │ (Elements)   │                │   handler    │
//! └──────────────┘                └──────────────┘
//! ```
//!
//! The browser's "succeeded" is provisional; only the webhook activates a
//! paid subscription.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use magnolia_payments::{StripeProvider, MemoryAccountStore};
//!
//! let payments = Arc::new(StripeProvider::new(&secret_key));
//! let accounts = Arc::new(MemoryAccountStore::new());
//! let controller = CheckoutController::new(catalog, config, payments, identity, accounts)?;
//! ```

mod account;
mod error;
mod identity;
mod mock;
mod stripe_provider;
mod webhook;

pub use account::{AccountStore, MemoryAccountStore, Subscription, SubscriptionStatus};
pub use error::{PaymentError, Result};
pub use identity::MemoryIdentityStore;
pub use mock::MockPaymentProvider;
pub use stripe_provider::StripeProvider;
pub use webhook::{WebhookEvent, WebhookHandler};
