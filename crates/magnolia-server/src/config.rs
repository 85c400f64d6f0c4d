//! Server Configuration
//!
//! Everything comes from the environment (with `.env` loaded by `main`).

use std::time::Duration;

use magnolia_checkout::{CheckoutConfig, CheckoutError, PlanCatalog};

/// Process configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: String,

    pub checkout: CheckoutConfig,

    /// Stripe secret key (`None` only with the mock provider)
    pub stripe_secret_key: Option<String>,

    /// Stripe webhook signing secret; webhook route is disabled without it
    pub webhook_secret: Option<String>,

    /// Use the in-memory payment provider instead of Stripe
    pub use_mock_provider: bool,

    /// Directory holding the built frontend
    pub static_dir: String,
}

fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn flag(name: &str) -> bool {
    matches!(
        var(name).map(|v| v.to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

impl ServerConfig {
    /// Read configuration and fail on anything checkout cannot run without
    pub fn from_env(catalog: &PlanCatalog) -> Result<Self, CheckoutError> {
        let use_mock_provider = flag("CHECKOUT_USE_MOCK_PROVIDER");

        let publishable_key = var("STRIPE_PUBLISHABLE_KEY")
            .ok_or_else(|| CheckoutError::Config("STRIPE_PUBLISHABLE_KEY not set".into()))?;

        let stripe_secret_key = var("STRIPE_SECRET_KEY");
        if stripe_secret_key.is_none() && !use_mock_provider {
            return Err(CheckoutError::Config("STRIPE_SECRET_KEY not set".into()));
        }

        let base_url = var("PUBLIC_BASE_URL").unwrap_or_else(|| "http://localhost:3000".into());
        let mut checkout = CheckoutConfig::new(publishable_key, base_url);
        if let Some(plan) = var("CHECKOUT_DEFAULT_PLAN") {
            checkout = checkout.with_default_plan(plan);
        }
        if let Some(currency) = var("CHECKOUT_CURRENCY") {
            checkout = checkout.with_currency(currency);
        }
        if let Some(delay) = var("CHECKOUT_SUCCESS_DELAY_MS") {
            let millis = delay.parse::<u64>().map_err(|_| {
                CheckoutError::Config(format!("CHECKOUT_SUCCESS_DELAY_MS is not a number: {delay}"))
            })?;
            checkout = checkout.with_success_redirect_delay(Duration::from_millis(millis));
        }
        checkout.validate(catalog)?;

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into()),
            checkout,
            stripe_secret_key,
            webhook_secret: var("STRIPE_WEBHOOK_SECRET"),
            use_mock_provider,
            static_dir: var("STATIC_DIR").unwrap_or_else(|| "static".into()),
        })
    }
}
