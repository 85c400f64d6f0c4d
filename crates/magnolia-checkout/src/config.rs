//! Checkout Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::catalog::{BillingCycle, PlanCatalog, PlanId};
use crate::error::{CheckoutError, Result};
use crate::session::SessionId;

/// Checkout flow settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Publishable key handed to the browser SDK
    pub publishable_key: String,

    /// Public origin, e.g. `https://midnightmagnolia.co`
    pub base_url: String,

    /// Plan used when the entry parameters name none
    #[serde(default = "default_plan")]
    pub default_plan: PlanId,

    /// Lowercase ISO currency code
    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default = "default_sign_in_path")]
    pub sign_in_path: String,

    #[serde(default = "default_dashboard_path")]
    pub dashboard_path: String,

    #[serde(default = "default_plans_path")]
    pub plans_path: String,

    #[serde(default = "default_checkout_path")]
    pub checkout_path: String,

    #[serde(default = "default_return_path")]
    pub return_path: String,

    /// Pause on the success message before leaving for the dashboard
    #[serde(default = "default_success_delay", with = "millis")]
    pub success_redirect_delay: Duration,
}

fn default_plan() -> PlanId { PlanId::new("golden-grove") }
fn default_currency() -> String { "usd".into() }
fn default_sign_in_path() -> String { "/sign-in".into() }
fn default_dashboard_path() -> String { "/dashboard".into() }
fn default_plans_path() -> String { "/pricing".into() }
fn default_checkout_path() -> String { "/checkout".into() }
fn default_return_path() -> String { "/checkout/complete".into() }
fn default_success_delay() -> Duration { Duration::from_millis(2000) }

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[derive(Serialize)]
struct CheckoutQuery<'a> {
    plan: &'a str,
    cycle: &'a str,
}

#[derive(Serialize)]
struct SignInQuery<'a> {
    redirect_to: &'a str,
}

#[derive(Serialize)]
struct ReturnQuery<'a> {
    session: &'a str,
}

impl CheckoutConfig {
    pub fn new(publishable_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            publishable_key: publishable_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_plan: default_plan(),
            currency: default_currency(),
            sign_in_path: default_sign_in_path(),
            dashboard_path: default_dashboard_path(),
            plans_path: default_plans_path(),
            checkout_path: default_checkout_path(),
            return_path: default_return_path(),
            success_redirect_delay: default_success_delay(),
        }
    }

    pub fn with_default_plan(mut self, plan: impl Into<String>) -> Self {
        self.default_plan = PlanId::new(plan);
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into().to_ascii_lowercase();
        self
    }

    pub fn with_success_redirect_delay(mut self, delay: Duration) -> Self {
        self.success_redirect_delay = delay;
        self
    }

    /// Fail loudly on settings no checkout can succeed without
    pub fn validate(&self, catalog: &PlanCatalog) -> Result<()> {
        if self.publishable_key.trim().is_empty() {
            return Err(CheckoutError::Config(
                "payment provider publishable key is missing".into(),
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(CheckoutError::Config("public base URL is missing".into()));
        }
        if !catalog.contains(self.default_plan.as_str()) {
            return Err(CheckoutError::Config(format!(
                "default plan '{}' is not in the catalog",
                self.default_plan
            )));
        }
        if self.currency.len() != 3 {
            return Err(CheckoutError::Config(format!(
                "invalid currency '{}'",
                self.currency
            )));
        }
        if self.success_redirect_delay.is_zero() {
            return Err(CheckoutError::Config(
                "success redirect delay must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Checkout entry path carrying the intended plan and cycle
    pub fn checkout_location(&self, plan_id: &str, cycle: BillingCycle) -> String {
        let query = serde_urlencoded::to_string(CheckoutQuery {
            plan: plan_id,
            cycle: cycle.as_str(),
        })
        .unwrap_or_default();
        format!("{}?{}", self.checkout_path, query)
    }

    /// Sign-in path that resumes checkout afterwards
    pub fn sign_in_location(&self, plan_id: &str, cycle: BillingCycle) -> String {
        let resume = self.checkout_location(plan_id, cycle);
        let query = serde_urlencoded::to_string(SignInQuery {
            redirect_to: &resume,
        })
        .unwrap_or_default();
        format!("{}?{}", self.sign_in_path, query)
    }

    /// Absolute URL the provider sends the browser back to
    pub fn return_url(&self, session_id: &SessionId) -> String {
        let query = serde_urlencoded::to_string(ReturnQuery {
            session: session_id.as_str(),
        })
        .unwrap_or_default();
        format!("{}{}?{}", self.base_url, self.return_path, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CheckoutConfig {
        CheckoutConfig::new("pk_test_123", "https://midnightmagnolia.test/")
    }

    #[test]
    fn test_validates_against_catalog() {
        let catalog = PlanCatalog::midnight_magnolia().unwrap();
        assert!(config().validate(&catalog).is_ok());
        assert!(config()
            .with_default_plan("nope")
            .validate(&catalog)
            .is_err());
    }

    #[test]
    fn test_missing_publishable_key_is_fatal() {
        let catalog = PlanCatalog::midnight_magnolia().unwrap();
        let err = CheckoutConfig::new("", "https://x.test")
            .validate(&catalog)
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Config(_)));
    }

    #[test]
    fn test_sign_in_location_preserves_plan() {
        let location = config().sign_in_location("golden-grove", BillingCycle::Yearly);
        assert_eq!(
            location,
            "/sign-in?redirect_to=%2Fcheckout%3Fplan%3Dgolden-grove%26cycle%3Dyearly"
        );
    }

    #[test]
    fn test_return_url() {
        let id = SessionId::from_string("abc");
        assert_eq!(
            config().return_url(&id),
            "https://midnightmagnolia.test/checkout/complete?session=abc"
        );
    }
}
