//! Plan Catalog
//!
//! Fixed table of subscription plans with monthly and yearly price points.
//! Lookups are pure; the table is built once at startup and never mutated.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{CheckoutError, Result};

/// Plan identifier (e.g. `golden-grove`)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(String);

impl PlanId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Billing cycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    #[default]
    Yearly,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Yearly => "yearly",
        }
    }

    /// Parse a cycle from request input, defaulting to yearly
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("monthly") => BillingCycle::Monthly,
            _ => BillingCycle::Yearly,
        }
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub display_name: String,
    /// Monthly price in cents
    pub monthly_cents: u64,
    /// Yearly price in cents
    pub yearly_cents: u64,
    pub description: String,
    /// Free tier plans bypass payment collection
    pub free_tier: bool,
}

impl Plan {
    pub fn paid(
        id: &str,
        display_name: &str,
        monthly_cents: u64,
        yearly_cents: u64,
        description: &str,
    ) -> Self {
        Self {
            id: PlanId::new(id),
            display_name: display_name.into(),
            monthly_cents,
            yearly_cents,
            description: description.into(),
            free_tier: false,
        }
    }

    pub fn free(id: &str, display_name: &str, description: &str) -> Self {
        Self {
            id: PlanId::new(id),
            display_name: display_name.into(),
            monthly_cents: 0,
            yearly_cents: 0,
            description: description.into(),
            free_tier: true,
        }
    }

    /// Price for the given cycle, in cents
    pub fn amount_for(&self, cycle: BillingCycle) -> u64 {
        match cycle {
            BillingCycle::Monthly => self.monthly_cents,
            BillingCycle::Yearly => self.yearly_cents,
        }
    }

    /// Human-readable price, e.g. `$197`
    pub fn display_price(&self, cycle: BillingCycle) -> String {
        format_cents(self.amount_for(cycle))
    }
}

/// Format a cent amount as dollars, dropping `.00`
pub fn format_cents(cents: u64) -> String {
    if cents % 100 == 0 {
        format!("${}", cents / 100)
    } else {
        format!("${}.{:02}", cents / 100, cents % 100)
    }
}

/// Immutable collection of plans
#[derive(Clone, Debug, Default)]
pub struct PlanCatalog {
    plans: HashMap<PlanId, Plan>,
    order: Vec<PlanId>,
}

impl PlanCatalog {
    /// Build a catalog, rejecting duplicate ids and priced free-tier plans
    pub fn new(plans: Vec<Plan>) -> Result<Self> {
        let mut catalog = Self::default();
        for plan in plans {
            if plan.free_tier && (plan.monthly_cents != 0 || plan.yearly_cents != 0) {
                return Err(CheckoutError::Config(format!(
                    "free plan '{}' must have zero prices",
                    plan.id
                )));
            }
            if catalog.plans.contains_key(&plan.id) {
                return Err(CheckoutError::Config(format!(
                    "duplicate plan id '{}'",
                    plan.id
                )));
            }
            catalog.order.push(plan.id.clone());
            catalog.plans.insert(plan.id.clone(), plan);
        }
        Ok(catalog)
    }

    /// The Midnight Magnolia membership tiers
    pub fn midnight_magnolia() -> Result<Self> {
        let plans = vec![
            Plan::free(
                "magnolia-seed",
                "Magnolia Seed",
                "Community access, monthly newsletter and free resources",
            ),
            Plan::paid(
                "crescent-bloom",
                "Crescent Bloom",
                1700,
                17000,
                "Member library, journaling prompts and monthly workshops",
            ),
            Plan::paid(
                "golden-grove",
                "Golden Grove",
                2200,
                19700,
                "Everything in Crescent Bloom plus courses and template shop credits",
            ),
            Plan::paid(
                "midnight-garden",
                "Midnight Garden",
                4700,
                47000,
                "Everything in Golden Grove plus quarterly 1:1 strategy sessions",
            ),
        ];

        Self::new(plans)
    }

    /// Look up a plan by id
    pub fn resolve(&self, plan_id: &str) -> Option<&Plan> {
        self.plans.get(&PlanId::new(plan_id))
    }

    /// Whether a plan exists
    pub fn contains(&self, plan_id: &str) -> bool {
        self.resolve(plan_id).is_some()
    }

    /// Plans in catalog order
    pub fn plans(&self) -> impl Iterator<Item = &Plan> {
        self.order.iter().filter_map(|id| self.plans.get(id))
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}
