//! Checkout Sessions
//!
//! In-memory state of one checkout attempt and the state machine that
//! governs it. Sessions are never persisted; the payment provider is the
//! durable record of payment state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::catalog::{BillingCycle, PlanId};
use crate::error::{CheckoutError, Result};
use crate::provider::{ClientSecret, Identity, PaymentIntent};
use crate::status::PaymentStatus;

/// Unique checkout session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Checkout state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    Init,
    PlanResolved,
    InvalidPlan,
    AuthRequired,
    AmountComputed,
    FreeActivation,
    ActivationFailed,
    IntentRequested,
    AwaitingPayment,
    IntentFailed,
    Complete,
    CompletePending,
}

impl CheckoutState {
    /// Allowed edges
    pub fn can_transition_to(self, next: CheckoutState) -> bool {
        use CheckoutState::*;

        matches!(
            (self, next),
            (Init, PlanResolved | InvalidPlan)
                | (PlanResolved, AuthRequired | AmountComputed)
                | (AmountComputed, FreeActivation | IntentRequested | InvalidPlan)
                | (FreeActivation, Complete | ActivationFailed)
                | (ActivationFailed, AmountComputed)
                | (IntentRequested, AwaitingPayment | IntentFailed)
                | (AwaitingPayment, Complete | CompletePending | AwaitingPayment | IntentFailed)
                | (CompletePending, Complete | CompletePending | AwaitingPayment | IntentFailed)
                | (IntentFailed, AmountComputed)
        )
    }

    /// No further transitions for this attempt
    pub fn is_final(self) -> bool {
        matches!(
            self,
            CheckoutState::InvalidPlan | CheckoutState::AuthRequired | CheckoutState::Complete
        )
    }
}

/// One checkout attempt
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: SessionId,

    /// Plan id as resolved (after default fallback)
    pub plan_id: Option<PlanId>,

    pub cycle: BillingCycle,

    /// Amount for the selected cycle, in cents
    pub amount_cents: Option<u64>,

    pub identity: Option<Identity>,

    /// Provider intent id, once created
    pub intent_id: Option<String>,

    pub client_secret: Option<ClientSecret>,

    pub payment_status: Option<PaymentStatus>,

    state: CheckoutState,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl CheckoutSession {
    pub fn new(cycle: BillingCycle) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            plan_id: None,
            cycle,
            amount_cents: None,
            identity: None,
            intent_id: None,
            client_secret: None,
            payment_status: None,
            state: CheckoutState::Init,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> CheckoutState {
        self.state
    }

    pub fn user_id(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.user_id.as_str())
    }

    /// Move to `next`, rejecting edges outside the state table
    pub fn transition(&mut self, next: CheckoutState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(CheckoutError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        if next == CheckoutState::AwaitingPayment && self.client_secret.is_none() {
            return Err(CheckoutError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        tracing::debug!(
            session_id = %self.id,
            from = ?self.state,
            to = ?next,
            "Checkout transition"
        );

        if next == CheckoutState::IntentFailed {
            self.intent_id = None;
            self.client_secret = None;
        }
        self.state = next;
        self.touch();
        Ok(())
    }

    /// Store a freshly created intent and move to `AwaitingPayment`
    pub fn attach_intent(&mut self, intent: PaymentIntent) -> Result<()> {
        self.intent_id = Some(intent.id);
        self.client_secret = Some(intent.client_secret);
        self.payment_status = PaymentStatus::from_provider(&intent.status);
        self.transition(CheckoutState::AwaitingPayment)
    }

    /// Whether this session was started for the same purchase
    pub fn matches(&self, plan_id: &PlanId, cycle: BillingCycle, user_id: &str) -> bool {
        self.plan_id.as_ref() == Some(plan_id)
            && self.cycle == cycle
            && self.user_id() == Some(user_id)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Rebuild a session from a provider intent that is awaiting a result
    pub(crate) fn restored(
        plan_id: PlanId,
        cycle: BillingCycle,
        identity: Identity,
        intent: &PaymentIntent,
    ) -> Self {
        let mut session = Self::new(cycle);
        session.plan_id = Some(plan_id);
        session.amount_cents = Some(intent.amount_cents);
        session.identity = Some(identity);
        session.intent_id = Some(intent.id.clone());
        session.client_secret = Some(intent.client_secret.clone());
        session.state = CheckoutState::AwaitingPayment;
        session
    }
}

/// Session store trait
pub trait CheckoutSessionStore: Send + Sync {
    /// Save or replace a session
    fn save(&self, session: &CheckoutSession) -> Result<()>;

    /// Load a session by ID
    fn load(&self, id: &SessionId) -> Result<Option<CheckoutSession>>;

    /// Drop a session
    fn delete(&self, id: &SessionId) -> Result<()>;
}

/// Idle time after which an unfinished session is dropped
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 60;

/// In-memory session store
///
/// Sessions idle for longer than the TTL are swept on every save.
pub struct MemoryCheckoutSessionStore {
    sessions: RwLock<HashMap<SessionId, CheckoutSession>>,
    ttl: Duration,
}

impl Default for MemoryCheckoutSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCheckoutSessionStore {
    pub fn new() -> Self {
        Self::with_ttl(Duration::minutes(DEFAULT_SESSION_TTL_MINUTES))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Drop sessions not touched since `now - ttl`, returning how many went
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        Ok(sweep(&mut sessions, now - self.ttl))
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn sweep(sessions: &mut HashMap<SessionId, CheckoutSession>, cutoff: DateTime<Utc>) -> usize {
    let before = sessions.len();
    sessions.retain(|_, s| s.updated_at >= cutoff);
    let removed = before - sessions.len();
    if removed > 0 {
        tracing::debug!(removed, "Expired checkout sessions dropped");
    }
    removed
}

fn poisoned<T>(_: T) -> CheckoutError {
    CheckoutError::Storage("session store lock poisoned".into())
}

impl CheckoutSessionStore for MemoryCheckoutSessionStore {
    fn save(&self, session: &CheckoutSession) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sweep(&mut sessions, Utc::now() - self.ttl);
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn load(&self, id: &SessionId) -> Result<Option<CheckoutSession>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions.get(id).cloned())
    }

    fn delete(&self, id: &SessionId) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.remove(id);
        Ok(())
    }
}
