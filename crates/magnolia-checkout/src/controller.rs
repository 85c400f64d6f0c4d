//! Checkout Session Controller
//!
//! Turns entry parameters into one of: an instant free-plan activation, a
//! payment form bound to a live client secret, or a recoverable error view.
//!
//! ```text
//! Init ─▶ PlanResolved ─▶ AmountComputed ─┬─▶ FreeActivation ─▶ Complete
//!  │           │                          │
//!  ▼           ▼                          └─▶ IntentRequested ─▶ AwaitingPayment ─▶ Complete
//! InvalidPlan  AuthRequired                         │                  │
//!                                                   ▼                  ├─▶ CompletePending
//!                                              IntentFailed ◀──────────┘
//! ```
//!
//! Provider and network failures never escape as errors; they become views.
//! `Err` from a controller method means the caller broke the state machine
//! (wrong session, wrong step).

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::catalog::{BillingCycle, Plan, PlanCatalog, PlanId};
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, Result};
use crate::provider::{
    AccountService, Identity, IdentityProvider, IntentMetadata, IntentRequest, PaymentProvider,
};
use crate::session::{CheckoutSession, CheckoutState};
use crate::status::{PaymentStatus, StatusOutcome, interpret};
use crate::view::{CheckoutView, PlanSummary, RetryAction};

const RETRY_PAYMENT_METHOD: &str =
    "Your payment was not successful. Please try another payment method.";
const PROCESSING: &str =
    "Your payment is processing. We'll email you as soon as your membership is active.";
const GENERIC_FAILURE: &str = "Something went wrong with your payment. Please try again.";

/// Entry parameters from the page query
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EntryParams {
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub cycle: Option<String>,
}

impl EntryParams {
    pub fn new(plan: impl Into<String>, cycle: impl Into<String>) -> Self {
        Self {
            plan: Some(plan.into()),
            cycle: Some(cycle.into()),
        }
    }

    /// Requested plan id, `None` when absent or blank
    fn requested_plan(&self) -> Option<&str> {
        self.plan.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

/// Parameters the provider appends when sending the browser back
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReturnParams {
    pub payment_intent: String,
    #[serde(default)]
    pub redirect_status: Option<String>,
}

/// A session together with what to render for it
#[derive(Clone, Debug)]
pub struct Checkout {
    pub session: CheckoutSession,
    pub view: CheckoutView,
}

/// Checkout orchestration
pub struct CheckoutController {
    catalog: Arc<PlanCatalog>,
    config: CheckoutConfig,
    payments: Arc<dyn PaymentProvider>,
    identity: Arc<dyn IdentityProvider>,
    accounts: Arc<dyn AccountService>,
}

impl CheckoutController {
    /// Create a controller. Fails on configuration no checkout could survive.
    pub fn new(
        catalog: Arc<PlanCatalog>,
        config: CheckoutConfig,
        payments: Arc<dyn PaymentProvider>,
        identity: Arc<dyn IdentityProvider>,
        accounts: Arc<dyn AccountService>,
    ) -> Result<Self> {
        config.validate(&catalog)?;
        if !payments.supports_currency(&config.currency) {
            return Err(CheckoutError::Config(format!(
                "{} cannot charge in '{}'",
                payments.name(),
                config.currency
            )));
        }
        tracing::info!(
            provider = payments.name(),
            plans = catalog.len(),
            default_plan = %config.default_plan,
            "Checkout controller ready"
        );
        Ok(Self {
            catalog,
            config,
            payments,
            identity,
            accounts,
        })
    }

    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    /// Start a new checkout from entry parameters
    pub async fn start(&self, params: &EntryParams, token: Option<&str>) -> Result<Checkout> {
        let cycle = BillingCycle::parse(params.cycle.as_deref());
        let mut session = CheckoutSession::new(cycle);
        let view = self.begin(&mut session, params, token).await?;

        tracing::info!(
            session_id = %session.id,
            state = ?session.state(),
            view = view.kind(),
            "Checkout started"
        );
        Ok(Checkout { session, view })
    }

    /// Reuse a live session for the same purchase, otherwise start over.
    ///
    /// A session already holding a client secret for the same
    /// `(plan, cycle, user)` renders the form again without a provider call.
    pub async fn resume(
        &self,
        session: CheckoutSession,
        params: &EntryParams,
        token: Option<&str>,
    ) -> Result<Checkout> {
        if session.state() == CheckoutState::AwaitingPayment {
            let plan_id = PlanId::new(self.plan_id_for(params));
            let cycle = BillingCycle::parse(params.cycle.as_deref());
            if let Some(identity) = self.lookup_identity(token).await {
                if session.matches(&plan_id, cycle, &identity.user_id) {
                    tracing::debug!(session_id = %session.id, "Reusing existing payment intent");
                    let view = self.payment_form_view(&session, None)?;
                    return Ok(Checkout { session, view });
                }
            }
        }
        self.start(params, token).await
    }

    /// Retry after a failed intent creation or free activation
    pub async fn retry(
        &self,
        session: &mut CheckoutSession,
        token: Option<&str>,
    ) -> Result<CheckoutView> {
        self.authorize(session, token).await?;
        match session.state() {
            CheckoutState::IntentFailed | CheckoutState::ActivationFailed => {
                tracing::info!(session_id = %session.id, from = ?session.state(), "Retrying checkout");
                session.transition(CheckoutState::AmountComputed)?;
                self.proceed(session).await
            }
            CheckoutState::AwaitingPayment => self.payment_form_view(session, None),
            state => Err(CheckoutError::InvalidTransition {
                from: state,
                to: CheckoutState::AmountComputed,
            }),
        }
    }

    /// Handle the browser coming back from the provider's confirmation step
    pub async fn complete(
        &self,
        session: &mut CheckoutSession,
        params: &ReturnParams,
        token: Option<&str>,
    ) -> Result<CheckoutView> {
        self.authorize(session, token).await?;
        match session.state() {
            CheckoutState::AwaitingPayment | CheckoutState::CompletePending => {}
            CheckoutState::Complete => return self.success_view(session),
            state => {
                return Err(CheckoutError::InvalidTransition {
                    from: state,
                    to: CheckoutState::Complete,
                });
            }
        }

        if session.intent_id.as_deref() != Some(params.payment_intent.as_str()) {
            tracing::warn!(
                session_id = %session.id,
                intent_id = %params.payment_intent,
                "Return parameters name a foreign payment intent"
            );
            return Err(CheckoutError::IntentMismatch(params.payment_intent.clone()));
        }

        match self.payments.retrieve_payment_intent(&params.payment_intent).await {
            Ok(intent) => self.apply_status(session, &intent.status),
            Err(err) => {
                tracing::warn!(
                    session_id = %session.id,
                    error = %err,
                    "Could not retrieve payment intent"
                );
                Ok(CheckoutView::Retry {
                    session_id: session.id.clone(),
                    action: RetryAction::CheckStatus,
                    message: err.user_message(),
                })
            }
        }
    }

    /// Rebuild a session from the provider's intent when the in-memory one is gone
    pub async fn reconstruct(&self, params: &ReturnParams, token: Option<&str>) -> Result<Checkout> {
        let intent = self
            .payments
            .retrieve_payment_intent(&params.payment_intent)
            .await
            .map_err(|e| CheckoutError::Provider(e.to_string()))?;

        let metadata = IntentMetadata::from_map(&intent.metadata)
            .ok_or_else(|| CheckoutError::SessionNotFound(params.payment_intent.clone()))?;

        let identity = self
            .lookup_identity(token)
            .await
            .ok_or(CheckoutError::AuthRequired)?;
        if identity.user_id != metadata.user_id {
            return Err(CheckoutError::IntentMismatch(intent.id));
        }
        if !self.catalog.contains(metadata.plan_id.as_str()) {
            return Err(CheckoutError::InvalidPlan(metadata.plan_id.to_string()));
        }

        let mut session =
            CheckoutSession::restored(metadata.plan_id, metadata.cycle, identity, &intent);
        tracing::info!(
            session_id = %session.id,
            intent_id = %intent.id,
            "Restored checkout session from payment intent"
        );
        let view = self.apply_status(&mut session, &intent.status)?;
        Ok(Checkout { session, view })
    }

    async fn begin(
        &self,
        session: &mut CheckoutSession,
        params: &EntryParams,
        token: Option<&str>,
    ) -> Result<CheckoutView> {
        let requested = params.requested_plan();
        let Some(plan) = self.catalog.resolve(self.plan_id_for(params)) else {
            tracing::warn!(session_id = %session.id, plan = ?requested, "Unknown plan requested");
            session.transition(CheckoutState::InvalidPlan)?;
            return Ok(self.invalid_plan_view(requested));
        };
        session.plan_id = Some(plan.id.clone());
        session.transition(CheckoutState::PlanResolved)?;

        let Some(identity) = self.lookup_identity(token).await else {
            session.transition(CheckoutState::AuthRequired)?;
            tracing::info!(session_id = %session.id, plan = %plan.id, "Sign-in required for checkout");
            return Ok(CheckoutView::Redirect {
                location: self.config.sign_in_location(plan.id.as_str(), session.cycle),
            });
        };

        session.identity = Some(identity);
        session.amount_cents = Some(plan.amount_for(session.cycle));
        session.transition(CheckoutState::AmountComputed)?;
        self.proceed(session).await
    }

    /// Route from `AmountComputed` to free activation or intent creation
    async fn proceed(&self, session: &mut CheckoutSession) -> Result<CheckoutView> {
        let plan = self.session_plan(session)?;
        let user_id = session
            .user_id()
            .ok_or(CheckoutError::AuthRequired)?
            .to_string();
        let amount = plan.amount_for(session.cycle);

        if plan.free_tier {
            return self.activate_free(session, plan, &user_id).await;
        }

        if amount == 0 {
            // Zero price without the free flag is a catalog mistake, not a free plan
            tracing::error!(plan = %plan.id, cycle = %session.cycle, "Paid plan priced at zero");
            session.transition(CheckoutState::InvalidPlan)?;
            return Ok(self.invalid_plan_view(Some(plan.id.as_str())));
        }

        session.transition(CheckoutState::IntentRequested)?;
        let request = IntentRequest {
            amount_cents: amount,
            currency: self.config.currency.clone(),
            metadata: IntentMetadata {
                plan_id: plan.id.clone(),
                cycle: session.cycle,
                user_id,
            },
        };

        match self.payments.create_payment_intent(&request).await {
            Ok(intent) => {
                tracing::info!(
                    session_id = %session.id,
                    intent_id = %intent.id,
                    amount_cents = amount,
                    "Payment intent created"
                );
                session.attach_intent(intent)?;
                self.payment_form_view(session, None)
            }
            Err(err) => {
                tracing::warn!(session_id = %session.id, error = %err, "Payment intent creation failed");
                session.transition(CheckoutState::IntentFailed)?;
                Ok(CheckoutView::Retry {
                    session_id: session.id.clone(),
                    action: RetryAction::CreateIntent,
                    message: CheckoutError::IntentCreation(err.to_string()).user_message(),
                })
            }
        }
    }

    async fn activate_free(
        &self,
        session: &mut CheckoutSession,
        plan: &Plan,
        user_id: &str,
    ) -> Result<CheckoutView> {
        session.transition(CheckoutState::FreeActivation)?;

        match self.accounts.activate_free_plan(user_id, &plan.id).await {
            Ok(()) => {
                session.transition(CheckoutState::Complete)?;
                tracing::info!(session_id = %session.id, plan = %plan.id, user_id, "Free plan activated");
                Ok(CheckoutView::Redirect {
                    location: self.config.dashboard_path.clone(),
                })
            }
            Err(err) => {
                tracing::warn!(session_id = %session.id, error = %err, "Free plan activation failed");
                session.transition(CheckoutState::ActivationFailed)?;
                Ok(CheckoutView::Retry {
                    session_id: session.id.clone(),
                    action: RetryAction::ActivateFreePlan,
                    message: CheckoutError::Activation(err.to_string()).user_message(),
                })
            }
        }
    }

    /// Map a provider status onto the next state and view
    fn apply_status(&self, session: &mut CheckoutSession, raw: &str) -> Result<CheckoutView> {
        let status = PaymentStatus::from_provider(raw);
        session.payment_status = status;

        match interpret(status) {
            StatusOutcome::Succeeded => {
                session.transition(CheckoutState::Complete)?;
                tracing::info!(session_id = %session.id, "Payment succeeded");
                self.success_view(session)
            }
            StatusOutcome::Processing => {
                session.transition(CheckoutState::CompletePending)?;
                tracing::info!(session_id = %session.id, "Payment processing");
                Ok(CheckoutView::Processing {
                    message: PROCESSING.into(),
                })
            }
            StatusOutcome::RetryPaymentMethod => {
                session.transition(CheckoutState::AwaitingPayment)?;
                self.payment_form_view(session, Some(RETRY_PAYMENT_METHOD.into()))
            }
            StatusOutcome::Failed => {
                let message = match status {
                    Some(_) => GENERIC_FAILURE.into(),
                    None => {
                        let err = CheckoutError::UnknownStatus(raw.into());
                        tracing::warn!(session_id = %session.id, error = %err, "Treating payment as failed");
                        err.user_message()
                    }
                };
                session.transition(CheckoutState::IntentFailed)?;
                Ok(CheckoutView::Retry {
                    session_id: session.id.clone(),
                    action: RetryAction::CreateIntent,
                    message,
                })
            }
        }
    }

    fn payment_form_view(
        &self,
        session: &CheckoutSession,
        error: Option<String>,
    ) -> Result<CheckoutView> {
        let client_secret =
            session
                .client_secret
                .clone()
                .ok_or(CheckoutError::InvalidTransition {
                    from: session.state(),
                    to: CheckoutState::AwaitingPayment,
                })?;
        let plan = self.session_plan(session)?;

        Ok(CheckoutView::PaymentForm {
            session_id: session.id.clone(),
            publishable_key: self.config.publishable_key.clone(),
            client_secret,
            return_url: self.config.return_url(&session.id),
            plan: PlanSummary::new(plan, session.cycle),
            error,
        })
    }

    fn success_view(&self, session: &CheckoutSession) -> Result<CheckoutView> {
        let plan = self.session_plan(session)?;
        Ok(CheckoutView::Success {
            message: format!(
                "Payment successful! Welcome to {}. Taking you to your dashboard...",
                plan.display_name
            ),
            redirect_to: self.config.dashboard_path.clone(),
            delay_ms: u64::try_from(self.config.success_redirect_delay.as_millis())
                .unwrap_or(u64::MAX),
        })
    }

    fn invalid_plan_view(&self, requested: Option<&str>) -> CheckoutView {
        CheckoutView::InvalidPlan {
            requested: requested.map(str::to_string),
            message: CheckoutError::InvalidPlan(requested.unwrap_or_default().into())
                .user_message(),
            plans_url: self.config.plans_path.clone(),
        }
    }

    fn plan_id_for<'a>(&'a self, params: &'a EntryParams) -> &'a str {
        params
            .requested_plan()
            .unwrap_or_else(|| self.config.default_plan.as_str())
    }

    fn session_plan(&self, session: &CheckoutSession) -> Result<&Plan> {
        session
            .plan_id
            .as_ref()
            .and_then(|id| self.catalog.resolve(id.as_str()))
            .ok_or_else(|| {
                CheckoutError::InvalidPlan(
                    session.plan_id.as_ref().map(ToString::to_string).unwrap_or_default(),
                )
            })
    }

    /// Only the user who started a session may act on it
    async fn authorize(&self, session: &CheckoutSession, token: Option<&str>) -> Result<()> {
        let identity = self
            .lookup_identity(token)
            .await
            .ok_or(CheckoutError::AuthRequired)?;
        if session.user_id() != Some(identity.user_id.as_str()) {
            tracing::warn!(
                session_id = %session.id,
                user_id = %identity.user_id,
                "Checkout session belongs to another user"
            );
            return Err(CheckoutError::IntentMismatch(
                session.intent_id.clone().unwrap_or_else(|| session.id.to_string()),
            ));
        }
        Ok(())
    }

    /// Identity lookup failures count as signed out
    async fn lookup_identity(&self, token: Option<&str>) -> Option<Identity> {
        match self.identity.current_user(token).await {
            Ok(identity) => identity,
            Err(err) => {
                tracing::warn!(error = %err, "Identity lookup failed; treating as signed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use crate::provider::{ClientSecret, PaymentIntent};

    #[derive(Default)]
    struct FakePayments {
        created: AtomicUsize,
        status: Mutex<String>,
        fail_retrieve: AtomicBool,
    }

    #[async_trait]
    impl PaymentProvider for FakePayments {
        fn name(&self) -> &str {
            "fake"
        }

        async fn create_payment_intent(&self, request: &IntentRequest) -> Result<PaymentIntent> {
            let n = self.created.fetch_add(1, Ordering::SeqCst);
            Ok(PaymentIntent {
                id: format!("pi_{n}"),
                client_secret: ClientSecret::new(format!("pi_{n}_secret")),
                status: "requires_payment_method".into(),
                amount_cents: request.amount_cents,
                metadata: request.metadata.to_map(),
            })
        }

        async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent> {
            if self.fail_retrieve.load(Ordering::SeqCst) {
                return Err(CheckoutError::Provider("connection reset".into()));
            }
            Ok(PaymentIntent {
                id: intent_id.into(),
                client_secret: ClientSecret::new(format!("{intent_id}_secret")),
                status: self.status.lock().unwrap().clone(),
                amount_cents: 19700,
                metadata: HashMap::new(),
            })
        }
    }

    struct SignedIn;

    #[async_trait]
    impl IdentityProvider for SignedIn {
        async fn current_user(&self, token: Option<&str>) -> Result<Option<Identity>> {
            Ok(token.map(|t| Identity::new(t, format!("{t}@example.test"))))
        }
    }

    struct NoopAccounts;

    #[async_trait]
    impl AccountService for NoopAccounts {
        async fn activate_free_plan(&self, _user_id: &str, _plan_id: &PlanId) -> Result<()> {
            Ok(())
        }
    }

    /// Fails the first activation, then succeeds
    #[derive(Default)]
    struct FlakyAccounts {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AccountService for FlakyAccounts {
        async fn activate_free_plan(&self, _user_id: &str, _plan_id: &PlanId) -> Result<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(CheckoutError::Storage("account store offline".into()));
            }
            Ok(())
        }
    }

    fn controller_with(catalog: PlanCatalog, payments: Arc<FakePayments>) -> CheckoutController {
        CheckoutController::new(
            Arc::new(catalog),
            CheckoutConfig::new("pk_test", "https://mm.test"),
            payments,
            Arc::new(SignedIn),
            Arc::new(NoopAccounts),
        )
        .unwrap()
    }

    fn controller(payments: Arc<FakePayments>) -> CheckoutController {
        controller_with(PlanCatalog::midnight_magnolia().unwrap(), payments)
    }

    #[tokio::test]
    async fn test_absent_plan_falls_back_to_default() {
        let payments = Arc::new(FakePayments::default());
        let checkout = controller(payments)
            .start(&EntryParams::default(), Some("u1"))
            .await
            .unwrap();
        match checkout.view {
            CheckoutView::PaymentForm { plan, .. } => {
                assert_eq!(plan.id.as_str(), "golden-grove");
                assert_eq!(plan.cycle, BillingCycle::Yearly);
            }
            other => panic!("expected payment form, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_plan_offers_way_back() {
        let payments = Arc::new(FakePayments::default());
        let checkout = controller(payments.clone())
            .start(&EntryParams::new("platinum-orchard", "monthly"), Some("u1"))
            .await
            .unwrap();
        assert_eq!(checkout.session.state(), CheckoutState::InvalidPlan);
        match checkout.view {
            CheckoutView::InvalidPlan { requested, plans_url, .. } => {
                assert_eq!(requested.as_deref(), Some("platinum-orchard"));
                assert_eq!(plans_url, "/pricing");
            }
            other => panic!("expected invalid plan, got {other:?}"),
        }
        assert_eq!(payments.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_priced_paid_plan_is_refused() {
        let catalog = PlanCatalog::new(vec![Plan::paid("golden-grove", "Golden Grove", 0, 0, "")])
            .unwrap();
        let payments = Arc::new(FakePayments::default());
        let checkout = controller_with(catalog, payments.clone())
            .start(&EntryParams::new("golden-grove", "yearly"), Some("u1"))
            .await
            .unwrap();
        assert!(matches!(checkout.view, CheckoutView::InvalidPlan { .. }));
        assert_eq!(payments.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resume_reuses_client_secret() {
        let payments = Arc::new(FakePayments::default());
        let controller = controller(payments.clone());
        let params = EntryParams::new("golden-grove", "yearly");

        let first = controller.start(&params, Some("u1")).await.unwrap();
        let second = controller
            .resume(first.session.clone(), &params, Some("u1"))
            .await
            .unwrap();

        assert_eq!(payments.created.load(Ordering::SeqCst), 1);
        assert_eq!(first.session.id, second.session.id);
        assert_eq!(first.view, second.view);
    }

    #[tokio::test]
    async fn test_resume_with_other_cycle_starts_over() {
        let payments = Arc::new(FakePayments::default());
        let controller = controller(payments.clone());

        let first = controller
            .start(&EntryParams::new("golden-grove", "yearly"), Some("u1"))
            .await
            .unwrap();
        let second = controller
            .resume(first.session, &EntryParams::new("golden-grove", "monthly"), Some("u1"))
            .await
            .unwrap();

        assert_eq!(payments.created.load(Ordering::SeqCst), 2);
        match second.view {
            CheckoutView::PaymentForm { plan, .. } => assert_eq!(plan.amount_cents, 2200),
            other => panic!("expected payment form, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_complete_rejects_foreign_intent() {
        let payments = Arc::new(FakePayments::default());
        let controller = controller(payments);
        let mut checkout = controller
            .start(&EntryParams::new("golden-grove", "yearly"), Some("u1"))
            .await
            .unwrap();

        let err = controller
            .complete(
                &mut checkout.session,
                &ReturnParams {
                    payment_intent: "pi_someone_else".into(),
                    redirect_status: None,
                },
                Some("u1"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::IntentMismatch(_)));
    }

    #[tokio::test]
    async fn test_processing_does_not_redirect() {
        let payments = Arc::new(FakePayments::default());
        *payments.status.lock().unwrap() = "processing".into();
        let controller = controller(payments);
        let mut checkout = controller
            .start(&EntryParams::new("crescent-bloom", "monthly"), Some("u1"))
            .await
            .unwrap();
        let intent_id = checkout.session.intent_id.clone().unwrap();

        let view = controller
            .complete(
                &mut checkout.session,
                &ReturnParams {
                    payment_intent: intent_id,
                    redirect_status: Some("succeeded".into()),
                },
                Some("u1"),
            )
            .await
            .unwrap();
        assert!(matches!(view, CheckoutView::Processing { .. }));
        assert_eq!(checkout.session.state(), CheckoutState::CompletePending);
    }

    #[tokio::test]
    async fn test_unknown_status_is_not_success() {
        let payments = Arc::new(FakePayments::default());
        *payments.status.lock().unwrap() = "mystery".into();
        let controller = controller(payments);
        let mut checkout = controller
            .start(&EntryParams::new("golden-grove", "yearly"), Some("u1"))
            .await
            .unwrap();
        let intent_id = checkout.session.intent_id.clone().unwrap();

        let view = controller
            .complete(
                &mut checkout.session,
                &ReturnParams {
                    payment_intent: intent_id,
                    redirect_status: None,
                },
                Some("u1"),
            )
            .await
            .unwrap();
        match view {
            CheckoutView::Retry { action, message, .. } => {
                assert_eq!(action, RetryAction::CreateIntent);
                assert_eq!(message, CheckoutError::UnknownStatus("mystery".into()).user_message());
                assert!(!message.contains("mystery"));
            }
            other => panic!("expected retry, got {other:?}"),
        }
        assert_eq!(checkout.session.state(), CheckoutState::IntentFailed);
        assert!(checkout.session.payment_status.is_none());
    }

    #[tokio::test]
    async fn test_retry_from_wrong_state_is_rejected() {
        let payments = Arc::new(FakePayments::default());
        let controller = controller(payments);
        let mut checkout = controller
            .start(&EntryParams::new("nope", "yearly"), Some("u1"))
            .await
            .unwrap();
        assert!(controller.retry(&mut checkout.session, Some("u1")).await.is_err());
    }

    #[tokio::test]
    async fn test_free_activation_failure_can_be_retried() {
        let accounts = Arc::new(FlakyAccounts::default());
        let controller = CheckoutController::new(
            Arc::new(PlanCatalog::midnight_magnolia().unwrap()),
            CheckoutConfig::new("pk_test", "https://mm.test"),
            Arc::new(FakePayments::default()),
            Arc::new(SignedIn),
            accounts.clone(),
        )
        .unwrap();

        let mut checkout = controller
            .start(&EntryParams::new("magnolia-seed", "monthly"), Some("u1"))
            .await
            .unwrap();
        assert_eq!(checkout.session.state(), CheckoutState::ActivationFailed);
        assert!(matches!(
            checkout.view,
            CheckoutView::Retry { action: RetryAction::ActivateFreePlan, .. }
        ));

        let view = controller
            .retry(&mut checkout.session, Some("u1"))
            .await
            .unwrap();
        assert_eq!(
            view,
            CheckoutView::Redirect {
                location: "/dashboard".into()
            }
        );
        assert_eq!(checkout.session.state(), CheckoutState::Complete);
        assert_eq!(accounts.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_status_lookup_failure_keeps_session_waiting() {
        let payments = Arc::new(FakePayments::default());
        let controller = controller(payments.clone());
        let mut checkout = controller
            .start(&EntryParams::new("golden-grove", "yearly"), Some("u1"))
            .await
            .unwrap();
        let intent_id = checkout.session.intent_id.clone().unwrap();
        payments.fail_retrieve.store(true, Ordering::SeqCst);

        let view = controller
            .complete(
                &mut checkout.session,
                &ReturnParams {
                    payment_intent: intent_id,
                    redirect_status: Some("succeeded".into()),
                },
                Some("u1"),
            )
            .await
            .unwrap();
        match view {
            CheckoutView::Retry { action, message, .. } => {
                assert_eq!(action, RetryAction::CheckStatus);
                assert!(!message.contains("connection reset"));
            }
            other => panic!("expected status retry, got {other:?}"),
        }
        assert_eq!(checkout.session.state(), CheckoutState::AwaitingPayment);
        assert!(checkout.session.client_secret.is_some());
    }

    #[tokio::test]
    async fn test_session_is_bound_to_its_user() {
        let payments = Arc::new(FakePayments::default());
        *payments.status.lock().unwrap() = "succeeded".into();
        let controller = controller(payments);
        let mut checkout = controller
            .start(&EntryParams::new("golden-grove", "yearly"), Some("u1"))
            .await
            .unwrap();
        let params = ReturnParams {
            payment_intent: checkout.session.intent_id.clone().unwrap(),
            redirect_status: Some("succeeded".into()),
        };

        let err = controller
            .complete(&mut checkout.session, &params, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::AuthRequired));

        let err = controller
            .complete(&mut checkout.session, &params, Some("u2"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::IntentMismatch(_)));

        let err = controller
            .retry(&mut checkout.session, Some("u2"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::IntentMismatch(_)));
        assert_eq!(checkout.session.state(), CheckoutState::AwaitingPayment);

        controller
            .complete(&mut checkout.session, &params, Some("u1"))
            .await
            .unwrap();
        assert_eq!(checkout.session.state(), CheckoutState::Complete);
    }

    #[tokio::test]
    async fn test_unsupported_currency_is_fatal() {
        struct UsdOnly;

        #[async_trait]
        impl PaymentProvider for UsdOnly {
            fn name(&self) -> &str {
                "usd-only"
            }

            fn supports_currency(&self, currency: &str) -> bool {
                currency == "usd"
            }

            async fn create_payment_intent(&self, _request: &IntentRequest) -> Result<PaymentIntent> {
                Err(CheckoutError::IntentCreation("unused".into()))
            }

            async fn retrieve_payment_intent(&self, _intent_id: &str) -> Result<PaymentIntent> {
                Err(CheckoutError::Provider("unused".into()))
            }
        }

        let build = |currency: &str| {
            CheckoutController::new(
                Arc::new(PlanCatalog::midnight_magnolia().unwrap()),
                CheckoutConfig::new("pk_test", "https://mm.test").with_currency(currency),
                Arc::new(UsdOnly),
                Arc::new(SignedIn),
                Arc::new(NoopAccounts),
            )
        };

        assert!(build("usd").is_ok());
        assert!(matches!(build("xyz"), Err(CheckoutError::Config(_))));
        // Default check rejects codes that are not three lowercase letters
        assert!(!FakePayments::default().supports_currency("us"));
    }
}
