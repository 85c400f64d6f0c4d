//! HTTP Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
};
use serde::{Deserialize, Serialize};

use magnolia_checkout::{
    Checkout, CheckoutError, CheckoutSessionStore, CheckoutState, CheckoutView, EntryParams,
    Plan, ReturnParams, SessionId,
};
use magnolia_payments::WebhookHandler;

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub plans: usize,
    pub webhook_configured: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub retryable: bool,
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    #[serde(flatten)]
    pub plan: Plan,
    pub monthly_display: String,
    pub yearly_display: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutQuery {
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub cycle: Option<String>,
    /// Existing checkout session to resume
    #[serde(default)]
    pub session: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteQuery {
    #[serde(default)]
    pub session: Option<String>,
    pub payment_intent: String,
    #[serde(default)]
    pub redirect_status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub session_id: SessionId,
    pub state: CheckoutState,
    pub view: CheckoutView,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: &CheckoutError) -> ApiError {
    let (status, code) = match err {
        CheckoutError::Config(_) => (StatusCode::SERVICE_UNAVAILABLE, "CHECKOUT_UNAVAILABLE"),
        CheckoutError::InvalidPlan(_) => (StatusCode::NOT_FOUND, "INVALID_PLAN"),
        CheckoutError::AuthRequired => (StatusCode::UNAUTHORIZED, "AUTH_REQUIRED"),
        CheckoutError::IntentCreation(_) | CheckoutError::Provider(_) => {
            (StatusCode::BAD_GATEWAY, "PAYMENT_PROVIDER_ERROR")
        }
        CheckoutError::IntentMismatch(_) => (StatusCode::FORBIDDEN, "INTENT_MISMATCH"),
        CheckoutError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
        CheckoutError::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_STEP"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "CHECKOUT_ERROR"),
    };

    if status.is_server_error() {
        tracing::error!(error = %err, "Checkout request failed");
    } else {
        tracing::warn!(error = %err, "Checkout request rejected");
    }

    (
        status,
        Json(ErrorResponse {
            error: err.user_message(),
            code: code.into(),
            retryable: err.is_retryable(),
        }),
    )
}

/// Token from `Authorization: Bearer <token>`
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn save_session(state: &AppState, checkout: &Checkout) -> Result<(), ApiError> {
    // Sessions that cannot move again are not worth keeping
    let result = if checkout.session.state().is_final() {
        state.sessions.delete(&checkout.session.id)
    } else {
        state.sessions.save(&checkout.session)
    };
    result.map_err(|e| api_error(&e))
}

fn respond(checkout: Checkout) -> Json<CheckoutResponse> {
    let state = checkout.session.state();
    Json(CheckoutResponse {
        session_id: checkout.session.id,
        state,
        view: checkout.view,
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        plans: state.catalog.len(),
        webhook_configured: state.webhook_secret.is_some(),
    })
}

/// Plan catalog listing
pub async fn list_plans(State(state): State<AppState>) -> Json<Vec<PlanResponse>> {
    Json(
        state
            .catalog
            .plans()
            .map(|plan| PlanResponse {
                monthly_display: plan.display_price(magnolia_checkout::BillingCycle::Monthly),
                yearly_display: plan.display_price(magnolia_checkout::BillingCycle::Yearly),
                plan: plan.clone(),
            })
            .collect(),
    )
}

/// Start or resume a checkout
pub async fn start_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CheckoutQuery>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let token = bearer_token(&headers);
    let params = EntryParams {
        plan: query.plan,
        cycle: query.cycle,
    };

    let existing = match query.session.as_deref() {
        Some(id) => state
            .sessions
            .load(&SessionId::from_string(id))
            .map_err(|e| api_error(&e))?,
        None => None,
    };

    let checkout = match existing {
        Some(session) => state.controller.resume(session, &params, token).await,
        None => state.controller.start(&params, token).await,
    }
    .map_err(|e| api_error(&e))?;

    save_session(&state, &checkout)?;
    Ok(respond(checkout))
}

/// Retry intent creation or free activation
pub async fn retry_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let id = SessionId::from_string(session_id);
    let mut session = state
        .sessions
        .load(&id)
        .map_err(|e| api_error(&e))?
        .ok_or_else(|| api_error(&CheckoutError::SessionNotFound(id.to_string())))?;

    let view = state
        .controller
        .retry(&mut session, bearer_token(&headers))
        .await
        .map_err(|e| api_error(&e))?;

    let checkout = Checkout { session, view };
    save_session(&state, &checkout)?;
    Ok(respond(checkout))
}

/// Browser returned from the provider's confirmation step
pub async fn complete_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CompleteQuery>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let params = ReturnParams {
        payment_intent: query.payment_intent,
        redirect_status: query.redirect_status,
    };

    let existing = match query.session.as_deref() {
        Some(id) => state
            .sessions
            .load(&SessionId::from_string(id))
            .map_err(|e| api_error(&e))?,
        None => None,
    };

    let checkout = match existing {
        Some(mut session) => {
            let view = state
                .controller
                .complete(&mut session, &params, bearer_token(&headers))
                .await
                .map_err(|e| api_error(&e))?;
            Checkout { session, view }
        }
        None => state
            .controller
            .reconstruct(&params, bearer_token(&headers))
            .await
            .map_err(|e| api_error(&e))?,
    };

    save_session(&state, &checkout)?;
    Ok(respond(checkout))
}

/// Stripe webhook handler
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let secret = state.webhook_secret.as_deref().ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "Webhooks not configured".into(),
                code: "WEBHOOK_DISABLED".into(),
                retryable: false,
            }),
        )
    })?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Missing Stripe signature".into(),
                    code: "MISSING_SIGNATURE".into(),
                    retryable: false,
                }),
            )
        })?;

    let handler = WebhookHandler::new(state.accounts.clone(), state.catalog.clone());

    let event = handler.parse_event(&body, signature, secret).map_err(|e| {
        tracing::warn!("Webhook signature failed: {}", e);
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Invalid signature".into(),
                code: "INVALID_SIGNATURE".into(),
                retryable: false,
            }),
        )
    })?;

    handler.handle(&event).map_err(|e| {
        tracing::error!("Webhook processing error: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Webhook processing failed".into(),
                code: "WEBHOOK_ERROR".into(),
                retryable: e.is_retryable(),
            }),
        )
    })?;

    Ok(StatusCode::OK)
}
