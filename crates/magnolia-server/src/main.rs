//! Midnight Magnolia checkout server
//!
//! Axum-based server exposing the checkout controller as a JSON API and
//! serving the WASM frontend.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use magnolia_checkout::{
    CheckoutController, Identity, MemoryCheckoutSessionStore, PaymentProvider, PlanCatalog,
};
use magnolia_payments::{MemoryAccountStore, MemoryIdentityStore, MockPaymentProvider, StripeProvider};

use crate::config::ServerConfig;
use crate::handlers::{
    complete_checkout, health_check, list_plans, retry_checkout, start_checkout, stripe_webhook,
};
use crate::state::AppState;

/// API routes
fn api_router(state: AppState) -> Router {
    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/plans", get(list_plans))
        // Checkout
        .route("/api/checkout", get(start_checkout))
        .route("/api/checkout/complete", get(complete_checkout))
        .route("/api/checkout/{session}/retry", post(retry_checkout))
        // Payments
        .route("/webhook/stripe", post(stripe_webhook))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let catalog = Arc::new(PlanCatalog::midnight_magnolia()?);

    // Missing payment configuration is fatal: no checkout could succeed
    let config = ServerConfig::from_env(&catalog)?;

    // Payment provider: one handle for the whole process
    let payments: Arc<dyn PaymentProvider> = if config.use_mock_provider {
        tracing::warn!("⚠ Using mock payment provider - no real charges");
        Arc::new(MockPaymentProvider::new())
    } else {
        let secret = config.stripe_secret_key.as_deref().unwrap_or_default();
        tracing::info!("✓ Stripe configured");
        Arc::new(StripeProvider::new(secret))
    };

    if config.webhook_secret.is_none() {
        tracing::warn!("⚠ STRIPE_WEBHOOK_SECRET not set - paid plans will not be activated");
    }

    // Identity: tokens issued by the sign-in surface
    let identity = Arc::new(MemoryIdentityStore::new());
    if let (Ok(token), Ok(user_id)) = (
        std::env::var("DEV_SESSION_TOKEN"),
        std::env::var("DEV_USER_ID"),
    ) {
        let email = std::env::var("DEV_USER_EMAIL").unwrap_or_default();
        identity.insert(token, Identity::new(user_id.clone(), email)).await;
        tracing::info!(user_id = %user_id, "Seeded development session");
    }

    let accounts = Arc::new(MemoryAccountStore::new());

    let controller = CheckoutController::new(
        catalog.clone(),
        config.checkout.clone(),
        payments,
        identity,
        accounts.clone(),
    )?;

    // Build application state
    let state = AppState {
        controller: Arc::new(controller),
        sessions: Arc::new(MemoryCheckoutSessionStore::new()),
        accounts,
        catalog,
        webhook_secret: config.webhook_secret.as_deref().map(Arc::from),
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Static files (WASM frontend); unknown paths fall through to the app shell
    let index = format!("{}/index.html", config.static_dir);
    let frontend = ServeDir::new(&config.static_dir).fallback(ServeFile::new(index));

    let app = api_router(state)
        .fallback_service(frontend)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🌙 magnolia-server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                      - Health check");
    tracing::info!("  GET  /api/plans                   - Plan catalog");
    tracing::info!("  GET  /api/checkout                - Start/resume checkout");
    tracing::info!("  POST /api/checkout/{{session}}/retry - Retry failed step");
    tracing::info!("  GET  /api/checkout/complete       - Return from payment");
    tracing::info!("  POST /webhook/stripe              - Stripe webhook");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use magnolia_checkout::{CheckoutConfig, ClientSecret};
    use serde_json::Value;
    use tower::ServiceExt;

    const TOKEN: &str = "tok_test";
    const OTHER_TOKEN: &str = "tok_other";

    async fn test_app() -> (Router, Arc<MockPaymentProvider>) {
        let catalog = Arc::new(PlanCatalog::midnight_magnolia().unwrap());
        let payments = Arc::new(MockPaymentProvider::new());
        let identity = Arc::new(MemoryIdentityStore::new());
        identity
            .insert(TOKEN, Identity::new("user_1", "member@example.test"))
            .await;
        identity
            .insert(OTHER_TOKEN, Identity::new("user_2", "other@example.test"))
            .await;
        let accounts = Arc::new(MemoryAccountStore::new());

        let controller = CheckoutController::new(
            catalog.clone(),
            CheckoutConfig::new("pk_test", "http://localhost:3000"),
            payments.clone(),
            identity,
            accounts.clone(),
        )
        .unwrap();

        let state = AppState {
            controller: Arc::new(controller),
            sessions: Arc::new(MemoryCheckoutSessionStore::new()),
            accounts,
            catalog,
            webhook_secret: None,
        };
        (api_router(state), payments)
    }

    async fn get_json(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder().uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = app
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn post_status(app: &Router, uri: &str, token: Option<&str>) -> StatusCode {
        let mut request = Request::builder().method("POST").uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        app.clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app().await;
        let (status, body) = get_json(&app, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["plans"], 4);
        assert_eq!(body["webhook_configured"], false);
    }

    #[tokio::test]
    async fn test_checkout_requires_sign_in() {
        let (app, payments) = test_app().await;
        let (status, body) =
            get_json(&app, "/api/checkout?plan=golden-grove&cycle=yearly", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "auth_required");
        assert_eq!(body["view"]["view"], "redirect");
        assert_eq!(payments.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_checkout_resume_reuses_intent() {
        let (app, payments) = test_app().await;
        let (_, first) =
            get_json(&app, "/api/checkout?plan=golden-grove&cycle=yearly", Some(TOKEN)).await;
        assert_eq!(first["view"]["view"], "payment_form");

        let session = first["session_id"].as_str().unwrap();
        let uri = format!("/api/checkout?plan=golden-grove&cycle=yearly&session={session}");
        let (_, second) = get_json(&app, &uri, Some(TOKEN)).await;

        assert_eq!(second["session_id"], first["session_id"]);
        assert_eq!(second["view"]["client_secret"], first["view"]["client_secret"]);
        assert_eq!(payments.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_complete_with_success() {
        let (app, payments) = test_app().await;
        let (_, started) =
            get_json(&app, "/api/checkout?plan=crescent-bloom&cycle=monthly", Some(TOKEN)).await;
        let session = started["session_id"].as_str().unwrap().to_string();
        let secret = ClientSecret::new(started["view"]["client_secret"].as_str().unwrap());
        let intent_id = secret.intent_id().unwrap();

        payments.set_next_status("succeeded").await;
        let uri = format!(
            "/api/checkout/complete?session={session}&payment_intent={intent_id}&redirect_status=succeeded"
        );
        let (status, body) = get_json(&app, &uri, Some(TOKEN)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "complete");
        assert_eq!(body["view"]["view"], "success");
        assert_eq!(body["view"]["redirect_to"], "/dashboard");

        // Finished sessions are dropped from the store
        let retry = format!("/api/checkout/{session}/retry");
        assert_eq!(post_status(&app, &retry, Some(TOKEN)).await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_session_only_usable_by_its_owner() {
        let (app, _) = test_app().await;
        let (_, started) =
            get_json(&app, "/api/checkout?plan=golden-grove&cycle=yearly", Some(TOKEN)).await;
        let session = started["session_id"].as_str().unwrap().to_string();
        let secret = ClientSecret::new(started["view"]["client_secret"].as_str().unwrap());
        let intent_id = secret.intent_id().unwrap();

        let retry = format!("/api/checkout/{session}/retry");
        assert_eq!(post_status(&app, &retry, None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(post_status(&app, &retry, Some(OTHER_TOKEN)).await, StatusCode::FORBIDDEN);
        assert_eq!(post_status(&app, &retry, Some(TOKEN)).await, StatusCode::OK);

        let complete = format!("/api/checkout/complete?session={session}&payment_intent={intent_id}");
        let (status, body) = get_json(&app, &complete, Some(OTHER_TOKEN)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "INTENT_MISMATCH");
        assert!(body["view"].is_null());
    }

    #[tokio::test]
    async fn test_retry_unknown_session() {
        let (app, _) = test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/checkout/nope/retry")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_webhook_disabled_without_secret() {
        let (app, _) = test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook/stripe")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
