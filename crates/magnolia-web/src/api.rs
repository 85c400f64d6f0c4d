//! API Client

use magnolia_checkout::{CheckoutState, CheckoutView, Plan, SessionId};
use serde::{Deserialize, Serialize};

/// Local storage key holding the sign-in token
const TOKEN_KEY: &str = "magnolia_session_token";

/// Session storage key for the in-progress checkout
const CHECKOUT_SESSION_KEY: &str = "magnolia_checkout_session";

/// Server response for every checkout step
#[derive(Clone, Debug, Deserialize)]
pub struct CheckoutResponse {
    pub session_id: SessionId,
    pub state: CheckoutState,
    pub view: CheckoutView,
}

/// Catalog entry with display prices
#[derive(Clone, Debug, Deserialize)]
pub struct PlanListing {
    #[serde(flatten)]
    pub plan: Plan,
    pub monthly_display: String,
    pub yearly_display: String,
}

/// Query for starting or resuming a checkout
#[derive(Clone, Debug, Default, Serialize)]
pub struct CheckoutQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

/// Query the provider appends to the return URL
#[derive(Clone, Debug, Serialize)]
pub struct CompleteQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    pub payment_intent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_status: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

fn origin() -> String {
    web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_else(|| "http://localhost:3000".into())
}

fn endpoint(path: &str) -> String {
    format!("{}{path}", origin())
}

/// Sign-in token, if the member is signed in
fn session_token() -> Option<String> {
    web_sys::window()
        .and_then(|w| w.local_storage().ok().flatten())
        .and_then(|storage| storage.get_item(TOKEN_KEY).ok().flatten())
        .filter(|token| !token.is_empty())
}

fn session_storage() -> Option<web_sys::Storage> {
    web_sys::window().and_then(|w| w.session_storage().ok().flatten())
}

/// Keep the checkout session so a reload resumes the same intent
pub fn remember_session(session_id: &SessionId) {
    if let Some(storage) = session_storage() {
        let _ = storage.set_item(CHECKOUT_SESSION_KEY, session_id.as_str());
    }
}

pub fn forget_session() {
    if let Some(storage) = session_storage() {
        let _ = storage.remove_item(CHECKOUT_SESSION_KEY);
    }
}

pub fn remembered_session() -> Option<String> {
    session_storage()
        .and_then(|storage| storage.get_item(CHECKOUT_SESSION_KEY).ok().flatten())
        .filter(|id| !id.is_empty())
}

fn authorized(request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match session_token() {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

async fn read_checkout(response: reqwest::Response) -> Result<CheckoutResponse, String> {
    if response.status().is_success() {
        response.json().await.map_err(|e| e.to_string())
    } else {
        let body: Option<ErrorBody> = response.json().await.ok();
        Err(body.map_or_else(|| "Request failed".into(), |b| b.error))
    }
}

/// Fetch the plan catalog
pub async fn fetch_plans() -> Result<Vec<PlanListing>, String> {
    let response = reqwest::Client::new()
        .get(endpoint("/api/plans"))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if response.status().is_success() {
        response.json().await.map_err(|e| e.to_string())
    } else {
        Err("Failed to load plans".into())
    }
}

/// Start a checkout, or resume one when `session` is set
pub async fn start_checkout(query: &CheckoutQuery) -> Result<CheckoutResponse, String> {
    let request = reqwest::Client::new()
        .get(endpoint("/api/checkout"))
        .query(query);

    let response = authorized(request).send().await.map_err(|e| e.to_string())?;
    read_checkout(response).await
}

/// Retry the failed step of a session
pub async fn retry_checkout(session_id: &SessionId) -> Result<CheckoutResponse, String> {
    let request = reqwest::Client::new()
        .post(endpoint(&format!("/api/checkout/{session_id}/retry")));

    let response = authorized(request).send().await.map_err(|e| e.to_string())?;
    read_checkout(response).await
}

/// Report the provider's return to the server
pub async fn complete_checkout(query: &CompleteQuery) -> Result<CheckoutResponse, String> {
    let request = reqwest::Client::new()
        .get(endpoint("/api/checkout/complete"))
        .query(query);

    let response = authorized(request).send().await.map_err(|e| e.to_string())?;
    read_checkout(response).await
}

/// Full navigation (sign-in, dashboard, provider return)
pub fn navigate(location: &str) {
    if let Some(window) = web_sys::window() {
        let _ = window.location().set_href(location);
    }
}
