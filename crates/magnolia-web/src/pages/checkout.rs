//! Checkout Page

use leptos::prelude::*;
use leptos_router::hooks::use_query_map;
use magnolia_checkout::{RetryAction, SessionId};

use crate::api::{self, CheckoutQuery, CheckoutResponse};
use crate::components::{CheckoutScreen, follow_up};

#[component]
pub fn CheckoutPage() -> impl IntoView {
    let query = use_query_map();
    let (result, set_result) = signal(None::<Result<CheckoutResponse, String>>);

    let params = query.get_untracked();
    let request = CheckoutQuery {
        plan: params.get("plan"),
        cycle: params.get("cycle"),
        session: params.get("session").or_else(api::remembered_session),
    };

    leptos::task::spawn_local(async move {
        let response = api::start_checkout(&request).await;
        if let Ok(response) = &response {
            follow_up(response);
        }
        set_result.set(Some(response));
    });

    let on_retry = Callback::new(move |(session_id, _): (SessionId, RetryAction)| {
        set_result.set(None);
        leptos::task::spawn_local(async move {
            let response = api::retry_checkout(&session_id).await;
            if let Ok(response) = &response {
                follow_up(response);
            }
            set_result.set(Some(response));
        });
    });

    view! {
        <div class="checkout">
            <h1>"Checkout"</h1>
            <CheckoutScreen result=result on_retry=on_retry />
        </div>
    }
}
