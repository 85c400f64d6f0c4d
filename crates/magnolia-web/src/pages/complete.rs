//! Return page after payment confirmation

use leptos::prelude::*;
use leptos_router::hooks::use_query_map;
use magnolia_checkout::{RetryAction, SessionId};

use crate::api::{self, CheckoutResponse, CompleteQuery};
use crate::components::{CheckoutScreen, follow_up};

fn report(request: CompleteQuery, set_result: WriteSignal<Option<Result<CheckoutResponse, String>>>) {
    leptos::task::spawn_local(async move {
        let response = api::complete_checkout(&request).await;
        if let Ok(response) = &response {
            follow_up(response);
        }
        set_result.set(Some(response));
    });
}

#[component]
pub fn CompletePage() -> impl IntoView {
    let query = use_query_map();
    let (result, set_result) = signal(None::<Result<CheckoutResponse, String>>);

    let params = query.get_untracked();
    let request = params.get("payment_intent").map(|payment_intent| CompleteQuery {
        session: params.get("session"),
        payment_intent,
        redirect_status: params.get("redirect_status"),
    });

    match request.clone() {
        Some(request) => report(request, set_result),
        None => set_result.set(Some(Err("This checkout link is incomplete.".into()))),
    }

    let on_retry = Callback::new(move |(session_id, action): (SessionId, RetryAction)| {
        set_result.set(None);
        match (action, request.clone()) {
            // Status lookup failed: ask again for the same intent
            (RetryAction::CheckStatus, Some(request)) => report(request, set_result),
            _ => leptos::task::spawn_local(async move {
                let response = api::retry_checkout(&session_id).await;
                if let Ok(response) = &response {
                    follow_up(response);
                }
                set_result.set(Some(response));
            }),
        }
    });

    view! {
        <div class="checkout">
            <h1>"Payment status"</h1>
            <CheckoutScreen result=result on_retry=on_retry />
        </div>
    }
}
