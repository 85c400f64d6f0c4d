//! UI Components

use gloo_timers::future::TimeoutFuture;
use leptos::prelude::*;
use magnolia_checkout::{
    BillingCycle, CheckoutView, ClientSecret, ConfirmError, ConfirmErrorKind, ConfirmOutcome,
    PaymentForm, PlanSummary, RetryAction, SessionId,
};

use crate::api::{self, CheckoutResponse};
use crate::stripe_js::StripeCheckout;

const PAYMENT_ELEMENT: &str = "#payment-element";

fn cycle_suffix(cycle: BillingCycle) -> &'static str {
    match cycle {
        BillingCycle::Monthly => "/month",
        BillingCycle::Yearly => "/year",
    }
}

/// Navigation a view asks for. Renders stay side-effect free.
pub fn follow_up(response: &CheckoutResponse) {
    match &response.view {
        CheckoutView::Redirect { location } => api::navigate(location),
        CheckoutView::PaymentForm { session_id, .. } => api::remember_session(session_id),
        CheckoutView::Success {
            redirect_to,
            delay_ms,
            ..
        } => {
            api::forget_session();
            let location = redirect_to.clone();
            let delay = u32::try_from(*delay_ms).unwrap_or(u32::MAX);
            leptos::task::spawn_local(async move {
                TimeoutFuture::new(delay).await;
                api::navigate(&location);
            });
        }
        CheckoutView::InvalidPlan { .. }
        | CheckoutView::Retry { .. }
        | CheckoutView::Processing { .. } => {}
    }
}

/// Plan name and price next to the payment form
#[component]
pub fn PlanSummaryCard(plan: PlanSummary) -> impl IntoView {
    view! {
        <div class="plan-summary">
            <h2>{plan.display_name}</h2>
            <div class="price">
                {plan.display_price}
                <span>{cycle_suffix(plan.cycle)}</span>
            </div>
            <p class="description">{plan.description}</p>
        </div>
    }
}

/// Stripe Payment Element with a single submit button
#[component]
pub fn PaymentFormPanel(
    publishable_key: String,
    client_secret: ClientSecret,
    return_url: String,
    plan: PlanSummary,
    error: Option<String>,
) -> impl IntoView {
    let form = RwSignal::new(PaymentForm::new(client_secret.clone(), return_url).with_error(error));
    let stripe = StoredValue::new_local(None::<StripeCheckout>);

    // Mount once the container is in the DOM
    Effect::new(move |_| {
        if stripe.with_value(Option::is_some) {
            return;
        }
        match StripeCheckout::mount(&publishable_key, &client_secret, PAYMENT_ELEMENT) {
            Ok(checkout) => stripe.set_value(Some(checkout)),
            Err(_) => form.update(|f| {
                f.finish(Err(ConfirmError::new(ConfirmErrorKind::Other, None)));
            }),
        }
    });

    let submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();

        let Some(request) = form.try_update(PaymentForm::begin_submit).flatten() else {
            return;
        };
        let Some(checkout) = stripe.get_value() else {
            form.update(|f| {
                f.finish(Err(ConfirmError::new(ConfirmErrorKind::Other, None)));
            });
            return;
        };

        leptos::task::spawn_local(async move {
            let result = checkout.confirm(&request).await;
            let outcome = form.try_update(|f| f.finish(result)).flatten();

            // Resolved without a redirect: take the same return path anyway
            if let Some(ConfirmOutcome::Completed { status }) = outcome {
                if let Some(intent_id) = request.client_secret.intent_id() {
                    api::navigate(&format!(
                        "{}&payment_intent={intent_id}&redirect_status={status}",
                        request.return_url
                    ));
                }
            }
        });
    };

    view! {
        <form class="payment-form" on:submit=submit>
            <PlanSummaryCard plan=plan />
            <div id="payment-element"></div>
            <Show when=move || form.with(|f| f.error().is_some())>
                <p class="form-error">{move || form.with(|f| f.error().map(str::to_string))}</p>
            </Show>
            <button
                type="submit"
                class="btn btn-primary"
                disabled=move || form.with(|f| !f.can_submit())
            >
                {move || if form.with(PaymentForm::is_submitting) { "Processing..." } else { "Pay now" }}
            </button>
        </form>
    }
}

/// Renders whatever the last checkout step returned
#[component]
pub fn CheckoutScreen(
    result: ReadSignal<Option<Result<CheckoutResponse, String>>>,
    on_retry: Callback<(SessionId, RetryAction)>,
) -> impl IntoView {
    move || match result.get() {
        None => view! { <p class="notice">"Preparing your checkout..."</p> }.into_any(),
        Some(Err(message)) => view! {
            <div class="notice error">
                <p>{message}</p>
                <a href="/pricing" class="btn">"Back to plans"</a>
            </div>
        }
        .into_any(),
        Some(Ok(response)) => match response.view {
            CheckoutView::Redirect { .. } => {
                view! { <p class="notice">"Redirecting..."</p> }.into_any()
            }
            CheckoutView::PaymentForm {
                publishable_key,
                client_secret,
                return_url,
                plan,
                error,
                ..
            } => view! {
                <PaymentFormPanel
                    publishable_key=publishable_key
                    client_secret=client_secret
                    return_url=return_url
                    plan=plan
                    error=error
                />
            }
            .into_any(),
            CheckoutView::InvalidPlan {
                message, plans_url, ..
            } => view! {
                <div class="notice error">
                    <p>{message}</p>
                    <a href=plans_url class="btn">"View plans"</a>
                </div>
            }
            .into_any(),
            CheckoutView::Retry {
                session_id,
                action,
                message,
            } => view! {
                <div class="notice error">
                    <p>{message}</p>
                    <button class="btn btn-primary" on:click=move |_| on_retry.run((session_id.clone(), action))>
                        "Try again"
                    </button>
                </div>
            }
            .into_any(),
            CheckoutView::Processing { message } => view! {
                <div class="notice">
                    <p>{message}</p>
                </div>
            }
            .into_any(),
            CheckoutView::Success { message, .. } => view! {
                <div class="notice success">
                    <p>{message}</p>
                </div>
            }
            .into_any(),
        },
    }
}
