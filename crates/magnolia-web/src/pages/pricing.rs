//! Pricing Page

use leptos::prelude::*;
use magnolia_checkout::BillingCycle;

use crate::api::{self, PlanListing};

fn checkout_href(plan: &PlanListing, cycle: BillingCycle) -> String {
    if plan.plan.free_tier {
        format!("/checkout?plan={}", plan.plan.id)
    } else {
        format!("/checkout?plan={}&cycle={cycle}", plan.plan.id)
    }
}

#[component]
pub fn PricingPage() -> impl IntoView {
    let (plans, set_plans) = signal(None::<Result<Vec<PlanListing>, String>>);
    let (cycle, set_cycle) = signal(BillingCycle::Yearly);

    leptos::task::spawn_local(async move {
        set_plans.set(Some(api::fetch_plans().await));
    });

    let plan_card = move |plan: PlanListing| {
        let label = if plan.plan.free_tier { "Start free" } else { "Subscribe" };
        let name = plan.plan.display_name.clone();
        let description = plan.plan.description.clone();
        let price = {
            let plan = plan.clone();
            move || match cycle.get() {
                BillingCycle::Monthly => format!("{}/month", plan.monthly_display),
                BillingCycle::Yearly => format!("{}/year", plan.yearly_display),
            }
        };
        let href = move || checkout_href(&plan, cycle.get());

        view! {
            <div class="plan">
                <h2>{name}</h2>
                <div class="price">{price}</div>
                <p>{description}</p>
                <a href=href class="btn btn-primary">{label}</a>
            </div>
        }
    };

    view! {
        <div class="pricing">
            <h1>"Memberships"</h1>
            <p class="subtitle">"Choose how you join the garden"</p>

            <div class="cycle-toggle">
                <button
                    class:active=move || cycle.get() == BillingCycle::Monthly
                    on:click=move |_| set_cycle.set(BillingCycle::Monthly)
                >
                    "Monthly"
                </button>
                <button
                    class:active=move || cycle.get() == BillingCycle::Yearly
                    on:click=move |_| set_cycle.set(BillingCycle::Yearly)
                >
                    "Yearly"
                </button>
            </div>

            {move || match plans.get() {
                None => view! { <p class="notice">"Loading plans..."</p> }.into_any(),
                Some(Err(message)) => view! { <p class="notice error">{message}</p> }.into_any(),
                Some(Ok(list)) => view! {
                    <div class="plans">{list.into_iter().map(plan_card).collect_view()}</div>
                }
                .into_any(),
            }}
        </div>
    }
}
