//! Stripe.js bindings
//!
//! Thin wrapper over the `Stripe` global loaded from js.stripe.com. Only
//! the Payment Element and `confirmPayment` are bound.

use magnolia_checkout::form::ConfirmRequest;
use magnolia_checkout::{ClientSecret, ConfirmError, ConfirmErrorKind, ConfirmOutcome};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

#[wasm_bindgen]
extern "C" {
    #[derive(Clone, Debug)]
    type Stripe;

    #[wasm_bindgen(catch, js_name = Stripe)]
    fn init_stripe(publishable_key: &str) -> Result<Stripe, JsValue>;

    #[wasm_bindgen(method)]
    fn elements(this: &Stripe, options: &JsValue) -> Elements;

    #[wasm_bindgen(method, catch, js_name = confirmPayment)]
    fn confirm_payment(this: &Stripe, options: &JsValue) -> Result<js_sys::Promise, JsValue>;

    #[derive(Clone, Debug)]
    type Elements;

    #[wasm_bindgen(method)]
    fn create(this: &Elements, kind: &str, options: &JsValue) -> PaymentElement;

    #[derive(Clone, Debug)]
    type PaymentElement;

    #[wasm_bindgen(method)]
    fn mount(this: &PaymentElement, selector: &str);
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ElementsOptions<'a> {
    client_secret: &'a str,
    appearance: Appearance,
}

#[derive(Serialize)]
struct Appearance {
    theme: &'static str,
}

#[derive(Serialize)]
struct ConfirmParams<'a> {
    return_url: &'a str,
}

/// Shape of the object `confirmPayment` resolves with
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmResult {
    error: Option<StripeError>,
    payment_intent: Option<IntentSnapshot>,
}

#[derive(Deserialize)]
struct StripeError {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct IntentSnapshot {
    status: String,
}

/// Mounted Payment Element and the Stripe instance that owns it
#[derive(Clone, Debug)]
pub struct StripeCheckout {
    stripe: Stripe,
    elements: Elements,
}

impl StripeCheckout {
    /// Create the Payment Element for `client_secret` and mount it at `selector`
    pub fn mount(
        publishable_key: &str,
        client_secret: &ClientSecret,
        selector: &str,
    ) -> Result<Self, JsValue> {
        let stripe = init_stripe(publishable_key)?;

        let options = serde_wasm_bindgen::to_value(&ElementsOptions {
            client_secret: client_secret.as_str(),
            appearance: Appearance { theme: "night" },
        })?;
        let elements = stripe.elements(&options);
        elements.create("payment", &JsValue::UNDEFINED).mount(selector);

        Ok(Self { stripe, elements })
    }

    /// Confirm the payment. Resolves without a redirect only when the
    /// payment method does not need one.
    pub async fn confirm(&self, request: &ConfirmRequest) -> Result<ConfirmOutcome, ConfirmError> {
        let options = self
            .confirm_options(&request.return_url)
            .map_err(|_| ConfirmError::new(ConfirmErrorKind::Other, None))?;

        let promise = self
            .stripe
            .confirm_payment(&options)
            .map_err(|_| ConfirmError::new(ConfirmErrorKind::Other, None))?;

        let value = JsFuture::from(promise)
            .await
            .map_err(|_| ConfirmError::new(ConfirmErrorKind::Other, None))?;

        let result: ConfirmResult = serde_wasm_bindgen::from_value(value)
            .map_err(|_| ConfirmError::new(ConfirmErrorKind::Other, None))?;

        if let Some(error) = result.error {
            let kind = error
                .kind
                .as_deref()
                .map_or(ConfirmErrorKind::Other, ConfirmErrorKind::from_provider);
            return Err(ConfirmError::new(kind, error.message));
        }

        Ok(match result.payment_intent {
            Some(intent) => ConfirmOutcome::Completed {
                status: intent.status,
            },
            None => ConfirmOutcome::Redirecting,
        })
    }

    fn confirm_options(&self, return_url: &str) -> Result<JsValue, JsValue> {
        let options = js_sys::Object::new();
        js_sys::Reflect::set(&options, &"elements".into(), &self.elements)?;
        js_sys::Reflect::set(
            &options,
            &"confirmParams".into(),
            &serde_wasm_bindgen::to_value(&ConfirmParams { return_url })?,
        )?;
        js_sys::Reflect::set(&options, &"redirect".into(), &"if_required".into())?;
        Ok(options.into())
    }
}
