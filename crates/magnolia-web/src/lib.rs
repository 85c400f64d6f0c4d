//! Midnight Magnolia Web Frontend
//!
//! Leptos-based WASM frontend for pricing and checkout. Every checkout
//! screen is driven by the `CheckoutView` the server returns.

mod api;
mod app;
mod components;
mod pages;
mod stripe_js;

pub use app::App;

use wasm_bindgen::prelude::*;

/// WASM entry point
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    leptos::mount::mount_to_body(App);
}
