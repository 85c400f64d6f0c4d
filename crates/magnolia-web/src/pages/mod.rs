//! Pages

mod checkout;
mod complete;
mod pricing;

pub use checkout::CheckoutPage;
pub use complete::CompletePage;
pub use pricing::PricingPage;
