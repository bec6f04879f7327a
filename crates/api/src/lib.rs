//! `shopcart-api` — HTTP surface for the cart services.

pub mod app;
pub mod context;
pub mod middleware;
