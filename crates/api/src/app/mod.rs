//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store/catalog/hook/action wiring
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: consistent `{message, data}` error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};

use crate::middleware::{self, IdentityState, PlainUuidResolver};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
pub fn build_app(services: Arc<services::AppServices>) -> Router {
    let identity = IdentityState {
        resolver: Arc::new(PlainUuidResolver),
        owner_kind: services.config.owner_kind.clone(),
    };

    // Cart routes: require a tenant context.
    let cart = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            identity,
            middleware::context_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", cart)
}
