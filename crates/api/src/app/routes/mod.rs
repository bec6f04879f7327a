use axum::Router;

pub mod cart;
pub mod system;

/// Router for all tenant-scoped cart endpoints (mounted under `/api`).
pub fn router() -> Router {
    Router::new().merge(cart::router())
}
