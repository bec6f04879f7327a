use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use shopcart_cart::GuestToken;
use shopcart_core::{OwnerId, OwnerRef, TenantId};

use crate::app::errors;
use crate::context::{ShopperContext, TenantContext};

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const GUEST_TOKEN_HEADER: &str = "x-guest-token";

/// Resolves a bearer token to an authenticated owner id.
///
/// The real resolver belongs to the host platform; the cart only needs
/// "who is this, if anyone". `None` means unauthenticated, not an error.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, token: &str) -> Option<OwnerId>;
}

/// Dev/test resolver: the bearer token is the owner's UUID in plain text.
#[derive(Debug, Default)]
pub struct PlainUuidResolver;

impl IdentityResolver for PlainUuidResolver {
    fn resolve(&self, token: &str) -> Option<OwnerId> {
        Uuid::parse_str(token).ok().map(OwnerId::from_uuid)
    }
}

#[derive(Clone)]
pub struct IdentityState {
    pub resolver: Arc<dyn IdentityResolver>,
    /// Kind tag stamped onto resolved owners, from [`shopcart_cart::CartConfig`].
    pub owner_kind: String,
}

/// Resolve tenant and shopper for every cart route.
///
/// The tenant header is mandatory. Identity is optional here: the bearer
/// token (if present and valid) yields an owner, `X-Guest-Token` a guest,
/// and the handlers decide whether an absent shopper is acceptable.
pub async fn context_middleware(
    State(state): State<IdentityState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let tenant_id = extract_tenant(req.headers())?;

    let owner = extract_bearer(req.headers())
        .and_then(|token| state.resolver.resolve(token))
        .map(|id| OwnerRef::new(state.owner_kind.clone(), id));
    let guest = req
        .headers()
        .get(GUEST_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(GuestToken::new);

    req.extensions_mut().insert(TenantContext::new(tenant_id));
    req.extensions_mut().insert(ShopperContext::new(owner, guest));

    Ok(next.run(req).await)
}

fn extract_tenant(headers: &HeaderMap) -> Result<TenantId, Response> {
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| {
            errors::json_message(
                StatusCode::BAD_REQUEST,
                "missing or invalid X-Tenant-Id header",
                serde_json::Value::Null,
            )
        })
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
