use shopcart_cart::{GuestToken, ShopperRef};
use shopcart_core::{OwnerRef, TenantId};

/// Tenant context for a request.
///
/// Immutable and present on every cart route; requests without a resolvable
/// tenant are rejected in the middleware.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Shopper context for a request: the authenticated owner, the guest token,
/// both, or neither.
///
/// Whether an absent shopper is an error depends on the operation, so the
/// middleware never rejects on it; handlers pass `shopper()` down and let the
/// actions decide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShopperContext {
    owner: Option<OwnerRef>,
    guest: Option<GuestToken>,
}

impl ShopperContext {
    pub fn new(owner: Option<OwnerRef>, guest: Option<GuestToken>) -> Self {
        Self { owner, guest }
    }

    pub fn owner(&self) -> Option<&OwnerRef> {
        self.owner.as_ref()
    }

    /// The effective shopper: an authenticated owner wins over a guest token
    /// sent on the same request.
    pub fn shopper(&self) -> Option<ShopperRef> {
        if let Some(owner) = &self.owner {
            return Some(ShopperRef::owner(owner.clone()));
        }
        self.guest.clone().map(ShopperRef::Guest)
    }
}
