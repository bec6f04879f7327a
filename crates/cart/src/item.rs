//! Cart item model: one row per (shopper, product) pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shopcart_core::{OwnerRef, ProductRef, TenantId};

/// Cart item identifier, store-assigned at creation (UUIDv7, time-ordered).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartItemId(pub Uuid);

impl CartItemId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for CartItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for CartItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Opaque caller-generated token identifying an unauthenticated guest.
///
/// Replaces the server-session design: the client mints the token and sends
/// it on every request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestToken(String);

impl GuestToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Who a cart row belongs to: an authenticated owner or a guest token.
///
/// The enum makes "exactly one of owner/guest" a construction-time
/// invariant; malformed rows cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShopperRef {
    Owner(OwnerRef),
    Guest(GuestToken),
}

impl ShopperRef {
    pub fn owner(owner: OwnerRef) -> Self {
        Self::Owner(owner)
    }

    pub fn guest(token: impl Into<String>) -> Self {
        Self::Guest(GuestToken::new(token))
    }

    pub fn as_owner(&self) -> Option<&OwnerRef> {
        match self {
            Self::Owner(owner) => Some(owner),
            Self::Guest(_) => None,
        }
    }
}

/// A quantity of a purchasable product held in a shopper's cart.
///
/// While the row exists `quantity >= 1`; mutations that would drop it to
/// zero or below delete the row instead. `expires_at = None` means the row
/// never expires (legacy/unbounded carts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub tenant_id: TenantId,
    pub shopper: ShopperRef,
    pub product: ProductRef,
    pub quantity: u32,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    pub fn new(
        tenant_id: TenantId,
        shopper: ShopperRef,
        product: ProductRef,
        quantity: u32,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CartItemId::new(),
            tenant_id,
            shopper,
            product,
            quantity,
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// A row with `expires_at` in the past is expired: excluded from fresh
    /// reads and reservation sums, eligible for sweep-deletion.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now,
            None => false,
        }
    }
}
