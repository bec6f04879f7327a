//! Cart item repository: the persistence seam of the cart core.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use thiserror::Error;

use shopcart_core::{OwnerRef, ProductRef, TenantId};

use crate::item::{CartItem, CartItemId, ShopperRef};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("storage lock poisoned")]
    Poisoned,
}

/// Repository contract for cart rows.
///
/// All reads and writes are tenant-scoped. `find` is deliberately
/// expiry-blind (an expired-but-unswept row can still be found and bumped,
/// which refreshes its expiry); `list_active` and `reserved_quantity`
/// enforce freshness (`expires_at IS NULL OR expires_at > now`).
///
/// Uniqueness of (shopper, product) is maintained by callers through
/// find-or-create, not by a store constraint. Two concurrent adds for the
/// same pair can therefore both observe "not found" and both insert; that
/// race is an accepted property of this design.
pub trait CartItemStore: Send + Sync {
    /// Find the row for a (shopper, product) pair, expired or not.
    fn find(
        &self,
        tenant_id: TenantId,
        shopper: &ShopperRef,
        product: &ProductRef,
    ) -> Result<Option<CartItem>, StoreError>;

    /// All non-expired rows for the shopper, oldest first.
    fn list_active(
        &self,
        tenant_id: TenantId,
        shopper: &ShopperRef,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartItem>, StoreError>;

    /// Insert or replace a row by id, returning the stored row.
    fn upsert(&self, item: CartItem) -> Result<CartItem, StoreError>;

    /// Delete by id. Returns whether a row was deleted.
    fn delete(&self, tenant_id: TenantId, id: CartItemId) -> Result<bool, StoreError>;

    /// Delete every row belonging to the shopper. Returns the count.
    fn clear_shopper(&self, tenant_id: TenantId, shopper: &ShopperRef)
        -> Result<u64, StoreError>;

    /// Delete every row owned by the given owner identity (anonymization).
    fn purge_owner(&self, tenant_id: TenantId, owner: &OwnerRef) -> Result<u64, StoreError>;

    /// All rows with a non-null, past expiry.
    fn expired(&self, tenant_id: TenantId, now: DateTime<Utc>)
        -> Result<Vec<CartItem>, StoreError>;

    /// Bulk-delete expired rows. Returns the count.
    fn delete_expired(&self, tenant_id: TenantId, now: DateTime<Utc>)
        -> Result<u64, StoreError>;

    /// Sum of non-expired quantities for a product: the soft reservation
    /// total consumed by the stock availability service.
    fn reserved_quantity(
        &self,
        tenant_id: TenantId,
        product: &ProductRef,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Distinct tenants with at least one row; drives the per-tenant sweeper.
    fn tenants(&self) -> Result<Vec<TenantId>, StoreError>;
}

impl<S> CartItemStore for Arc<S>
where
    S: CartItemStore + ?Sized,
{
    fn find(
        &self,
        tenant_id: TenantId,
        shopper: &ShopperRef,
        product: &ProductRef,
    ) -> Result<Option<CartItem>, StoreError> {
        (**self).find(tenant_id, shopper, product)
    }

    fn list_active(
        &self,
        tenant_id: TenantId,
        shopper: &ShopperRef,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartItem>, StoreError> {
        (**self).list_active(tenant_id, shopper, now)
    }

    fn upsert(&self, item: CartItem) -> Result<CartItem, StoreError> {
        (**self).upsert(item)
    }

    fn delete(&self, tenant_id: TenantId, id: CartItemId) -> Result<bool, StoreError> {
        (**self).delete(tenant_id, id)
    }

    fn clear_shopper(
        &self,
        tenant_id: TenantId,
        shopper: &ShopperRef,
    ) -> Result<u64, StoreError> {
        (**self).clear_shopper(tenant_id, shopper)
    }

    fn purge_owner(&self, tenant_id: TenantId, owner: &OwnerRef) -> Result<u64, StoreError> {
        (**self).purge_owner(tenant_id, owner)
    }

    fn expired(
        &self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartItem>, StoreError> {
        (**self).expired(tenant_id, now)
    }

    fn delete_expired(&self, tenant_id: TenantId, now: DateTime<Utc>) -> Result<u64, StoreError> {
        (**self).delete_expired(tenant_id, now)
    }

    fn reserved_quantity(
        &self,
        tenant_id: TenantId,
        product: &ProductRef,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        (**self).reserved_quantity(tenant_id, product, now)
    }

    fn tenants(&self) -> Result<Vec<TenantId>, StoreError> {
        (**self).tenants()
    }
}

/// In-memory store for dev/tests.
#[derive(Debug, Default)]
pub struct InMemoryCartItemStore {
    inner: RwLock<HashMap<(TenantId, CartItemId), CartItem>>,
}

impl InMemoryCartItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<(TenantId, CartItemId), CartItem>>, StoreError> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<(TenantId, CartItemId), CartItem>>, StoreError> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }
}

impl CartItemStore for InMemoryCartItemStore {
    fn find(
        &self,
        tenant_id: TenantId,
        shopper: &ShopperRef,
        product: &ProductRef,
    ) -> Result<Option<CartItem>, StoreError> {
        let map = self.read()?;
        Ok(map
            .values()
            .find(|item| {
                item.tenant_id == tenant_id
                    && &item.shopper == shopper
                    && &item.product == product
            })
            .cloned())
    }

    fn list_active(
        &self,
        tenant_id: TenantId,
        shopper: &ShopperRef,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartItem>, StoreError> {
        let map = self.read()?;
        let mut items: Vec<CartItem> = map
            .values()
            .filter(|item| {
                item.tenant_id == tenant_id && &item.shopper == shopper && !item.is_expired(now)
            })
            .cloned()
            .collect();
        items.sort_by_key(|item| (item.created_at, item.id.0));
        Ok(items)
    }

    fn upsert(&self, item: CartItem) -> Result<CartItem, StoreError> {
        let mut map = self.write()?;
        map.insert((item.tenant_id, item.id), item.clone());
        Ok(item)
    }

    fn delete(&self, tenant_id: TenantId, id: CartItemId) -> Result<bool, StoreError> {
        let mut map = self.write()?;
        Ok(map.remove(&(tenant_id, id)).is_some())
    }

    fn clear_shopper(
        &self,
        tenant_id: TenantId,
        shopper: &ShopperRef,
    ) -> Result<u64, StoreError> {
        let mut map = self.write()?;
        let before = map.len();
        map.retain(|_, item| !(item.tenant_id == tenant_id && &item.shopper == shopper));
        Ok((before - map.len()) as u64)
    }

    fn purge_owner(&self, tenant_id: TenantId, owner: &OwnerRef) -> Result<u64, StoreError> {
        let mut map = self.write()?;
        let before = map.len();
        map.retain(|_, item| {
            !(item.tenant_id == tenant_id && item.shopper.as_owner() == Some(owner))
        });
        Ok((before - map.len()) as u64)
    }

    fn expired(
        &self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartItem>, StoreError> {
        let map = self.read()?;
        let mut items: Vec<CartItem> = map
            .values()
            .filter(|item| item.tenant_id == tenant_id && item.is_expired(now))
            .cloned()
            .collect();
        items.sort_by_key(|item| (item.created_at, item.id.0));
        Ok(items)
    }

    fn delete_expired(&self, tenant_id: TenantId, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut map = self.write()?;
        let before = map.len();
        map.retain(|_, item| !(item.tenant_id == tenant_id && item.is_expired(now)));
        Ok((before - map.len()) as u64)
    }

    fn reserved_quantity(
        &self,
        tenant_id: TenantId,
        product: &ProductRef,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let map = self.read()?;
        Ok(map
            .values()
            .filter(|item| {
                item.tenant_id == tenant_id && &item.product == product && !item.is_expired(now)
            })
            .map(|item| u64::from(item.quantity))
            .sum())
    }

    fn tenants(&self) -> Result<Vec<TenantId>, StoreError> {
        let map = self.read()?;
        let mut tenants: Vec<TenantId> = map.keys().map(|(tenant, _)| *tenant).collect();
        tenants.sort_by_key(|t| *t.as_uuid());
        tenants.dedup();
        Ok(tenants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use shopcart_core::ProductId;

    fn fresh_item(tenant: TenantId, shopper: &ShopperRef, product_id: i64, qty: u32) -> CartItem {
        CartItem::new(
            tenant,
            shopper.clone(),
            ProductRef::new("product", ProductId(product_id)),
            qty,
            None,
            Utc::now(),
        )
    }

    #[test]
    fn find_matches_on_shopper_and_product() {
        let store = InMemoryCartItemStore::new();
        let tenant = TenantId::new();
        let guest = ShopperRef::guest("g1");
        let other_guest = ShopperRef::guest("g2");

        store.upsert(fresh_item(tenant, &guest, 7, 2)).unwrap();

        assert!(store
            .find(tenant, &guest, &ProductRef::new("product", ProductId(7)))
            .unwrap()
            .is_some());
        assert!(store
            .find(tenant, &other_guest, &ProductRef::new("product", ProductId(7)))
            .unwrap()
            .is_none());
        assert!(store
            .find(tenant, &guest, &ProductRef::new("product", ProductId(8)))
            .unwrap()
            .is_none());
    }

    #[test]
    fn find_sees_expired_rows_but_list_active_does_not() {
        let store = InMemoryCartItemStore::new();
        let tenant = TenantId::new();
        let guest = ShopperRef::guest("g1");
        let now = Utc::now();

        let mut item = fresh_item(tenant, &guest, 7, 2);
        item.expires_at = Some(now - Duration::minutes(5));
        store.upsert(item).unwrap();

        assert!(store
            .find(tenant, &guest, &ProductRef::new("product", ProductId(7)))
            .unwrap()
            .is_some());
        assert!(store.list_active(tenant, &guest, now).unwrap().is_empty());
    }

    #[test]
    fn reserved_quantity_excludes_expired_rows() {
        let store = InMemoryCartItemStore::new();
        let tenant = TenantId::new();
        let now = Utc::now();
        let product = ProductRef::new("product", ProductId(7));

        store
            .upsert(fresh_item(tenant, &ShopperRef::guest("g1"), 7, 2))
            .unwrap();
        let mut stale = fresh_item(tenant, &ShopperRef::guest("g2"), 7, 5);
        stale.expires_at = Some(now - Duration::minutes(1));
        store.upsert(stale).unwrap();

        assert_eq!(store.reserved_quantity(tenant, &product, now).unwrap(), 2);
    }

    #[test]
    fn rows_are_tenant_isolated() {
        let store = InMemoryCartItemStore::new();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();
        let guest = ShopperRef::guest("g1");
        let now = Utc::now();

        store.upsert(fresh_item(tenant_a, &guest, 7, 2)).unwrap();

        assert!(store.list_active(tenant_b, &guest, now).unwrap().is_empty());
        assert_eq!(
            store
                .reserved_quantity(tenant_b, &ProductRef::new("product", ProductId(7)), now)
                .unwrap(),
            0
        );

        let tenants = store.tenants().unwrap();
        assert!(tenants.contains(&tenant_a));
        assert!(!tenants.contains(&tenant_b));
    }

    #[test]
    fn purge_owner_only_touches_that_owner() {
        let store = InMemoryCartItemStore::new();
        let tenant = TenantId::new();
        let owner = OwnerRef::new("customer", shopcart_core::OwnerId::new());
        let owner_shopper = ShopperRef::owner(owner.clone());
        let guest = ShopperRef::guest("g1");
        let now = Utc::now();

        store.upsert(fresh_item(tenant, &owner_shopper, 7, 1)).unwrap();
        store.upsert(fresh_item(tenant, &owner_shopper, 8, 1)).unwrap();
        store.upsert(fresh_item(tenant, &guest, 7, 1)).unwrap();

        assert_eq!(store.purge_owner(tenant, &owner).unwrap(), 2);
        assert_eq!(store.list_active(tenant, &guest, now).unwrap().len(), 1);
    }

    #[test]
    fn delete_expired_reports_count() {
        let store = InMemoryCartItemStore::new();
        let tenant = TenantId::new();
        let now = Utc::now();

        let mut a = fresh_item(tenant, &ShopperRef::guest("g1"), 7, 1);
        a.expires_at = Some(now - Duration::minutes(1));
        let mut b = fresh_item(tenant, &ShopperRef::guest("g2"), 8, 1);
        b.expires_at = Some(now - Duration::minutes(2));
        let keep = fresh_item(tenant, &ShopperRef::guest("g3"), 9, 1);

        store.upsert(a).unwrap();
        store.upsert(b).unwrap();
        store.upsert(keep).unwrap();

        assert_eq!(store.expired(tenant, now).unwrap().len(), 2);
        assert_eq!(store.delete_expired(tenant, now).unwrap(), 2);
        assert!(store.expired(tenant, now).unwrap().is_empty());
    }
}
