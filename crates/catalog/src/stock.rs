//! Stock availability: on-hand stock netted against soft reservations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::json;
use thiserror::Error;

use shopcart_core::hooks::{names, HookContext, HookManager};
use shopcart_core::{ProductRef, TenantId};

use crate::registry::ProductCatalog;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    #[error("stock backend error: {0}")]
    Backend(String),
}

/// External collaborator answering "how many can still be sold?".
///
/// `available_stock` already nets out in-flight reservations; `None` means
/// availability cannot be determined and callers skip their pre-checks.
pub trait StockAvailability: Send + Sync {
    fn available_stock(
        &self,
        tenant_id: TenantId,
        product: &ProductRef,
    ) -> Result<Option<i64>, StockError>;

    /// Drop any cached availability for the product.
    fn invalidate_cache(&self, tenant_id: TenantId, product: &ProductRef) -> Result<(), StockError>;
}

/// Default availability service: catalog on-hand minus the reservation sum
/// collected through the `stock.reservations.get` hook, memoized per
/// `(tenant, product)` until invalidated.
pub struct HookedStockAvailability {
    catalog: Arc<ProductCatalog>,
    hooks: Arc<HookManager>,
    cache: RwLock<HashMap<(TenantId, ProductRef), Option<i64>>>,
}

impl HookedStockAvailability {
    pub fn new(catalog: Arc<ProductCatalog>, hooks: Arc<HookManager>) -> Self {
        Self {
            catalog,
            hooks,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn reserved(&self, tenant_id: TenantId, product: &ProductRef) -> i64 {
        let ctx = HookContext::new()
            .with("tenant_id", tenant_id.to_string())
            .with("product_kind", product.kind.clone())
            .with("product_id", product.id.as_i64());
        self.hooks
            .execute(names::STOCK_RESERVATIONS_GET, json!(0), &ctx)
            .as_i64()
            .unwrap_or(0)
    }

    fn compute(&self, tenant_id: TenantId, product: &ProductRef) -> Option<i64> {
        let resolved = self.catalog.resolve(tenant_id, product)?;
        if !resolved.manages_stock() {
            return None;
        }
        let on_hand = resolved.on_hand()?;
        Some(on_hand - self.reserved(tenant_id, product))
    }
}

impl StockAvailability for HookedStockAvailability {
    fn available_stock(
        &self,
        tenant_id: TenantId,
        product: &ProductRef,
    ) -> Result<Option<i64>, StockError> {
        let key = (tenant_id, product.clone());
        if let Ok(cache) = self.cache.read() {
            if let Some(hit) = cache.get(&key) {
                return Ok(*hit);
            }
        }

        let available = self.compute(tenant_id, product);
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, available);
        }
        Ok(available)
    }

    fn invalidate_cache(&self, tenant_id: TenantId, product: &ProductRef) -> Result<(), StockError> {
        if let Ok(mut cache) = self.cache.write() {
            cache.remove(&(tenant_id, product.clone()));
        }
        Ok(())
    }
}

impl core::fmt::Debug for HookedStockAvailability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let cached = self.cache.read().map(|c| c.len()).unwrap_or(0);
        f.debug_struct("HookedStockAvailability")
            .field("cached", &cached)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::Product;
    use crate::registry::InMemoryProducts;
    use shopcart_core::ProductId;

    fn service_with(
        tenant: TenantId,
        product: Product,
    ) -> (HookedStockAvailability, Arc<HookManager>) {
        let catalog = Arc::new(ProductCatalog::new());
        let source = Arc::new(InMemoryProducts::new());
        source.insert(tenant, product);
        catalog.register("product", source);
        let hooks = Arc::new(HookManager::new());
        (
            HookedStockAvailability::new(catalog, hooks.clone()),
            hooks,
        )
    }

    #[test]
    fn nets_reservations_out_of_on_hand() {
        let tenant = TenantId::new();
        let (stock, hooks) = service_with(tenant, Product::new(ProductId(7), "mug", 1200).with_stock(10));
        hooks.register(names::STOCK_RESERVATIONS_GET, 10, |v, _| {
            json!(v.as_i64().unwrap_or(0) + 4)
        });

        let available = stock
            .available_stock(tenant, &ProductRef::new("product", ProductId(7)))
            .unwrap();
        assert_eq!(available, Some(6));
    }

    #[test]
    fn unknown_product_and_unmanaged_stock_yield_none() {
        let tenant = TenantId::new();
        let (stock, _hooks) = service_with(tenant, Product::new(ProductId(1), "download", 300));

        // Unmanaged stock.
        assert_eq!(
            stock
                .available_stock(tenant, &ProductRef::new("product", ProductId(1)))
                .unwrap(),
            None
        );
        // Unknown product.
        assert_eq!(
            stock
                .available_stock(tenant, &ProductRef::new("product", ProductId(99)))
                .unwrap(),
            None
        );
    }

    #[test]
    fn caches_until_invalidated() {
        let tenant = TenantId::new();
        let (stock, hooks) = service_with(tenant, Product::new(ProductId(7), "mug", 1200).with_stock(10));
        let product = ProductRef::new("product", ProductId(7));

        assert_eq!(stock.available_stock(tenant, &product).unwrap(), Some(10));

        // New reservations appear after the first computation.
        hooks.register(names::STOCK_RESERVATIONS_GET, 10, |v, _| {
            json!(v.as_i64().unwrap_or(0) + 3)
        });

        // Stale until invalidated.
        assert_eq!(stock.available_stock(tenant, &product).unwrap(), Some(10));
        stock.invalidate_cache(tenant, &product).unwrap();
        assert_eq!(stock.available_stock(tenant, &product).unwrap(), Some(7));
    }
}
