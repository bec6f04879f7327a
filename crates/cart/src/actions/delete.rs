//! Delete-from-cart action: drops a row regardless of its quantity.

use std::sync::Arc;

use tracing::{debug, warn};

use shopcart_catalog::StockAvailability;
use shopcart_core::{ProductId, ProductRef, TenantId};

use crate::config::CartConfig;
use crate::error::CartError;
use crate::item::ShopperRef;
use crate::store::CartItemStore;

/// Deletes a shopper's row for a product. Soft like removal: no identity or
/// no matching row yields `Ok(false)`.
pub struct DeleteCartItem {
    store: Arc<dyn CartItemStore>,
    stock: Option<Arc<dyn StockAvailability>>,
    config: CartConfig,
}

impl DeleteCartItem {
    pub fn new(
        store: Arc<dyn CartItemStore>,
        stock: Option<Arc<dyn StockAvailability>>,
        config: CartConfig,
    ) -> Self {
        Self {
            store,
            stock,
            config,
        }
    }

    pub fn execute(
        &self,
        tenant_id: TenantId,
        shopper: Option<ShopperRef>,
        product_id: ProductId,
    ) -> Result<bool, CartError> {
        let Some(shopper) = shopper else {
            return Ok(false);
        };

        let product_ref = ProductRef::new(self.config.product_kind.clone(), product_id);
        let Some(item) = self.store.find(tenant_id, &shopper, &product_ref)? else {
            return Ok(false);
        };

        let deleted = self.store.delete(tenant_id, item.id)?;
        if deleted {
            debug!(tenant_id = %tenant_id, product = %product_ref, "cart item deleted");
            if let Some(stock) = &self.stock {
                if let Err(err) = stock.invalidate_cache(tenant_id, &product_ref) {
                    warn!(product = %product_ref, error = %err, "stock cache invalidation failed");
                }
            }
        }
        Ok(deleted)
    }
}
