//! Remove-from-cart action.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use shopcart_catalog::StockAvailability;
use shopcart_core::{ProductId, ProductRef, TenantId};

use crate::config::CartConfig;
use crate::error::CartError;
use crate::item::{CartItem, ShopperRef};
use crate::store::CartItemStore;

/// Subtracts a quantity from a shopper's cart row.
///
/// Soft throughout: no identity, no matching row, or the row running out all
/// yield `Ok(None)`. The row is deleted once its quantity would reach zero.
pub struct RemoveCartItem {
    store: Arc<dyn CartItemStore>,
    stock: Option<Arc<dyn StockAvailability>>,
    config: CartConfig,
}

impl RemoveCartItem {
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
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<CartItem>, CartError> {
        let Some(shopper) = shopper else {
            return Ok(None);
        };
        if quantity == 0 {
            return Err(CartError::Validation(
                "quantity must be at least 1".into(),
            ));
        }

        let product_ref = ProductRef::new(self.config.product_kind.clone(), product_id);
        let Some(mut item) = self.store.find(tenant_id, &shopper, &product_ref)? else {
            return Ok(None);
        };

        let result = if quantity >= item.quantity {
            self.store.delete(tenant_id, item.id)?;
            debug!(tenant_id = %tenant_id, product = %product_ref, "cart item emptied");
            None
        } else {
            item.quantity -= quantity;
            item.updated_at = now;
            Some(self.store.upsert(item)?)
        };

        self.invalidate_stock(tenant_id, &product_ref);
        Ok(result)
    }

    fn invalidate_stock(&self, tenant_id: TenantId, product: &ProductRef) {
        if let Some(stock) = &self.stock {
            if let Err(err) = stock.invalidate_cache(tenant_id, product) {
                warn!(product = %product, error = %err, "stock cache invalidation failed");
            }
        }
    }
}
