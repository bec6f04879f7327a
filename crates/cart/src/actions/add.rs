//! Add-to-cart action.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use shopcart_catalog::{ProductCatalog, StockAvailability};
use shopcart_core::{ProductId, ProductRef, TenantId};

use crate::config::CartConfig;
use crate::error::CartError;
use crate::item::{CartItem, ShopperRef};
use crate::store::CartItemStore;

/// Adds a quantity of a product to a shopper's cart (find-or-create).
///
/// The stock pre-check covers only the quantity being added: rows already in
/// the cart are soft reservations and are assumed to be netted out of the
/// availability figure.
pub struct AddCartItem {
    store: Arc<dyn CartItemStore>,
    catalog: Arc<ProductCatalog>,
    stock: Option<Arc<dyn StockAvailability>>,
    config: CartConfig,
}

impl AddCartItem {
    pub fn new(
        store: Arc<dyn CartItemStore>,
        catalog: Arc<ProductCatalog>,
        stock: Option<Arc<dyn StockAvailability>>,
        config: CartConfig,
    ) -> Self {
        Self {
            store,
            catalog,
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
    ) -> Result<CartItem, CartError> {
        let shopper = shopper.ok_or(CartError::IdentityRequired)?;
        if quantity == 0 {
            return Err(CartError::Validation(
                "quantity must be at least 1".into(),
            ));
        }

        let product_ref = ProductRef::new(self.config.product_kind.clone(), product_id);
        let product = self
            .catalog
            .resolve(tenant_id, &product_ref)
            .filter(|p| p.can_be_purchased())
            .ok_or(CartError::ProductNotFound { product_id })?;

        if product.manages_stock() {
            if let Some(stock) = &self.stock {
                if let Some(available) = stock.available_stock(tenant_id, &product_ref)? {
                    if available < i64::from(quantity) {
                        return Err(CartError::InsufficientStock {
                            product_id,
                            requested: quantity,
                            available: Some(available),
                        });
                    }
                }
            }
        }

        // Every add refreshes the expiry, increments included.
        let expires_at = self.config.expiry_from(now);
        let item = match self.store.find(tenant_id, &shopper, &product_ref)? {
            Some(mut existing) => {
                existing.quantity = existing.quantity.checked_add(quantity).ok_or_else(|| {
                    CartError::Validation("quantity exceeds the supported maximum".into())
                })?;
                existing.expires_at = expires_at;
                existing.updated_at = now;
                self.store.upsert(existing)?
            }
            None => self.store.upsert(CartItem::new(
                tenant_id,
                shopper,
                product_ref.clone(),
                quantity,
                expires_at,
                now,
            ))?,
        };

        debug!(
            tenant_id = %tenant_id,
            product = %product_ref,
            quantity = item.quantity,
            "cart item added"
        );
        self.invalidate_stock(tenant_id, &product_ref);
        Ok(item)
    }

    fn invalidate_stock(&self, tenant_id: TenantId, product: &ProductRef) {
        if let Some(stock) = &self.stock {
            if let Err(err) = stock.invalidate_cache(tenant_id, product) {
                warn!(product = %product, error = %err, "stock cache invalidation failed");
            }
        }
    }
}
