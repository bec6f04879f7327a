//! Expired cart item sweeper.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use shopcart_catalog::StockAvailability;
use shopcart_core::tasks::ScheduledTask;
use shopcart_core::{ProductRef, TenantId};

use crate::store::CartItemStore;

const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Deletes expired cart rows for one tenant per run and tells the stock
/// cache which products just lost reservations.
///
/// Product refs are captured *before* the bulk delete; the set of affected
/// products is gone from the store afterwards. One failed cache
/// notification never aborts the remaining ones.
pub struct ClearExpiredCartItems {
    store: Arc<dyn CartItemStore>,
    stock: Arc<dyn StockAvailability>,
}

impl ClearExpiredCartItems {
    pub fn new(store: Arc<dyn CartItemStore>, stock: Arc<dyn StockAvailability>) -> Self {
        Self { store, stock }
    }
}

impl ScheduledTask for ClearExpiredCartItems {
    fn identifier(&self) -> &'static str {
        "shopcart.clear-expired-cart-items"
    }

    fn description(&self) -> &'static str {
        "Deletes expired cart items and refreshes stock availability"
    }

    fn interval(&self) -> Duration {
        SWEEP_INTERVAL
    }

    fn run(&self, tenant_id: TenantId) {
        let now = Utc::now();

        let expired = match self.store.expired(tenant_id, now) {
            Ok(expired) => expired,
            Err(err) => {
                warn!(tenant_id = %tenant_id, error = %err, "expired cart item scan failed");
                return;
            }
        };
        if expired.is_empty() {
            debug!(tenant_id = %tenant_id, "no expired cart items");
            return;
        }

        let products: BTreeSet<ProductRef> = expired.into_iter().map(|item| item.product).collect();

        let deleted = match self.store.delete_expired(tenant_id, now) {
            Ok(deleted) => deleted,
            Err(err) => {
                warn!(tenant_id = %tenant_id, error = %err, "expired cart item delete failed");
                return;
            }
        };
        if deleted == 0 {
            return;
        }
        info!(tenant_id = %tenant_id, deleted, "expired cart items cleared");

        for product in &products {
            if let Err(err) = self.stock.invalidate_cache(tenant_id, product) {
                warn!(
                    tenant_id = %tenant_id,
                    product = %product,
                    error = %err,
                    "stock cache invalidation failed"
                );
            }
        }
    }
}
