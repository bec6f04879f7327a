//! Cart-side hook listeners.
//!
//! The cart both consumes hooks (discounts, charges, payload extension) and
//! answers them: it reports its non-expired rows as soft stock reservations
//! and drops an owner's rows when the owner is anonymized.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::warn;

use shopcart_core::hooks::{names, HookManager};
use shopcart_core::{OwnerId, OwnerRef, ProductId, ProductRef, TenantId};

use crate::store::CartItemStore;

const LISTENER_PRIORITY: i32 = 10;

/// Register the cart's own hook listeners.
///
/// Called once at wiring time, after the store exists and before the first
/// request or task run.
pub fn register_cart_hooks(hooks: &HookManager, store: Arc<dyn CartItemStore>) {
    register_stock_reservations(hooks, store.clone());
    register_owner_anonymization(hooks, store);
}

/// `stock.reservations.get`: add this cart's non-expired quantity for the
/// product in context to the running sum.
fn register_stock_reservations(hooks: &HookManager, store: Arc<dyn CartItemStore>) {
    hooks.register(names::STOCK_RESERVATIONS_GET, LISTENER_PRIORITY, move |value, ctx| {
        let Some((tenant_id, product)) = reservation_target(ctx) else {
            return value;
        };

        match store.reserved_quantity(tenant_id, &product, Utc::now()) {
            Ok(reserved) => json!(value.as_i64().unwrap_or(0) + reserved as i64),
            Err(err) => {
                warn!(product = %product, error = %err, "reservation sum failed");
                value
            }
        }
    });
}

fn reservation_target(ctx: &shopcart_core::hooks::HookContext) -> Option<(TenantId, ProductRef)> {
    let tenant_id = TenantId::from_str(ctx.get_str("tenant_id")?).ok()?;
    let kind = ctx.get_str("product_kind")?;
    let id = ProductId(ctx.get_i64("product_id")?);
    Some((tenant_id, ProductRef::new(kind, id)))
}

/// `user.before_anonymize`: purge every cart row of the owner in context.
fn register_owner_anonymization(hooks: &HookManager, store: Arc<dyn CartItemStore>) {
    hooks.register(names::USER_BEFORE_ANONYMIZE, LISTENER_PRIORITY, move |value, ctx| {
        let target = (|| {
            let tenant_id = TenantId::from_str(ctx.get_str("tenant_id")?).ok()?;
            let kind = ctx.get_str("owner_kind")?;
            let id = OwnerId::from_str(ctx.get_str("owner_id")?).ok()?;
            Some((tenant_id, OwnerRef::new(kind, id)))
        })();
        let Some((tenant_id, owner)) = target else {
            return value;
        };

        if let Err(err) = store.purge_owner(tenant_id, &owner) {
            warn!(owner = %owner, error = %err, "owner cart purge failed");
        }
        value
    });
}
