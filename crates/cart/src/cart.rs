//! Cart aggregate: load-then-derive view over a shopper's rows.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use shopcart_catalog::{CartProduct, ProductCatalog};
use shopcart_core::hooks::{names, HookContext, HookManager};
use shopcart_core::TenantId;

use crate::error::CartError;
use crate::item::{CartItem, ShopperRef};
use crate::modifier::ModifierRegistry;
use crate::store::CartItemStore;

/// One `{amount}`-shaped entry from the discount/extra-charge hooks.
///
/// Entries missing an `amount` key deserialize as zero rather than failing
/// the whole cart read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub amount: i64,
}

impl Adjustment {
    pub fn new(amount: i64) -> Self {
        Self {
            label: None,
            amount,
        }
    }

    pub fn labeled(label: impl Into<String>, amount: i64) -> Self {
        Self {
            label: Some(label.into()),
            amount,
        }
    }

    fn list_from(value: Value) -> Vec<Adjustment> {
        serde_json::from_value(value).unwrap_or_default()
    }

    fn sum(entries: &[Adjustment]) -> i64 {
        entries.iter().map(|a| a.amount).sum()
    }
}

/// A cart row joined with its resolved product.
pub struct CartLine {
    pub item: CartItem,
    pub product: Arc<dyn CartProduct>,
}

/// The shopper's cart: rows plus derived pricing.
///
/// A `ShopCart` is built per request and used synchronously; the memoized
/// hook results and their re-entrancy guards are instance state, never
/// process-wide.
pub struct ShopCart {
    tenant_id: TenantId,
    shopper: ShopperRef,
    lines: Vec<CartLine>,
    store: Arc<dyn CartItemStore>,
    hooks: Arc<HookManager>,
    modifiers: Arc<ModifierRegistry>,
    discounts: RefCell<Option<Vec<Adjustment>>>,
    extra_charges: RefCell<Option<Vec<Adjustment>>>,
    computing_discounts: Cell<bool>,
    computing_charges: Cell<bool>,
}

impl std::fmt::Debug for ShopCart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopCart")
            .field("tenant_id", &self.tenant_id)
            .field("shopper", &self.shopper)
            .field("lines", &self.lines.len())
            .finish_non_exhaustive()
    }
}

impl ShopCart {
    /// Load all active rows for the shopper and resolve their products.
    ///
    /// A row whose product cannot be resolved through the catalog is a data
    /// integrity violation: the cart refuses to load rather than pricing a
    /// phantom product.
    pub fn load(
        store: Arc<dyn CartItemStore>,
        catalog: Arc<ProductCatalog>,
        hooks: Arc<HookManager>,
        modifiers: Arc<ModifierRegistry>,
        tenant_id: TenantId,
        shopper: ShopperRef,
        now: DateTime<Utc>,
    ) -> Result<Self, CartError> {
        let items = store.list_active(tenant_id, &shopper, now)?;

        let lines = items
            .into_iter()
            .map(|item| {
                let product = catalog.resolve(tenant_id, &item.product).ok_or_else(|| {
                    CartError::Integrity(format!(
                        "cart item {} references unresolvable product {}",
                        item.id, item.product
                    ))
                })?;
                Ok(CartLine { item, product })
            })
            .collect::<Result<Vec<_>, CartError>>()?;

        Ok(Self {
            tenant_id,
            shopper,
            lines,
            store,
            hooks,
            modifiers,
            discounts: RefCell::new(None),
            extra_charges: RefCell::new(None),
            computing_discounts: Cell::new(false),
            computing_charges: Cell::new(false),
        })
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn shopper(&self) -> &ShopperRef {
        &self.shopper
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn item_count(&self) -> usize {
        self.lines.len()
    }

    pub fn modifiers(&self) -> &ModifierRegistry {
        &self.modifiers
    }

    fn subtotal(&self, with_final_price: bool) -> i64 {
        self.lines
            .iter()
            .map(|line| {
                let price = if with_final_price {
                    line.product.final_price()
                } else {
                    line.product.sale_price()
                };
                price * i64::from(line.item.quantity)
            })
            .sum()
    }

    /// Σ sale price × quantity. No product- or cart-level discounts.
    pub fn base_subtotal(&self) -> i64 {
        self.subtotal(false)
    }

    /// Σ final price × quantity: product-level discounts applied, cart-level
    /// discounts not.
    pub fn final_price_subtotal(&self) -> i64 {
        self.subtotal(true)
    }

    /// Final-price subtotal minus cart-level discounts.
    pub fn final_subtotal(&self) -> i64 {
        self.final_price_subtotal() - Adjustment::sum(&self.discounts())
    }

    /// Final subtotal plus extra charges.
    pub fn total(&self) -> i64 {
        self.final_subtotal() + Adjustment::sum(&self.extra_charges())
    }

    /// Cart-level discounts from the `cart.discounts.get` hook.
    ///
    /// Memoized per instance. A re-entrant call (a hook implementation that
    /// reads the cart while the hook is executing) observes an empty list
    /// instead of recursing.
    pub fn discounts(&self) -> Vec<Adjustment> {
        if let Some(cached) = self.discounts.borrow().as_ref() {
            return cached.clone();
        }
        if self.computing_discounts.get() {
            return Vec::new();
        }

        self.computing_discounts.set(true);
        let entries = Adjustment::list_from(self.hooks.execute(
            names::CART_DISCOUNTS_GET,
            json!([]),
            &self.hook_context(),
        ));
        self.computing_discounts.set(false);

        *self.discounts.borrow_mut() = Some(entries.clone());
        entries
    }

    /// Cart-level extra charges from the `cart.charges.extra.get` hook.
    ///
    /// Same memoization and re-entrancy behavior as [`Self::discounts`].
    pub fn extra_charges(&self) -> Vec<Adjustment> {
        if let Some(cached) = self.extra_charges.borrow().as_ref() {
            return cached.clone();
        }
        if self.computing_charges.get() {
            return Vec::new();
        }

        self.computing_charges.set(true);
        let entries = Adjustment::list_from(self.hooks.execute(
            names::CART_EXTRA_CHARGES_GET,
            json!([]),
            &self.hook_context(),
        ));
        self.computing_charges.set(false);

        *self.extra_charges.borrow_mut() = Some(entries.clone());
        entries
    }

    fn hook_context(&self) -> HookContext {
        let mut ctx = HookContext::new().with("tenant_id", self.tenant_id.to_string());
        match &self.shopper {
            ShopperRef::Owner(owner) => {
                ctx.insert("owner_kind", owner.kind.clone());
                ctx.insert("owner_id", owner.id.to_string());
            }
            ShopperRef::Guest(token) => ctx.insert("guest_token", token.as_str()),
        }
        ctx
    }

    fn line_payload(&self, line: &CartLine) -> Value {
        let product = &line.product;
        let mut payload = Map::new();
        payload.insert("id".into(), json!(line.item.id));
        payload.insert("quantity".into(), json!(line.item.quantity));
        payload.insert("expires_at".into(), json!(line.item.expires_at));
        payload.insert("created_at".into(), json!(line.item.created_at));
        payload.insert("updated_at".into(), json!(line.item.updated_at));
        // The product object advertises its effective (final) price as the
        // sale price; the raw sale price stays available as base_price.
        payload.insert(
            "product".into(),
            json!({
                "kind": line.item.product.kind,
                "id": line.item.product.id,
                "name": product.name(),
                "regular_price": product.regular_price(),
                "sale_price": product.final_price(),
            }),
        );

        let ctx = HookContext::new()
            .with("tenant_id", self.tenant_id.to_string())
            .with("product_kind", line.item.product.kind.clone())
            .with("product_id", line.item.product.id.as_i64())
            .with("quantity", line.item.quantity)
            .with("base_price", product.sale_price())
            .with("regular_price", product.regular_price());
        let extra = self
            .hooks
            .execute(names::PRODUCT_CART_EXTEND, json!({}), &ctx);
        if let Value::Object(extra) = extra {
            for (key, value) in extra {
                payload.insert(key, value);
            }
        }

        Value::Object(payload)
    }

    /// External representation: `{items, subtotal, total, cart_discounts,
    /// extra_charges}`, run through every registered modifier's payload
    /// extension.
    pub fn to_payload(&self) -> Map<String, Value> {
        let items: Vec<Value> = self.lines.iter().map(|l| self.line_payload(l)).collect();

        let mut payload = Map::new();
        payload.insert("items".into(), json!(items));
        payload.insert("subtotal".into(), json!(self.final_subtotal()));
        payload.insert("total".into(), json!(self.total()));
        payload.insert("cart_discounts".into(), json!(self.discounts()));
        payload.insert("extra_charges".into(), json!(self.extra_charges()));

        self.modifiers.extend_payload(self, payload)
    }

    /// The payload shape of a cart with no rows, for callers that have no
    /// shopper to load for. Modifier extensions do not apply: there is no
    /// cart to extend.
    pub fn empty_payload() -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert("items".into(), json!([]));
        payload.insert("subtotal".into(), json!(0));
        payload.insert("total".into(), json!(0));
        payload.insert("cart_discounts".into(), json!([]));
        payload.insert("extra_charges".into(), json!([]));
        payload
    }

    /// Delete every row for the shopper and empty the in-memory view.
    ///
    /// Returns whether anything was deleted.
    pub fn clear(&mut self) -> Result<bool, CartError> {
        let deleted = self.store.clear_shopper(self.tenant_id, &self.shopper)?;
        self.lines.clear();
        *self.discounts.borrow_mut() = None;
        *self.extra_charges.borrow_mut() = None;
        Ok(deleted > 0)
    }
}
