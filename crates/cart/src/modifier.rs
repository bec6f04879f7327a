//! Cart modifiers: pluggable pricing/payload-extension units.

use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};

use crate::cart::ShopCart;

/// Neutral mid-point priority, leaving room on both sides.
pub const DEFAULT_MODIFIER_PRIORITY: i32 = 50;

/// A named, prioritized unit of subtotal/payload logic.
///
/// Lower priorities run first. Both operations default to pass-through;
/// implementations override what they need. Payload extenders must only
/// add or override their own keys, never remove someone else's.
pub trait CartModifier: Send + Sync {
    fn name(&self) -> &str;

    fn priority(&self) -> i32 {
        DEFAULT_MODIFIER_PRIORITY
    }

    /// Transform the running subtotal (integer cents).
    fn adjust_subtotal(&self, _cart: &ShopCart, subtotal: i64) -> i64 {
        subtotal
    }

    /// Extend the cart's external payload.
    fn extend_payload(&self, _cart: &ShopCart, payload: Map<String, Value>) -> Map<String, Value> {
        payload
    }
}

/// Ordered set of registered modifiers.
///
/// Registration re-sorts by ascending priority; the sort is stable, so equal
/// priorities keep registration order.
#[derive(Default)]
pub struct ModifierRegistry {
    modifiers: RwLock<Vec<Arc<dyn CartModifier>>>,
}

impl ModifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, modifier: Arc<dyn CartModifier>) {
        if let Ok(mut modifiers) = self.modifiers.write() {
            modifiers.push(modifier);
            modifiers.sort_by_key(|m| m.priority());
        }
    }

    /// Registered modifiers in priority order.
    pub fn list(&self) -> Vec<Arc<dyn CartModifier>> {
        self.modifiers
            .read()
            .map(|modifiers| modifiers.clone())
            .unwrap_or_default()
    }

    /// Fold every modifier's subtotal transform left-to-right.
    pub fn reduce_subtotal(&self, cart: &ShopCart, initial: i64) -> i64 {
        self.list()
            .iter()
            .fold(initial, |subtotal, m| m.adjust_subtotal(cart, subtotal))
    }

    /// Fold every modifier's payload extension left-to-right.
    pub fn extend_payload(
        &self,
        cart: &ShopCart,
        payload: Map<String, Value>,
    ) -> Map<String, Value> {
        self.list()
            .iter()
            .fold(payload, |payload, m| m.extend_payload(cart, payload))
    }
}

impl core::fmt::Debug for ModifierRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let names: Vec<String> = self
            .list()
            .iter()
            .map(|m| format!("{}({})", m.name(), m.priority()))
            .collect();
        f.debug_struct("ModifierRegistry")
            .field("modifiers", &names)
            .finish()
    }
}
