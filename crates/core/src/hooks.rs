//! Hook manager: named extension points with prioritized listeners.
//!
//! A hook call folds every registered listener over a default value, in
//! ascending priority order (lower runs first, ties resolve in registration
//! order). Listeners receive the running value plus a read-only context map
//! and return the (possibly replaced) value.
//!
//! Registration is explicit and happens at process wiring time; there is no
//! runtime discovery.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

/// Well-known hook point names.
pub mod names {
    /// Cart-level discounts: folds a JSON array of `{amount}` entries.
    pub const CART_DISCOUNTS_GET: &str = "cart.discounts.get";
    /// Cart-level extra charges: folds a JSON array of `{amount}` entries.
    pub const CART_EXTRA_CHARGES_GET: &str = "cart.charges.extra.get";
    /// Per-item payload extension: folds a JSON object merged into the item.
    pub const PRODUCT_CART_EXTEND: &str = "product.cart.array.extend";
    /// Reservation count for a product: folds an integer sum.
    pub const STOCK_RESERVATIONS_GET: &str = "stock.reservations.get";
    /// Fired before an owner identity is anonymized; listeners clean up.
    pub const USER_BEFORE_ANONYMIZE: &str = "user.before_anonymize";
}

/// Shared hook listener: `(running value, context) -> value`.
pub type HookListener = Arc<dyn Fn(Value, &HookContext) -> Value + Send + Sync>;

/// Read-only, string-keyed context passed to every listener of a call.
#[derive(Debug, Clone, Default)]
pub struct HookContext {
    entries: HashMap<String, Value>,
}

impl HookContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.entries.get(key).and_then(Value::as_i64)
    }
}

struct Registered {
    hook: String,
    priority: i32,
    seq: u64,
    listener: HookListener,
}

#[derive(Default)]
struct Listeners {
    next_seq: u64,
    registered: Vec<Registered>,
}

/// Process-wide registry of hook listeners.
///
/// Shared behind an `Arc` across the cart services; listener registration is
/// expected at startup, execution on the request path.
#[derive(Default)]
pub struct HookManager {
    inner: RwLock<Listeners>,
}

impl HookManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `hook` with the given priority.
    ///
    /// Lower priorities run first; listeners registered with equal priority
    /// keep their registration order.
    pub fn register<F>(&self, hook: impl Into<String>, priority: i32, listener: F)
    where
        F: Fn(Value, &HookContext) -> Value + Send + Sync + 'static,
    {
        let Ok(mut inner) = self.inner.write() else {
            return;
        };
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.registered.push(Registered {
            hook: hook.into(),
            priority,
            seq,
            listener: Arc::new(listener),
        });
        inner.registered.sort_by_key(|r| (r.priority, r.seq));
    }

    /// Fold every listener of `hook` over `default`, returning the final value.
    ///
    /// A hook with no listeners yields `default` unchanged. Listeners run
    /// on a snapshot taken before the fold, so a listener may register
    /// further listeners; those join from the next call on.
    pub fn execute(&self, hook: &str, default: Value, ctx: &HookContext) -> Value {
        let listeners: Vec<HookListener> = {
            let Ok(inner) = self.inner.read() else {
                return default;
            };
            inner
                .registered
                .iter()
                .filter(|r| r.hook == hook)
                .map(|r| r.listener.clone())
                .collect()
        };
        listeners
            .into_iter()
            .fold(default, |value, listener| listener(value, ctx))
    }

    /// Number of listeners registered for `hook`.
    pub fn listener_count(&self, hook: &str) -> usize {
        self.inner
            .read()
            .map(|inner| inner.registered.iter().filter(|r| r.hook == hook).count())
            .unwrap_or(0)
    }
}

impl core::fmt::Debug for HookManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let count = self.inner.read().map(|i| i.registered.len()).unwrap_or(0);
        f.debug_struct("HookManager")
            .field("listeners", &count)
            .finish()
    }
}
