//! Cart error taxonomy.

use thiserror::Error;

use shopcart_catalog::StockError;
use shopcart_core::ProductId;

use crate::store::StoreError;

/// Failures surfaced by the cart core.
///
/// Soft not-found (remove/delete on a missing row) is *not* an error; those
/// operations return `Ok(None)` / `Ok(false)` instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartError {
    /// No authenticated owner and no guest token; the operation has nobody
    /// to act for. Distinct from not-found.
    #[error("identity required: no authenticated owner or guest token")]
    IdentityRequired,

    /// The product kind is unregistered, the id unresolvable, or the product
    /// is not currently purchasable.
    #[error("product {product_id} not found or invalid configuration")]
    ProductNotFound { product_id: ProductId },

    /// Stock pre-check failed. `available = None` never produces this error;
    /// unknown availability skips the check.
    #[error(
        "insufficient stock for product {product_id}: requested {requested}, available {}",
        match .available { Some(a) => a.to_string(), None => "unknown".to_string() }
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: Option<i64>,
    },

    /// Malformed input that slipped past transport validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A loaded row references a product that no longer satisfies the
    /// purchasable contract. Bug signal; propagate, never swallow.
    #[error("data integrity violation: {0}")]
    Integrity(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Stock(#[from] StockError),
}
