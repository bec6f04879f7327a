//! `shopcart-catalog` — the purchasability seam.
//!
//! The cart never touches a concrete product type. It resolves polymorphic
//! `(kind, id)` references through the [`ProductCatalog`] registry and talks
//! to whatever comes back via the [`Purchasable`] / [`Inventoriable`]
//! capability traits. Stock availability (on-hand minus soft reservations)
//! lives here too.

pub mod product;
pub mod registry;
pub mod stock;

pub use product::{CartProduct, Inventoriable, Product, ProductStatus, Purchasable};
pub use registry::{InMemoryProducts, ProductCatalog, ProductSource};
pub use stock::{HookedStockAvailability, StockAvailability, StockError};
