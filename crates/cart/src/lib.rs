//! `shopcart-cart` — cart pricing & stock-reservation core.
//!
//! Cart rows double as a soft reservation ledger: a non-expired row reserves
//! its quantity against the product's stock, and reservation totals are
//! answered through the `stock.reservations.get` hook. Rows expire on a
//! configurable TTL and are deleted by the periodic sweeper, which releases
//! their reservations.

pub mod actions;
pub mod cart;
pub mod config;
pub mod error;
pub mod hooks;
pub mod item;
pub mod modifier;
pub mod store;
pub mod sweep;

pub use actions::{AddCartItem, DeleteCartItem, RemoveCartItem};
pub use cart::{Adjustment, CartLine, ShopCart};
pub use config::CartConfig;
pub use error::CartError;
pub use item::{CartItem, CartItemId, GuestToken, ShopperRef};
pub use modifier::{CartModifier, ModifierRegistry, DEFAULT_MODIFIER_PRIORITY};
pub use store::{CartItemStore, InMemoryCartItemStore, StoreError};
pub use sweep::ClearExpiredCartItems;
