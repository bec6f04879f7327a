//! Product capability traits and a concrete catalog product.

use serde::{Deserialize, Serialize};

use shopcart_core::ProductId;

/// Purchasability capability: anything the cart can hold must expose this.
///
/// Prices are integers in the smallest currency unit (e.g. cents).
pub trait Purchasable {
    fn product_id(&self) -> ProductId;

    fn name(&self) -> &str;

    /// Undiscounted list price.
    fn regular_price(&self) -> i64;

    /// Current selling price (may already undercut the regular price).
    fn sale_price(&self) -> i64;

    /// Price after product-level discounts. Defaults to the sale price.
    fn final_price(&self) -> i64 {
        self.sale_price()
    }

    fn can_be_purchased(&self) -> bool;
}

/// Inventory capability: whether and how a product tracks stock.
pub trait Inventoriable {
    /// Products that do not manage stock skip availability pre-checks.
    fn manages_stock(&self) -> bool;

    /// Physical on-hand quantity, `None` when unknown.
    fn on_hand(&self) -> Option<i64>;
}

/// What the cart requires of a resolved product.
pub trait CartProduct: Purchasable + Inventoriable + Send + Sync {}

impl<T> CartProduct for T where T: Purchasable + Inventoriable + Send + Sync {}

/// Product status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Draft,
    Active,
    Archived,
}

/// A concrete catalog product, suitable for dev/test sources.
///
/// Real deployments register their own `ProductSource` returning whatever
/// implements the capability traits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub status: ProductStatus,
    pub regular_price: i64,
    pub sale_price: i64,
    /// Product-level campaign price, when a campaign applies.
    pub discounted_price: Option<i64>,
    pub manages_stock: bool,
    pub on_hand: Option<i64>,
}

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>, sale_price: i64) -> Self {
        Self {
            id,
            name: name.into(),
            status: ProductStatus::Active,
            regular_price: sale_price,
            sale_price,
            discounted_price: None,
            manages_stock: false,
            on_hand: None,
        }
    }

    pub fn with_discounted_price(mut self, price: i64) -> Self {
        self.discounted_price = Some(price);
        self
    }

    pub fn with_stock(mut self, on_hand: i64) -> Self {
        self.manages_stock = true;
        self.on_hand = Some(on_hand);
        self
    }

    pub fn with_status(mut self, status: ProductStatus) -> Self {
        self.status = status;
        self
    }
}

impl Purchasable for Product {
    fn product_id(&self) -> ProductId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn regular_price(&self) -> i64 {
        self.regular_price
    }

    fn sale_price(&self) -> i64 {
        self.sale_price
    }

    fn final_price(&self) -> i64 {
        self.discounted_price.unwrap_or(self.sale_price)
    }

    fn can_be_purchased(&self) -> bool {
        self.status == ProductStatus::Active
    }
}

impl Inventoriable for Product {
    fn manages_stock(&self) -> bool {
        self.manages_stock
    }

    fn on_hand(&self) -> Option<i64> {
        self.on_hand
    }
}
