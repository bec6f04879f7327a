use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use shopcart_cart::CartItem;

use crate::app::errors;

#[derive(Debug, Deserialize)]
pub struct AddCartItemRequest {
    pub product_id: i64,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct RemoveCartItemRequest {
    pub product_id: i64,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct DeleteCartItemRequest {
    pub product_id: i64,
}

/// Quantity must be at least 1 on add/remove.
pub fn validate_quantity(quantity: u32) -> Result<(), axum::response::Response> {
    if quantity == 0 {
        return Err(errors::json_message(
            StatusCode::BAD_REQUEST,
            "quantity must be at least 1",
            Value::Null,
        ));
    }
    Ok(())
}

pub fn cart_item_to_json(item: &CartItem) -> Value {
    serde_json::to_value(item).unwrap_or(Value::Null)
}
