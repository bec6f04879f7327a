use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};

use shopcart_cart::{ShopCart, ShopperRef};
use shopcart_core::{ProductId, TenantId};

use crate::app::errors::{self, json_message};
use crate::app::services::AppServices;
use crate::app::dto;
use crate::context::{ShopperContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/cart", get(get_cart))
        .route("/cart/items", get(get_items))
        .route("/small-cart", get(get_small_cart))
        .route("/cart/product/add", post(add_product))
        .route("/cart/product/remove", put(remove_product))
        .route("/cart/product/delete", delete(delete_product))
}

/// Run store-touching work on the blocking pool.
///
/// The store trait is synchronous and the Postgres implementation bridges
/// back into the runtime with `block_on`, which must not happen on a thread
/// driving async tasks.
async fn run_blocking(
    work: impl FnOnce() -> axum::response::Response + Send + 'static,
) -> axum::response::Response {
    match tokio::task::spawn_blocking(work).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = %err, "cart handler task failed");
            json_message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error",
                Value::Null,
            )
        }
    }
}

pub async fn add_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(shopper): Extension<ShopperContext>,
    Json(body): Json<dto::AddCartItemRequest>,
) -> axum::response::Response {
    if let Err(res) = dto::validate_quantity(body.quantity) {
        return res;
    }

    let tenant_id = tenant.tenant_id();
    let shopper = shopper.shopper();
    run_blocking(move || {
        match services.add.execute(
            tenant_id,
            shopper,
            ProductId(body.product_id),
            body.quantity,
            Utc::now(),
        ) {
            Ok(item) => json_message(
                StatusCode::OK,
                "item added to cart",
                dto::cart_item_to_json(&item),
            ),
            Err(e) => errors::cart_error_to_response(e),
        }
    })
    .await
}

pub async fn remove_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(shopper): Extension<ShopperContext>,
    Json(body): Json<dto::RemoveCartItemRequest>,
) -> axum::response::Response {
    if let Err(res) = dto::validate_quantity(body.quantity) {
        return res;
    }

    let tenant_id = tenant.tenant_id();
    let shopper = shopper.shopper();
    run_blocking(move || {
        match services.remove.execute(
            tenant_id,
            shopper,
            ProductId(body.product_id),
            body.quantity,
            Utc::now(),
        ) {
            Ok(Some(item)) => json_message(
                StatusCode::OK,
                "item quantity reduced",
                dto::cart_item_to_json(&item),
            ),
            Ok(None) => json_message(StatusCode::OK, "item removed from cart", Value::Null),
            Err(e) => errors::cart_error_to_response(e),
        }
    })
    .await
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(shopper): Extension<ShopperContext>,
    Json(body): Json<dto::DeleteCartItemRequest>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();
    let shopper = shopper.shopper();
    run_blocking(move || {
        match services
            .delete
            .execute(tenant_id, shopper, ProductId(body.product_id))
        {
            Ok(true) => json_message(StatusCode::OK, "item deleted from cart", Value::Null),
            Ok(false) => json_message(
                StatusCode::NOT_FOUND,
                "product not found in cart",
                Value::Null,
            ),
            Err(e) => errors::cart_error_to_response(e),
        }
    })
    .await
}

pub async fn get_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(shopper): Extension<ShopperContext>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();
    let shopper = shopper.shopper();
    run_blocking(move || match load_cart(&services, tenant_id, shopper) {
        Ok(Some(cart)) => json_message(StatusCode::OK, "cart", Value::Object(cart.to_payload())),
        Ok(None) => json_message(
            StatusCode::OK,
            "cart",
            Value::Object(ShopCart::empty_payload()),
        ),
        Err(res) => res,
    })
    .await
}

pub async fn get_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(shopper): Extension<ShopperContext>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();
    let shopper = shopper.shopper();
    run_blocking(move || match load_cart(&services, tenant_id, shopper) {
        Ok(Some(cart)) => {
            let items = cart
                .to_payload()
                .remove("items")
                .unwrap_or_else(|| json!([]));
            json_message(StatusCode::OK, "cart items", items)
        }
        Ok(None) => json_message(StatusCode::OK, "cart items", json!([])),
        Err(res) => res,
    })
    .await
}

pub async fn get_small_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(shopper): Extension<ShopperContext>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();
    let shopper = shopper.shopper();
    run_blocking(move || match load_cart(&services, tenant_id, shopper) {
        Ok(Some(cart)) => json_message(
            StatusCode::OK,
            "small cart",
            json!({
                "total_items": cart.item_count(),
                "total_price": cart.total(),
            }),
        ),
        Ok(None) => json_message(
            StatusCode::OK,
            "small cart",
            json!({ "total_items": 0, "total_price": 0 }),
        ),
        Err(res) => res,
    })
    .await
}

/// The read endpoints treat a missing shopper as an empty cart rather than
/// an error, so storefronts can render before any identity exists. `None`
/// short-circuits without touching the store.
fn load_cart(
    services: &AppServices,
    tenant_id: TenantId,
    shopper: Option<ShopperRef>,
) -> Result<Option<ShopCart>, axum::response::Response> {
    let Some(shopper) = shopper else {
        return Ok(None);
    };
    services
        .load_cart(tenant_id, shopper, Utc::now())
        .map(Some)
        .map_err(errors::cart_error_to_response)
}
