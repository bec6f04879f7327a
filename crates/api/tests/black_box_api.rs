use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde_json::json;

use shopcart_api::app::services::{self, AppServices};
use shopcart_cart::{
    CartConfig, CartItem, CartItemId, CartItemStore, InMemoryCartItemStore, ShopperRef, StoreError,
};
use shopcart_catalog::Product;
use shopcart_core::{OwnerRef, ProductId, ProductRef, TenantId};

struct TestServer {
    base_url: String,
    services: Arc<AppServices>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory wiring, ephemeral port.
        Self::spawn_with(services::build_in_memory(CartConfig::default())).await
    }

    async fn spawn_with(services: AppServices) -> Self {
        let services = Arc::new(services);
        let app = shopcart_api::app::build_app(services.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}/api", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            services,
            handle,
        }
    }

    fn seed_product(&self, tenant_id: TenantId, product: Product) {
        self.services.products.insert(tenant_id, product);
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn tenant_header_is_required() {
    let srv = TestServer::spawn().await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/cart", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("X-Tenant-Id"));
}

#[tokio::test]
async fn add_requires_an_identity() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    srv.seed_product(tenant_id, Product::new(ProductId(7), "mug", 1200));

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/cart/product/add", srv.base_url))
        .header("X-Tenant-Id", tenant_id.to_string())
        .json(&json!({ "product_id": 7, "quantity": 1 }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("identity"));
}

#[tokio::test]
async fn guest_add_accumulates_then_remove_empties() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    srv.seed_product(tenant_id, Product::new(ProductId(7), "mug", 1200));

    let client = reqwest::Client::new();
    let headers = |req: reqwest::RequestBuilder| {
        req.header("X-Tenant-Id", tenant_id.to_string())
            .header("X-Guest-Token", "g1")
    };

    // Add 2, then 3 more: one row, quantity 5.
    let res = headers(client.post(format!("{}/cart/product/add", srv.base_url)))
        .json(&json!({ "product_id": 7, "quantity": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["data"]["quantity"], 2);

    let res = headers(client.post(format!("{}/cart/product/add", srv.base_url)))
        .json(&json!({ "product_id": 7, "quantity": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["data"]["quantity"], 5);

    let res = headers(client.get(format!("{}/cart/items", srv.base_url)))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let res = headers(client.get(format!("{}/small-cart", srv.base_url)))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["data"]["total_items"], 1);
    assert_eq!(body["data"]["total_price"], 5 * 1200);

    // Remove everything: data null, cart empty.
    let res = headers(client.put(format!("{}/cart/product/remove", srv.base_url)))
        .json(&json!({ "product_id": 7, "quantity": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["data"].is_null());

    let res = headers(client.get(format!("{}/cart/items", srv.base_url)))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn insufficient_stock_is_a_bad_request() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    srv.seed_product(
        tenant_id,
        Product::new(ProductId(7), "mug", 1200).with_stock(2),
    );

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/cart/product/add", srv.base_url))
        .header("X-Tenant-Id", tenant_id.to_string())
        .header("X-Guest-Token", "g1")
        .json(&json!({ "product_id": 7, "quantity": 5 }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("insufficient stock"), "got: {message}");
    assert!(message.contains("requested 5"), "got: {message}");
    assert!(message.contains("available 2"), "got: {message}");
}

#[tokio::test]
async fn unknown_product_is_not_found() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/cart/product/add", srv.base_url))
        .header("X-Tenant-Id", tenant_id.to_string())
        .header("X-Guest-Token", "g1")
        .json(&json!({ "product_id": 404, "quantity": 1 }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_reports_missing_rows_as_not_found() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    srv.seed_product(tenant_id, Product::new(ProductId(7), "mug", 1200));

    let client = reqwest::Client::new();
    let headers = |req: reqwest::RequestBuilder| {
        req.header("X-Tenant-Id", tenant_id.to_string())
            .header("X-Guest-Token", "g1")
    };

    let res = headers(client.delete(format!("{}/cart/product/delete", srv.base_url)))
        .json(&json!({ "product_id": 7 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    headers(client.post(format!("{}/cart/product/add", srv.base_url)))
        .json(&json!({ "product_id": 7, "quantity": 1 }))
        .send()
        .await
        .unwrap();

    let res = headers(client.delete(format!("{}/cart/product/delete", srv.base_url)))
        .json(&json!({ "product_id": 7 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn owner_and_guest_carts_are_separate() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    srv.seed_product(tenant_id, Product::new(ProductId(7), "mug", 1200));

    let owner_token = uuid::Uuid::now_v7().to_string();
    let client = reqwest::Client::new();

    // Owner adds via bearer token; the guest token on the same request is
    // ignored in favor of the authenticated identity.
    let res = client
        .post(format!("{}/cart/product/add", srv.base_url))
        .header("X-Tenant-Id", tenant_id.to_string())
        .header("X-Guest-Token", "g1")
        .bearer_auth(&owner_token)
        .json(&json!({ "product_id": 7, "quantity": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // The plain guest sees an empty cart.
    let res = client
        .get(format!("{}/cart/items", srv.base_url))
        .header("X-Tenant-Id", tenant_id.to_string())
        .header("X-Guest-Token", "g1")
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["data"].as_array().unwrap().is_empty());

    // The owner sees their row.
    let res = client
        .get(format!("{}/cart/items", srv.base_url))
        .header("X-Tenant-Id", tenant_id.to_string())
        .bearer_auth(&owner_token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn reads_without_identity_render_an_empty_cart() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/cart", srv.base_url))
        .header("X-Tenant-Id", tenant_id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["data"]["items"].as_array().unwrap().is_empty());
    assert_eq!(body["data"]["subtotal"], 0);
    assert_eq!(body["data"]["total"], 0);

    let res = client
        .get(format!("{}/small-cart", srv.base_url))
        .header("X-Tenant-Id", tenant_id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["data"]["total_items"], 0);
    assert_eq!(body["data"]["total_price"], 0);
}

/// Delegates to the in-memory store, but first blocks on the ambient tokio
/// runtime the way the Postgres store does. Panics the serving task if a
/// handler ever runs it on an async worker thread.
struct RuntimeBridgingStore(InMemoryCartItemStore);

impl RuntimeBridgingStore {
    fn enter_bridge(&self) {
        tokio::runtime::Handle::current().block_on(async {});
    }
}

impl CartItemStore for RuntimeBridgingStore {
    fn find(
        &self,
        tenant_id: TenantId,
        shopper: &ShopperRef,
        product: &ProductRef,
    ) -> Result<Option<CartItem>, StoreError> {
        self.enter_bridge();
        self.0.find(tenant_id, shopper, product)
    }

    fn list_active(
        &self,
        tenant_id: TenantId,
        shopper: &ShopperRef,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartItem>, StoreError> {
        self.enter_bridge();
        self.0.list_active(tenant_id, shopper, now)
    }

    fn upsert(&self, item: CartItem) -> Result<CartItem, StoreError> {
        self.enter_bridge();
        self.0.upsert(item)
    }

    fn delete(&self, tenant_id: TenantId, id: CartItemId) -> Result<bool, StoreError> {
        self.enter_bridge();
        self.0.delete(tenant_id, id)
    }

    fn clear_shopper(
        &self,
        tenant_id: TenantId,
        shopper: &ShopperRef,
    ) -> Result<u64, StoreError> {
        self.enter_bridge();
        self.0.clear_shopper(tenant_id, shopper)
    }

    fn purge_owner(&self, tenant_id: TenantId, owner: &OwnerRef) -> Result<u64, StoreError> {
        self.enter_bridge();
        self.0.purge_owner(tenant_id, owner)
    }

    fn expired(
        &self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartItem>, StoreError> {
        self.enter_bridge();
        self.0.expired(tenant_id, now)
    }

    fn delete_expired(&self, tenant_id: TenantId, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.enter_bridge();
        self.0.delete_expired(tenant_id, now)
    }

    fn reserved_quantity(
        &self,
        tenant_id: TenantId,
        product: &ProductRef,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        self.enter_bridge();
        self.0.reserved_quantity(tenant_id, product, now)
    }

    fn tenants(&self) -> Result<Vec<TenantId>, StoreError> {
        self.enter_bridge();
        self.0.tenants()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn handlers_keep_runtime_blocking_stores_off_the_async_workers() {
    let store = Arc::new(RuntimeBridgingStore(InMemoryCartItemStore::new()));
    let srv =
        TestServer::spawn_with(services::build_with_store(store, CartConfig::default())).await;
    let tenant_id = TenantId::new();
    srv.seed_product(tenant_id, Product::new(ProductId(7), "mug", 1200));

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/cart/product/add", srv.base_url))
        .header("X-Tenant-Id", tenant_id.to_string())
        .header("X-Guest-Token", "g1")
        .json(&json!({ "product_id": 7, "quantity": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/cart", srv.base_url))
        .header("X-Tenant-Id", tenant_id.to_string())
        .header("X-Guest-Token", "g1")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn cart_totals_follow_product_discounts() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    srv.seed_product(
        tenant_id,
        Product::new(ProductId(1), "mug", 1000).with_discounted_price(800),
    );
    srv.seed_product(tenant_id, Product::new(ProductId(2), "tee", 700));

    let client = reqwest::Client::new();
    let headers = |req: reqwest::RequestBuilder| {
        req.header("X-Tenant-Id", tenant_id.to_string())
            .header("X-Guest-Token", "g1")
    };

    for (product_id, quantity) in [(1, 2), (2, 1)] {
        let res = headers(client.post(format!("{}/cart/product/add", srv.base_url)))
            .json(&json!({ "product_id": product_id, "quantity": quantity }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = headers(client.get(format!("{}/cart", srv.base_url)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();

    // 2 x 800 (discounted) + 1 x 700; no cart-level discounts or charges.
    assert_eq!(body["data"]["subtotal"], 2 * 800 + 700);
    assert_eq!(body["data"]["total"], 2 * 800 + 700);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
}
