//! Service wiring: stores, catalog, hooks, actions, scheduled tasks.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use shopcart_cart::{
    hooks::register_cart_hooks, AddCartItem, CartConfig, CartError, CartItemStore,
    ClearExpiredCartItems, DeleteCartItem, InMemoryCartItemStore, ModifierRegistry,
    RemoveCartItem, ShopCart, ShopperRef,
};
use shopcart_catalog::{
    HookedStockAvailability, InMemoryProducts, ProductCatalog, StockAvailability,
};
use shopcart_core::hooks::HookManager;
use shopcart_core::tasks::{ScheduledTask, TaskRegistry};
use shopcart_core::TenantId;
use shopcart_infra::{PostgresCartItemStore, TaskRunner, TaskRunnerConfig, TaskRunnerHandle};

/// Everything the handlers need, wired once and shared behind an `Arc`.
pub struct AppServices {
    pub config: CartConfig,
    pub store: Arc<dyn CartItemStore>,
    pub catalog: Arc<ProductCatalog>,
    /// Dev/test product source registered under the configured product kind.
    /// A host platform replaces this by registering its own sources.
    pub products: Arc<InMemoryProducts>,
    pub hooks: Arc<HookManager>,
    pub modifiers: Arc<ModifierRegistry>,
    pub stock: Arc<dyn StockAvailability>,
    pub add: AddCartItem,
    pub remove: RemoveCartItem,
    pub delete: DeleteCartItem,
    pub tasks: Arc<TaskRegistry>,
}

impl AppServices {
    /// Load the cart aggregate for the current request.
    pub fn load_cart(
        &self,
        tenant_id: TenantId,
        shopper: ShopperRef,
        now: DateTime<Utc>,
    ) -> Result<ShopCart, CartError> {
        ShopCart::load(
            self.store.clone(),
            self.catalog.clone(),
            self.hooks.clone(),
            self.modifiers.clone(),
            tenant_id,
            shopper,
            now,
        )
    }
}

/// Build services for production: Postgres when `DATABASE_URL` is set,
/// in-memory otherwise.
pub async fn build_services() -> AppServices {
    let store: Arc<dyn CartItemStore> = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pool = sqlx::PgPool::connect(&url)
                .await
                .expect("failed to connect to DATABASE_URL");
            let store = PostgresCartItemStore::new(pool);
            store
                .ensure_schema()
                .await
                .expect("failed to ensure cart_items schema");
            tracing::info!("using postgres cart item store");
            Arc::new(store)
        }
        Err(_) => {
            tracing::info!("DATABASE_URL not set; using in-memory cart item store");
            Arc::new(InMemoryCartItemStore::new())
        }
    };

    build_with_store(store, CartConfig::from_env())
}

/// Build fully in-memory services; the black-box tests wire the app this way.
pub fn build_in_memory(config: CartConfig) -> AppServices {
    build_with_store(Arc::new(InMemoryCartItemStore::new()), config)
}

/// Wire services over a caller-provided store.
pub fn build_with_store(store: Arc<dyn CartItemStore>, config: CartConfig) -> AppServices {
    let catalog = Arc::new(ProductCatalog::new());
    let products = Arc::new(InMemoryProducts::new());
    catalog.register(config.product_kind.clone(), products.clone());

    let hooks = Arc::new(HookManager::new());
    register_cart_hooks(&hooks, store.clone());

    let modifiers = Arc::new(ModifierRegistry::new());
    let stock: Arc<dyn StockAvailability> = Arc::new(HookedStockAvailability::new(
        catalog.clone(),
        hooks.clone(),
    ));

    let add = AddCartItem::new(
        store.clone(),
        catalog.clone(),
        Some(stock.clone()),
        config.clone(),
    );
    let remove = RemoveCartItem::new(store.clone(), Some(stock.clone()), config.clone());
    let delete = DeleteCartItem::new(store.clone(), Some(stock.clone()), config.clone());

    let tasks = Arc::new(TaskRegistry::new());
    tasks.register(Arc::new(ClearExpiredCartItems::new(
        store.clone(),
        stock.clone(),
    )));

    AppServices {
        config,
        store,
        catalog,
        products,
        hooks,
        modifiers,
        stock,
        add,
        remove,
        delete,
        tasks,
    }
}

/// Spawn the background task runner for the wired services.
///
/// The runner thread lives outside the tokio runtime while the store bridges
/// into it, so both the tenant provider and each task run are wrapped to
/// enter the runtime context first.
pub fn spawn_task_runner(
    services: &AppServices,
    handle: tokio::runtime::Handle,
) -> std::io::Result<TaskRunnerHandle> {
    let registry = Arc::new(TaskRegistry::new());
    for task in services.tasks.list() {
        registry.register(Arc::new(RuntimeScopedTask {
            inner: task,
            handle: handle.clone(),
        }));
    }

    let store = services.store.clone();
    let provider_handle = handle;
    let runner = TaskRunner::new(
        registry,
        Box::new(move || {
            let _guard = provider_handle.enter();
            store.tenants().unwrap_or_else(|err| {
                tracing::warn!(error = %err, "tenant discovery failed");
                Vec::new()
            })
        }),
    );

    runner.spawn(
        TaskRunnerConfig::default()
            .with_name("shopcart-tasks")
            .with_poll_interval(Duration::from_secs(30)),
    )
}

struct RuntimeScopedTask {
    inner: Arc<dyn ScheduledTask>,
    handle: tokio::runtime::Handle,
}

impl ScheduledTask for RuntimeScopedTask {
    fn identifier(&self) -> &'static str {
        self.inner.identifier()
    }

    fn description(&self) -> &'static str {
        self.inner.description()
    }

    fn interval(&self) -> Duration {
        self.inner.interval()
    }

    fn tenant_aware(&self) -> bool {
        self.inner.tenant_aware()
    }

    fn run(&self, tenant_id: TenantId) {
        let _guard = self.handle.enter();
        self.inner.run(tenant_id);
    }
}
