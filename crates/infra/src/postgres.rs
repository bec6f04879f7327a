//! Postgres-backed cart item store.
//!
//! The repository trait is synchronous while sqlx is async; store calls
//! bridge with `Handle::block_on` and therefore must NOT run on a thread
//! driving async tasks. The HTTP handlers hop to the blocking pool via
//! `spawn_blocking` before touching the store, and the task runner thread
//! enters the runtime context explicitly. Every query is tenant-scoped in
//! its WHERE clause.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use shopcart_cart::{CartItem, CartItemId, CartItemStore, ShopperRef, StoreError};
use shopcart_core::{OwnerId, OwnerRef, ProductId, ProductRef, TenantId};

/// Cart item repository over a `cart_items` table.
#[derive(Debug, Clone)]
pub struct PostgresCartItemStore {
    pool: Arc<PgPool>,
}

const SELECT_COLUMNS: &str = "id, tenant_id, owner_kind, owner_id, guest_token, \
     product_kind, product_id, quantity, expires_at, created_at, updated_at";

impl PostgresCartItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the `cart_items` table and its indexes if missing.
    ///
    /// There is deliberately no unique index on (tenant, shopper, product):
    /// row identity is find-or-create in the actions, and a duplicate row
    /// from a concurrent add is tolerated.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cart_items (
                id UUID PRIMARY KEY,
                tenant_id UUID NOT NULL,
                owner_kind TEXT,
                owner_id UUID,
                guest_token TEXT,
                product_kind TEXT NOT NULL,
                product_id BIGINT NOT NULL,
                quantity BIGINT NOT NULL CHECK (quantity >= 1),
                expires_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                CHECK (
                    (guest_token IS NOT NULL AND owner_kind IS NULL AND owner_id IS NULL)
                    OR (guest_token IS NULL AND owner_kind IS NOT NULL AND owner_id IS NOT NULL)
                )
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_table", e))?;

        for statement in [
            "CREATE INDEX IF NOT EXISTS cart_items_owner_idx \
             ON cart_items (tenant_id, owner_kind, owner_id)",
            "CREATE INDEX IF NOT EXISTS cart_items_guest_idx \
             ON cart_items (tenant_id, guest_token)",
            "CREATE INDEX IF NOT EXISTS cart_items_product_idx \
             ON cart_items (tenant_id, product_kind, product_id)",
            "CREATE INDEX IF NOT EXISTS cart_items_expiry_idx \
             ON cart_items (tenant_id, expires_at)",
        ] {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("create_index", e))?;
        }
        Ok(())
    }

    async fn find_async(
        &self,
        tenant_id: TenantId,
        shopper: &ShopperRef,
        product: &ProductRef,
    ) -> Result<Option<CartItem>, StoreError> {
        let cols = ShopperColumns::from(shopper);
        let row = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM cart_items
            WHERE tenant_id = $1
              AND owner_kind IS NOT DISTINCT FROM $2
              AND owner_id IS NOT DISTINCT FROM $3
              AND guest_token IS NOT DISTINCT FROM $4
              AND product_kind = $5
              AND product_id = $6
            LIMIT 1
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(cols.owner_kind)
        .bind(cols.owner_id)
        .bind(cols.guest_token)
        .bind(&product.kind)
        .bind(product.id.as_i64())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find", e))?;

        row.map(|row| decode_item(&row)).transpose()
    }

    async fn list_active_async(
        &self,
        tenant_id: TenantId,
        shopper: &ShopperRef,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartItem>, StoreError> {
        let cols = ShopperColumns::from(shopper);
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM cart_items
            WHERE tenant_id = $1
              AND owner_kind IS NOT DISTINCT FROM $2
              AND owner_id IS NOT DISTINCT FROM $3
              AND guest_token IS NOT DISTINCT FROM $4
              AND (expires_at IS NULL OR expires_at > $5)
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(cols.owner_kind)
        .bind(cols.owner_id)
        .bind(cols.guest_token)
        .bind(now)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_active", e))?;

        rows.iter().map(decode_item).collect()
    }

    async fn upsert_async(&self, item: CartItem) -> Result<CartItem, StoreError> {
        let cols = ShopperColumns::from(&item.shopper);
        sqlx::query(
            r#"
            INSERT INTO cart_items (
                id, tenant_id, owner_kind, owner_id, guest_token,
                product_kind, product_id, quantity, expires_at,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                quantity = EXCLUDED.quantity,
                expires_at = EXCLUDED.expires_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(item.id.0)
        .bind(item.tenant_id.as_uuid())
        .bind(cols.owner_kind)
        .bind(cols.owner_id)
        .bind(cols.guest_token)
        .bind(&item.product.kind)
        .bind(item.product.id.as_i64())
        .bind(i64::from(item.quantity))
        .bind(item.expires_at)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert", e))?;

        Ok(item)
    }

    async fn delete_async(&self, tenant_id: TenantId, id: CartItemId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.0)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_shopper_async(
        &self,
        tenant_id: TenantId,
        shopper: &ShopperRef,
    ) -> Result<u64, StoreError> {
        let cols = ShopperColumns::from(shopper);
        let result = sqlx::query(
            r#"
            DELETE FROM cart_items
            WHERE tenant_id = $1
              AND owner_kind IS NOT DISTINCT FROM $2
              AND owner_id IS NOT DISTINCT FROM $3
              AND guest_token IS NOT DISTINCT FROM $4
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(cols.owner_kind)
        .bind(cols.owner_id)
        .bind(cols.guest_token)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("clear_shopper", e))?;
        Ok(result.rows_affected())
    }

    async fn purge_owner_async(
        &self,
        tenant_id: TenantId,
        owner: &OwnerRef,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM cart_items WHERE tenant_id = $1 AND owner_kind = $2 AND owner_id = $3",
        )
        .bind(tenant_id.as_uuid())
        .bind(&owner.kind)
        .bind(owner.id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("purge_owner", e))?;
        Ok(result.rows_affected())
    }

    async fn expired_async(
        &self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartItem>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM cart_items
            WHERE tenant_id = $1 AND expires_at IS NOT NULL AND expires_at <= $2
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(now)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("expired", e))?;

        rows.iter().map(decode_item).collect()
    }

    async fn delete_expired_async(
        &self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM cart_items \
             WHERE tenant_id = $1 AND expires_at IS NOT NULL AND expires_at <= $2",
        )
        .bind(tenant_id.as_uuid())
        .bind(now)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_expired", e))?;
        Ok(result.rows_affected())
    }

    async fn reserved_quantity_async(
        &self,
        tenant_id: TenantId,
        product: &ProductRef,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(quantity), 0) AS reserved
            FROM cart_items
            WHERE tenant_id = $1
              AND product_kind = $2
              AND product_id = $3
              AND (expires_at IS NULL OR expires_at > $4)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(&product.kind)
        .bind(product.id.as_i64())
        .bind(now)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("reserved_quantity", e))?;

        let reserved: i64 = row
            .try_get("reserved")
            .map_err(|e| StoreError::Backend(format!("failed to read reserved sum: {e}")))?;
        Ok(reserved.max(0) as u64)
    }

    async fn tenants_async(&self) -> Result<Vec<TenantId>, StoreError> {
        let rows = sqlx::query("SELECT DISTINCT tenant_id FROM cart_items ORDER BY tenant_id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("tenants", e))?;

        rows.iter()
            .map(|row| {
                let tenant: Uuid = row
                    .try_get("tenant_id")
                    .map_err(|e| StoreError::Backend(format!("failed to read tenant_id: {e}")))?;
                Ok(TenantId::from_uuid(tenant))
            })
            .collect()
    }
}

impl CartItemStore for PostgresCartItemStore {
    fn find(
        &self,
        tenant_id: TenantId,
        shopper: &ShopperRef,
        product: &ProductRef,
    ) -> Result<Option<CartItem>, StoreError> {
        runtime_handle()?.block_on(self.find_async(tenant_id, shopper, product))
    }

    fn list_active(
        &self,
        tenant_id: TenantId,
        shopper: &ShopperRef,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartItem>, StoreError> {
        runtime_handle()?.block_on(self.list_active_async(tenant_id, shopper, now))
    }

    fn upsert(&self, item: CartItem) -> Result<CartItem, StoreError> {
        runtime_handle()?.block_on(self.upsert_async(item))
    }

    fn delete(&self, tenant_id: TenantId, id: CartItemId) -> Result<bool, StoreError> {
        runtime_handle()?.block_on(self.delete_async(tenant_id, id))
    }

    fn clear_shopper(
        &self,
        tenant_id: TenantId,
        shopper: &ShopperRef,
    ) -> Result<u64, StoreError> {
        runtime_handle()?.block_on(self.clear_shopper_async(tenant_id, shopper))
    }

    fn purge_owner(&self, tenant_id: TenantId, owner: &OwnerRef) -> Result<u64, StoreError> {
        runtime_handle()?.block_on(self.purge_owner_async(tenant_id, owner))
    }

    fn expired(
        &self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartItem>, StoreError> {
        runtime_handle()?.block_on(self.expired_async(tenant_id, now))
    }

    fn delete_expired(&self, tenant_id: TenantId, now: DateTime<Utc>) -> Result<u64, StoreError> {
        runtime_handle()?.block_on(self.delete_expired_async(tenant_id, now))
    }

    fn reserved_quantity(
        &self,
        tenant_id: TenantId,
        product: &ProductRef,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        runtime_handle()?.block_on(self.reserved_quantity_async(tenant_id, product, now))
    }

    fn tenants(&self) -> Result<Vec<TenantId>, StoreError> {
        runtime_handle()?.block_on(self.tenants_async())
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => StoreError::Backend(format!(
            "database error in {operation}: {}",
            db_err.message()
        )),
        other => StoreError::Backend(format!("{operation} failed: {other}")),
    }
}

fn runtime_handle() -> Result<tokio::runtime::Handle, StoreError> {
    tokio::runtime::Handle::try_current().map_err(|_| {
        StoreError::Backend(
            "PostgresCartItemStore requires a tokio runtime context".to_string(),
        )
    })
}

struct ShopperColumns<'a> {
    owner_kind: Option<&'a str>,
    owner_id: Option<&'a Uuid>,
    guest_token: Option<&'a str>,
}

impl<'a> From<&'a ShopperRef> for ShopperColumns<'a> {
    fn from(shopper: &'a ShopperRef) -> Self {
        match shopper {
            ShopperRef::Owner(owner) => Self {
                owner_kind: Some(&owner.kind),
                owner_id: Some(owner.id.as_uuid()),
                guest_token: None,
            },
            ShopperRef::Guest(token) => Self {
                owner_kind: None,
                owner_id: None,
                guest_token: Some(token.as_str()),
            },
        }
    }
}

fn decode_item(row: &sqlx::postgres::PgRow) -> Result<CartItem, StoreError> {
    let read = |e: sqlx::Error| StoreError::Backend(format!("failed to decode cart item row: {e}"));

    let id: Uuid = row.try_get("id").map_err(read)?;
    let tenant_id: Uuid = row.try_get("tenant_id").map_err(read)?;
    let owner_kind: Option<String> = row.try_get("owner_kind").map_err(read)?;
    let owner_id: Option<Uuid> = row.try_get("owner_id").map_err(read)?;
    let guest_token: Option<String> = row.try_get("guest_token").map_err(read)?;
    let product_kind: String = row.try_get("product_kind").map_err(read)?;
    let product_id: i64 = row.try_get("product_id").map_err(read)?;
    let quantity: i64 = row.try_get("quantity").map_err(read)?;

    let shopper = match (guest_token, owner_kind, owner_id) {
        (Some(token), _, _) => ShopperRef::guest(token),
        (None, Some(kind), Some(owner_id)) => {
            ShopperRef::owner(OwnerRef::new(kind, OwnerId::from_uuid(owner_id)))
        }
        _ => {
            return Err(StoreError::Backend(format!(
                "cart item {id} has neither owner nor guest identity"
            )))
        }
    };

    let quantity = u32::try_from(quantity)
        .map_err(|_| StoreError::Backend(format!("cart item {id} has quantity {quantity}")))?;

    Ok(CartItem {
        id: CartItemId::from_uuid(id),
        tenant_id: TenantId::from_uuid(tenant_id),
        shopper,
        product: ProductRef::new(product_kind, ProductId(product_id)),
        quantity,
        expires_at: row.try_get("expires_at").map_err(read)?,
        created_at: row.try_get("created_at").map_err(read)?,
        updated_at: row.try_get("updated_at").map_err(read)?,
    })
}
