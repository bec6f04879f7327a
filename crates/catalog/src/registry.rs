//! Product catalog registry: kind tag -> product source.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use shopcart_core::{ProductId, ProductRef, TenantId};

use crate::product::{CartProduct, Product};

/// Resolves product ids for one product kind.
pub trait ProductSource: Send + Sync {
    fn find(&self, tenant_id: TenantId, id: ProductId) -> Option<Arc<dyn CartProduct>>;
}

/// Registry mapping product kind tags to their sources.
///
/// Sources are registered explicitly at wiring time; an unregistered kind
/// simply resolves to nothing (the caller treats that as not-found /
/// invalid configuration).
#[derive(Default)]
pub struct ProductCatalog {
    sources: RwLock<HashMap<String, Arc<dyn ProductSource>>>,
}

impl ProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, kind: impl Into<String>, source: Arc<dyn ProductSource>) {
        if let Ok(mut sources) = self.sources.write() {
            sources.insert(kind.into(), source);
        }
    }

    pub fn resolve(&self, tenant_id: TenantId, product: &ProductRef) -> Option<Arc<dyn CartProduct>> {
        let source = {
            let sources = self.sources.read().ok()?;
            sources.get(&product.kind)?.clone()
        };
        source.find(tenant_id, product.id)
    }

    pub fn has_kind(&self, kind: &str) -> bool {
        self.sources
            .read()
            .map(|sources| sources.contains_key(kind))
            .unwrap_or(false)
    }
}

impl core::fmt::Debug for ProductCatalog {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let kinds: Vec<String> = self
            .sources
            .read()
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("ProductCatalog").field("kinds", &kinds).finish()
    }
}

/// In-memory product source for dev/tests.
#[derive(Debug, Default)]
pub struct InMemoryProducts {
    inner: RwLock<HashMap<(TenantId, ProductId), Arc<Product>>>,
}

impl InMemoryProducts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tenant_id: TenantId, product: Product) {
        if let Ok(mut inner) = self.inner.write() {
            inner.insert((tenant_id, product.id), Arc::new(product));
        }
    }

    pub fn remove(&self, tenant_id: TenantId, id: ProductId) {
        if let Ok(mut inner) = self.inner.write() {
            inner.remove(&(tenant_id, id));
        }
    }
}

impl ProductSource for InMemoryProducts {
    fn find(&self, tenant_id: TenantId, id: ProductId) -> Option<Arc<dyn CartProduct>> {
        let inner = self.inner.read().ok()?;
        inner
            .get(&(tenant_id, id))
            .map(|p| p.clone() as Arc<dyn CartProduct>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::Purchasable;

    #[test]
    fn resolves_registered_kind_for_the_right_tenant() {
        let catalog = ProductCatalog::new();
        let source = Arc::new(InMemoryProducts::new());
        catalog.register("product", source.clone());

        let tenant = TenantId::new();
        let other = TenantId::new();
        source.insert(tenant, Product::new(ProductId(7), "mug", 1200));

        let found = catalog
            .resolve(tenant, &ProductRef::new("product", ProductId(7)))
            .expect("product resolves");
        assert_eq!(found.product_id(), ProductId(7));

        assert!(catalog
            .resolve(other, &ProductRef::new("product", ProductId(7)))
            .is_none());
    }

    #[test]
    fn unregistered_kind_resolves_to_none() {
        let catalog = ProductCatalog::new();
        let tenant = TenantId::new();
        assert!(catalog
            .resolve(tenant, &ProductRef::new("bundle", ProductId(1)))
            .is_none());
        assert!(!catalog.has_kind("bundle"));
    }
}
