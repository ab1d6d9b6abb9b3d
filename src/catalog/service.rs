//! Catalog Service
//! Read-through caching over the product store, invalidated on every write

use crate::cache::Cache;
use crate::catalog::{
    errors::CatalogError,
    models::{CreateProductRequest, Product, ProductFilter, ProductPage, UpdateProductRequest},
    store::SqliteProductStore,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

pub const PRODUCT_TTL: Duration = Duration::from_secs(10 * 60);
pub const LIST_TTL: Duration = Duration::from_secs(5 * 60);

const LIST_PREFIX: &str = "products:";

fn product_key(id: i64) -> String {
    format!("product:{id}")
}

pub struct CatalogService {
    store: SqliteProductStore,
    cache: Option<Arc<dyn Cache>>,
}

impl CatalogService {
    pub fn new(store: SqliteProductStore, cache: Option<Arc<dyn Cache>>) -> Self {
        Self { store, cache }
    }

    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.cache.as_ref()?.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    async fn remember<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let Some(cache) = &self.cache else { return };
        match serde_json::to_string(value) {
            Ok(raw) => cache.set(key, raw, ttl).await,
            Err(e) => warn!(key, error = %e, "Failed to encode cache entry"),
        }
    }

    async fn invalidate(&self, id: Option<i64>) {
        let Some(cache) = &self.cache else { return };
        if let Some(id) = id {
            cache.delete(&product_key(id)).await;
        }
        cache.delete_prefix(LIST_PREFIX).await;
    }

    pub async fn list(&self, filter: &ProductFilter) -> Result<ProductPage, CatalogError> {
        let key = filter.cache_key();
        if let Some(page) = self.cached::<ProductPage>(&key).await {
            return Ok(page);
        }

        let (products, total) = self.store.list(filter).await?;
        let page = ProductPage { products, total };
        self.remember(&key, &page, LIST_TTL).await;
        Ok(page)
    }

    /// Inactive products are hidden unless `include_inactive`.
    pub async fn get(&self, id: i64, include_inactive: bool) -> Result<Product, CatalogError> {
        let key = product_key(id);
        let product = match self.cached::<Product>(&key).await {
            Some(product) => product,
            None => {
                let product = self.store.find(id).await?.ok_or(CatalogError::NotFound)?;
                self.remember(&key, &product, PRODUCT_TTL).await;
                product
            }
        };

        if !product.active && !include_inactive {
            return Err(CatalogError::NotFound);
        }
        Ok(product)
    }

    pub async fn create(&self, req: CreateProductRequest) -> Result<Product, CatalogError> {
        req.validate()?;
        let id = self.store.insert(&req).await?;
        self.invalidate(None).await;

        self.store.find(id).await?.ok_or(CatalogError::NotFound)
    }

    pub async fn update(
        &self,
        id: i64,
        req: UpdateProductRequest,
    ) -> Result<Product, CatalogError> {
        req.validate()?;
        let mut product = self.store.find(id).await?.ok_or(CatalogError::NotFound)?;
        req.apply(&mut product);

        self.store.update(&product).await?;
        self.invalidate(Some(id)).await;
        info!(product_id = id, "✏️  Product updated");

        self.store.find(id).await?.ok_or(CatalogError::NotFound)
    }

    pub async fn delete(&self, id: i64) -> Result<(), CatalogError> {
        self.store.delete(id).await?;
        self.invalidate(Some(id)).await;
        Ok(())
    }

    /// Apply a signed stock delta; the result never goes below zero.
    pub async fn adjust_stock(&self, id: i64, delta: i64) -> Result<Product, CatalogError> {
        let new_stock = self
            .store
            .adjust_stock(id, delta)
            .await?
            .ok_or(CatalogError::InsufficientStock)?;
        self.invalidate(Some(id)).await;
        info!(product_id = id, delta, stock = new_stock, "Stock adjusted");

        self.store.find(id).await?.ok_or(CatalogError::NotFound)
    }

    /// Insert the demo catalog into an empty product table.
    pub async fn seed_products(&self) -> Result<usize, CatalogError> {
        if self.store.count().await? > 0 {
            info!("Products already present, skipping seed");
            return Ok(0);
        }

        let seed = demo_products();
        for req in &seed {
            self.store.insert(req).await?;
        }
        self.invalidate(None).await;

        info!(count = seed.len(), "🌱 Seeded products");
        Ok(seed.len())
    }
}

fn demo_products() -> Vec<CreateProductRequest> {
    let item = |name: &str,
                description: &str,
                price: f64,
                stock: i64,
                category: &str,
                sku: &str| CreateProductRequest {
        name: name.to_string(),
        description: description.to_string(),
        price,
        stock,
        category: category.to_string(),
        sku: sku.to_string(),
        image_url: String::new(),
    };

    vec![
        item(
            "iPhone 15 Pro Max",
            "A17 Pro, 48MP camera, 6.7\" display",
            8999.99,
            25,
            "Eletrônicos",
            "IPHONE-15-PRO-MAX-001",
        ),
        item(
            "MacBook Air M3",
            "8GB RAM, 256GB SSD",
            12499.99,
            15,
            "Eletrônicos",
            "MACBOOK-AIR-M3-002",
        ),
        item(
            "Smart TV LG 55\" 4K",
            "NanoCell 4K UHD with HDR10",
            2799.99,
            30,
            "Eletrônicos",
            "LG-TV-55-4K-003",
        ),
        item(
            "PlayStation 5",
            "Console with SSD and DualSense controller",
            4499.99,
            10,
            "Games",
            "SONY-PS5-004",
        ),
        item(
            "Airfryer Philips XL",
            "4L oil-free fryer",
            899.99,
            50,
            "Casa e Cozinha",
            "PHILIPS-AIRFRYER-XL-005",
        ),
        item(
            "JBL Charge 5",
            "Waterproof Bluetooth speaker, 20h battery",
            599.99,
            40,
            "Eletrônicos",
            "JBL-CHARGE-5-006",
        ),
        item(
            "Nike Air Max 90",
            "Everyday sneaker",
            499.99,
            60,
            "Moda e Calçados",
            "NIKE-AIRMAX-90-007",
        ),
        item(
            "Kindle Paperwhite",
            "Waterproof e-reader with 6.8\" display",
            449.99,
            35,
            "Livros",
            "AMAZON-KINDLE-PW-008",
        ),
    ]
}
