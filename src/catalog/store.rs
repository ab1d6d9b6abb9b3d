//! Product Storage
//! SQLite-backed product table with unique SKUs

use crate::catalog::models::{CreateProductRequest, Product, ProductFilter};
use crate::db::{self, SharedConnection, StoreError};
use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

const PRODUCT_COLUMNS: &str = "id, name, description, price, stock, category, sku, active, \
                               image_url, created_at, updated_at";

// ?1 category, ?2 include inactive, ?3 LIKE pattern
const LIST_FILTER: &str = "(?1 IS NULL OR category = ?1) AND (?2 OR active = 1) \
                           AND (?3 IS NULL OR name LIKE ?3 ESCAPE '\\' \
                                OR description LIKE ?3 ESCAPE '\\')";

#[derive(Clone)]
pub struct SqliteProductStore {
    conn: SharedConnection,
}

struct ProductRow {
    id: i64,
    name: String,
    description: String,
    price: f64,
    stock: i64,
    category: String,
    sku: String,
    active: bool,
    image_url: String,
    created_at: String,
    updated_at: String,
}

impl ProductRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            price: row.get(3)?,
            stock: row.get(4)?,
            category: row.get(5)?,
            sku: row.get(6)?,
            active: row.get(7)?,
            image_url: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn into_product(self) -> Result<Product, StoreError> {
        Ok(Product {
            id: self.id,
            name: self.name,
            description: self.description,
            price: self.price,
            stock: self.stock,
            category: self.category,
            sku: self.sku,
            active: self.active,
            image_url: self.image_url,
            created_at: db::parse_timestamp(&self.created_at)?,
            updated_at: db::parse_timestamp(&self.updated_at)?,
        })
    }
}

impl SqliteProductStore {
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = db::open(db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                price REAL NOT NULL,
                stock INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
                category TEXT NOT NULL,
                sku TEXT UNIQUE NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                image_url TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_products_category ON products(category)",
            [],
        )?;

        Ok(Self {
            conn: db::shared(conn),
        })
    }

    pub async fn insert(&self, req: &CreateProductRequest) -> Result<i64, StoreError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO products
                (name, description, price, stock, category, sku, active, image_url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8, ?8)",
            params![
                req.name.trim(),
                req.description,
                req.price,
                req.stock,
                req.category.trim(),
                req.sku.trim(),
                req.image_url,
                now,
            ],
        )
        .map_err(StoreError::from_write)?;

        let id = conn.last_insert_rowid();
        info!(product_id = id, sku = req.sku.trim(), "📦 Product created");
        Ok(id)
    }

    pub async fn find(&self, id: i64) -> Result<Option<Product>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))?;
        let row = stmt.query_row(params![id], ProductRow::read).optional()?;
        row.map(ProductRow::into_product).transpose()
    }

    /// Page of products plus the total matching the filter.
    pub async fn list(&self, filter: &ProductFilter) -> Result<(Vec<Product>, i64), StoreError> {
        let conn = self.conn.lock().await;
        let category = filter.category.as_deref();
        let search = filter.search_pattern();

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM products WHERE {LIST_FILTER}"),
            params![category, filter.include_inactive, search],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE {LIST_FILTER}
             ORDER BY id ASC LIMIT ?4 OFFSET ?5"
        ))?;
        let rows = stmt
            .query_map(
                params![
                    category,
                    filter.include_inactive,
                    search,
                    i64::from(filter.limit),
                    filter.offset()
                ],
                ProductRow::read,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let products = rows
            .into_iter()
            .map(ProductRow::into_product)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((products, total))
    }

    pub async fn update(&self, product: &Product) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let rows = conn
            .execute(
                "UPDATE products SET name = ?1, description = ?2, price = ?3, stock = ?4,
                    category = ?5, sku = ?6, active = ?7, image_url = ?8, updated_at = ?9
                 WHERE id = ?10",
                params![
                    product.name,
                    product.description,
                    product.price,
                    product.stock,
                    product.category,
                    product.sku,
                    product.active,
                    product.image_url,
                    Utc::now().to_rfc3339(),
                    product.id,
                ],
            )
            .map_err(StoreError::from_write)?;
        if rows == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let rows = conn.execute("DELETE FROM products WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(StoreError::NotFound);
        }
        info!(product_id = id, "🗑️  Product deleted");
        Ok(())
    }

    /// Apply a signed stock delta in one statement. `Ok(None)` means the
    /// result would go below zero and nothing changed; a sum that does not
    /// fit in an integer is `OutOfRange`.
    pub async fn adjust_stock(&self, id: i64, delta: i64) -> Result<Option<i64>, StoreError> {
        let conn = self.conn.lock().await;
        // SQLite widens an overflowing integer sum to REAL
        let new_stock = conn
            .query_row(
                "UPDATE products SET stock = stock + ?1, updated_at = ?2
                 WHERE id = ?3 AND stock + ?1 >= 0 AND typeof(stock + ?1) = 'integer'
                 RETURNING stock",
                params![delta, Utc::now().to_rfc3339(), id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;

        if new_stock.is_some() {
            return Ok(new_stock);
        }

        let current = conn
            .query_row(
                "SELECT stock FROM products WHERE id = ?1",
                params![id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .ok_or(StoreError::NotFound)?;
        match current.checked_add(delta) {
            Some(_) => Ok(None),
            None => Err(StoreError::OutOfRange),
        }
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock().await;
        let count = conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(count)
    }
}
