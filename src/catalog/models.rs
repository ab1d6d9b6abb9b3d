//! Product Models

use crate::catalog::errors::CatalogError;
use crate::response::Pagination;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub stock: i64,
    pub category: String,
    pub sku: String,
    pub active: bool,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
    pub category: String,
    pub sku: String,
    #[serde(default)]
    pub image_url: String,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i64>,
    pub category: Option<String>,
    pub sku: Option<String>,
    pub image_url: Option<String>,
    pub active: Option<bool>,
}

/// Signed stock change: positive restocks, negative sells.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StockAdjustment {
    pub delta: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<String>,
    pub search: Option<String>,
}

/// Normalized listing filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFilter {
    pub page: u32,
    pub limit: u32,
    pub category: Option<String>,
    /// Case-insensitive substring of name or description.
    pub search: Option<String>,
    pub include_inactive: bool,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ProductFilter {
    /// Out-of-range paging falls back to defaults instead of failing.
    pub fn from_query(query: ProductQuery, include_inactive: bool) -> Self {
        let page = query.page.filter(|p| *p >= 1).unwrap_or(1);
        let limit = query
            .limit
            .filter(|l| (1..=MAX_PAGE_LIMIT).contains(l))
            .unwrap_or(DEFAULT_PAGE_LIMIT);
        Self {
            page,
            limit,
            category: non_blank(query.category),
            search: non_blank(query.search),
            include_inactive,
        }
    }

    /// LIKE pattern for `search`, with wildcards in the term escaped by `\`.
    pub fn search_pattern(&self) -> Option<String> {
        self.search.as_ref().map(|term| {
            let escaped = term
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        })
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }

    pub fn cache_key(&self) -> String {
        format!(
            "products:page:{}:limit:{}:category:{}:search:{}:inactive:{}",
            self.page,
            self.limit,
            self.category.as_deref().unwrap_or(""),
            self.search.as_deref().unwrap_or(""),
            self.include_inactive
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub products: Vec<Product>,
    pub pagination: Pagination,
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), CatalogError> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(CatalogError::InvalidInput(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(())
}

fn check_price(price: f64) -> Result<(), CatalogError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(CatalogError::InvalidInput(
            "price must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn check_stock(stock: i64) -> Result<(), CatalogError> {
    if stock < 0 {
        return Err(CatalogError::InvalidInput(
            "stock cannot be negative".to_string(),
        ));
    }
    Ok(())
}

impl CreateProductRequest {
    pub fn validate(&self) -> Result<(), CatalogError> {
        check_len("name", &self.name, 2, 200)?;
        check_price(self.price)?;
        check_stock(self.stock)?;
        check_len("category", &self.category, 2, 100)?;
        check_len("sku", &self.sku, 3, 50)?;
        Ok(())
    }
}

impl UpdateProductRequest {
    pub fn validate(&self) -> Result<(), CatalogError> {
        if let Some(name) = &self.name {
            check_len("name", name, 2, 200)?;
        }
        if let Some(price) = self.price {
            check_price(price)?;
        }
        if let Some(stock) = self.stock {
            check_stock(stock)?;
        }
        if let Some(category) = &self.category {
            check_len("category", category, 2, 100)?;
        }
        if let Some(sku) = &self.sku {
            check_len("sku", sku, 3, 50)?;
        }
        Ok(())
    }

    pub fn apply(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            product.description = description;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(category) = self.category {
            product.category = category.trim().to_string();
        }
        if let Some(sku) = self.sku {
            product.sku = sku.trim().to_string();
        }
        if let Some(image_url) = self.image_url {
            product.image_url = image_url;
        }
        if let Some(active) = self.active {
            product.active = active;
        }
    }
}
