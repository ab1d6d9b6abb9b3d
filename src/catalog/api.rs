//! Product API Endpoints

use crate::auth::MaybePrincipal;
use crate::catalog::{
    errors::CatalogError,
    models::{
        CreateProductRequest, ProductFilter, ProductListResponse, ProductQuery, StockAdjustment,
        UpdateProductRequest,
    },
    service::CatalogService,
};
use crate::response::{self, Pagination};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use std::sync::Arc;

/// GET /api/v1/products
pub async fn list_products(
    State(catalog): State<Arc<CatalogService>>,
    principal: MaybePrincipal,
    Query(query): Query<ProductQuery>,
) -> Result<Response, CatalogError> {
    let filter = ProductFilter::from_query(query, principal.is_admin());
    let page = catalog.list(&filter).await?;

    Ok(response::success(
        "Products",
        ProductListResponse {
            products: page.products,
            pagination: Pagination::new(filter.page, filter.limit, page.total),
        },
    ))
}

/// GET /api/v1/products/:id
pub async fn get_product(
    State(catalog): State<Arc<CatalogService>>,
    principal: MaybePrincipal,
    Path(id): Path<i64>,
) -> Result<Response, CatalogError> {
    let product = catalog.get(id, principal.is_admin()).await?;
    Ok(response::success("Product", product))
}

/// POST /api/v1/products (Admin only)
pub async fn create_product(
    State(catalog): State<Arc<CatalogService>>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<Response, CatalogError> {
    let product = catalog.create(payload).await?;
    Ok(response::created("Product created", product))
}

/// PUT /api/v1/products/:id (Admin only)
pub async fn update_product(
    State(catalog): State<Arc<CatalogService>>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Response, CatalogError> {
    let product = catalog.update(id, payload).await?;
    Ok(response::success("Product updated", product))
}

/// DELETE /api/v1/products/:id (Admin only)
pub async fn delete_product(
    State(catalog): State<Arc<CatalogService>>,
    Path(id): Path<i64>,
) -> Result<Response, CatalogError> {
    catalog.delete(id).await?;
    Ok(response::success("Product deleted", ()))
}

/// PATCH /api/v1/products/:id/stock (Admin only)
pub async fn adjust_stock(
    State(catalog): State<Arc<CatalogService>>,
    Path(id): Path<i64>,
    Json(payload): Json<StockAdjustment>,
) -> Result<Response, CatalogError> {
    let product = catalog.adjust_stock(id, payload.delta).await?;
    Ok(response::success("Stock updated", product))
}
