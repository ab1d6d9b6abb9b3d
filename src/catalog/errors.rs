use crate::{db::StoreError, response};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Product not found")]
    NotFound,
    #[error("A product with this SKU already exists")]
    DuplicateSku,
    #[error("{0}")]
    InvalidInput(String),
    #[error("Not enough stock")]
    InsufficientStock,
    #[error("storage failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => CatalogError::NotFound,
            StoreError::DuplicateKey => CatalogError::DuplicateSku,
            StoreError::OutOfRange => {
                CatalogError::InvalidInput("stock adjustment is out of range".to_string())
            }
            other => CatalogError::Store(other),
        }
    }
}

impl CatalogError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CatalogError::NotFound => StatusCode::NOT_FOUND,
            CatalogError::DuplicateSku | CatalogError::InsufficientStock => StatusCode::CONFLICT,
            CatalogError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CatalogError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            CatalogError::NotFound => "PRODUCT_NOT_FOUND",
            CatalogError::DuplicateSku => "DUPLICATE_SKU",
            CatalogError::InvalidInput(_) => "INVALID_DATA",
            CatalogError::InsufficientStock => "NOT_ENOUGH_STOCK",
            CatalogError::Store(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!(error = %self, "Catalog request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        response::failure(status, self.error_code(), message)
    }
}
