//! Product Catalog
//! CRUD over products with a read-through cache

pub mod api;
pub mod errors;
pub mod models;
pub mod service;
pub mod store;

pub use errors::CatalogError;
pub use service::CatalogService;
pub use store::SqliteProductStore;
