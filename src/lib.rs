//! Loja Backend Library
//!
//! Exposes the storefront modules for the server binary and integration tests.

pub mod auth;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod middleware;
pub mod response;
pub mod server;

pub use config::Config;
pub use server::{bootstrap, build_router, App, AppState};
