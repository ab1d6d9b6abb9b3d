//! HTTP middleware for observability.
//!
//! Access control lives in `auth::middleware`.

pub mod logging;

pub use logging::request_logging;
