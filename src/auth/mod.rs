//! Authentication Module
//! Bearer tokens with rotating keys, bcrypt credentials and role-based access

pub mod api;
pub mod errors;
pub mod jwt;
pub mod keys;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;
pub mod user_store;

pub use errors::AuthError;
pub use jwt::JwtHandler;
pub use keys::{KeyManager, RotationTask};
pub use middleware::{
    optional_auth, require_auth, require_role, MaybePrincipal, Principal, RoleGate,
};
pub use password::PasswordHasher;
pub use service::AuthService;
pub use user_store::{CredentialStore, SqliteUserStore};
