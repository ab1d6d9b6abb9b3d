//! Application state, startup wiring and the HTTP router.

use crate::{
    auth::{
        self, optional_auth, require_auth, require_role, AuthService, JwtHandler, KeyManager,
        PasswordHasher, RoleGate, SqliteUserStore,
    },
    cache::{Cache, MemoryCache},
    catalog::{self, CatalogService, SqliteProductStore},
    config::Config,
    middleware::request_logging,
    response,
};
use anyhow::{Context, Result};
use axum::{
    extract::FromRef,
    middleware,
    response::Response,
    routing::{get, patch, post, put},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub catalog: Arc<CatalogService>,
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl FromRef<AppState> for Arc<CatalogService> {
    fn from_ref(state: &AppState) -> Self {
        state.catalog.clone()
    }
}

/// Everything `main` needs: handler state plus the key manager for rotation.
pub struct App {
    pub state: AppState,
    pub keys: Arc<KeyManager>,
}

/// Open stores, load keys and run the configured seeding.
pub async fn bootstrap(config: &Config) -> Result<App> {
    let keys = Arc::new(match &config.jwt_secret {
        Some(secret) => KeyManager::from_secret(secret.as_bytes(), config.rotation_interval()),
        None => KeyManager::new(config.rotation_interval())?,
    });
    let jwt = Arc::new(JwtHandler::with_ttl(keys.clone(), config.token_ttl_hours));

    let users = Arc::new(
        SqliteUserStore::new(&config.database_path).context("Failed to open user store")?,
    );
    let auth = Arc::new(
        AuthService::new(users, jwt, PasswordHasher::new(config.bcrypt_cost))
            .context("Failed to initialize auth service")?,
    );
    info!(db = %config.database_path, "🔐 Authentication initialized");

    if let Some(seed) = config.admin_seed() {
        auth.seed_admin(seed.email, seed.password, seed.name)
            .await
            .context("Failed to seed admin user")?;
    }

    let products = SqliteProductStore::new(&config.database_path)
        .context("Failed to open product store")?;
    let cache: Option<Arc<dyn Cache>> = if config.cache_enabled {
        Some(Arc::new(MemoryCache::new()))
    } else {
        None
    };
    let catalog = Arc::new(CatalogService::new(products, cache));
    info!(cache = config.cache_enabled, "📦 Catalog initialized");

    if config.seed_products {
        catalog
            .seed_products()
            .await
            .context("Failed to seed products")?;
    }

    Ok(App {
        state: AppState { auth, catalog },
        keys,
    })
}

async fn health() -> Response {
    response::success(
        "OK",
        json!({
            "status": "healthy",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}

pub fn build_router(state: AppState) -> Router {
    let public: Router<AppState> = Router::new()
        .route("/health", get(health))
        .route("/register", post(auth::api::register))
        .route("/login", post(auth::api::login))
        .route("/auth/refresh", post(auth::api::refresh));

    let authenticated: Router<AppState> = Router::new()
        .route("/auth/me", get(auth::api::me))
        .route("/auth/password", put(auth::api::change_password))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_auth,
        ));

    let admin: Router<AppState> = Router::new()
        .route("/admin/users", get(auth::api::list_users))
        .route("/admin/users/:id/active", patch(auth::api::set_active))
        .route("/products", post(catalog::api::create_product))
        .route(
            "/products/:id",
            put(catalog::api::update_product).delete(catalog::api::delete_product),
        )
        .route("/products/:id/stock", patch(catalog::api::adjust_stock))
        .route_layer(middleware::from_fn_with_state(
            RoleGate::admin(state.auth.clone()),
            require_role,
        ));

    let browse: Router<AppState> = Router::new()
        .route("/products", get(catalog::api::list_products))
        .route("/products/:id", get(catalog::api::get_product))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            optional_auth,
        ));

    let api: Router<AppState> = Router::new()
        .merge(public)
        .merge(authenticated)
        .merge(admin)
        .merge(browse);

    Router::new()
        .nest("/api/v1", api)
        .layer(middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
