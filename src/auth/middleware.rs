//! Authentication Middleware
//! Protect endpoints with bearer tokens and role checks

use crate::auth::{
    errors::AuthError,
    models::{User, UserRole},
    service::AuthService,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::{convert::Infallible, sync::Arc};
use tracing::debug;

/// The authenticated caller, resolved from the store on every request.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: User,
    pub role: UserRole,
}

impl Principal {
    fn from_user(user: User) -> Self {
        let role = user.role;
        Self { user, role }
    }

    pub fn user_id(&self) -> i64 {
        self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Capability check for handlers that need a role beyond their route policy.
    pub fn require_role(&self, role: UserRole) -> Result<&User, AuthError> {
        if self.role == role {
            Ok(&self.user)
        } else {
            Err(AuthError::AccessDenied {
                required: role.as_str(),
            })
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}

/// Principal if the request carried a valid token, for optional-auth routes.
#[derive(Debug, Clone)]
pub struct MaybePrincipal(pub Option<Principal>);

impl MaybePrincipal {
    pub fn is_admin(&self) -> bool {
        self.0.as_ref().is_some_and(Principal::is_admin)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybePrincipal
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybePrincipal(parts.extensions.get::<Principal>().cloned()))
    }
}

/// State for [`require_role`]: the service plus the role the route demands.
#[derive(Clone)]
pub struct RoleGate {
    pub service: Arc<AuthService>,
    pub role: UserRole,
}

impl RoleGate {
    pub fn new(service: Arc<AuthService>, role: UserRole) -> Self {
        Self { service, role }
    }

    pub fn admin(service: Arc<AuthService>) -> Self {
        Self::new(service, UserRole::Admin)
    }
}

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthError::MissingToken)?;
    let value = value.to_str().map_err(|_| AuthError::MalformedHeader)?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(AuthError::MalformedHeader)?;
    if token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token)
}

async fn resolve(service: &AuthService, headers: &HeaderMap) -> Result<Principal, AuthError> {
    let token = bearer_token(headers)?;
    let user = service.authenticate(token).await?;
    Ok(Principal::from_user(user))
}

/// Reject the request unless it carries a valid token for an active user.
pub async fn require_auth(
    State(service): State<Arc<AuthService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let principal = resolve(&service, req.headers()).await?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Authenticate, then require the gate's role.
pub async fn require_role(
    State(gate): State<RoleGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let principal = resolve(&gate.service, req.headers()).await?;

    if principal.role != gate.role {
        debug!(
            user_id = principal.user_id(),
            required = gate.role.as_str(),
            "Role check failed"
        );
        return Err(AuthError::AccessDenied {
            required: gate.role.as_str(),
        });
    }

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Attach a principal when the token checks out; otherwise continue anonymously.
pub async fn optional_auth(
    State(service): State<Arc<AuthService>>,
    mut req: Request,
    next: Next,
) -> Response {
    match resolve(&service, req.headers()).await {
        Ok(principal) => {
            req.extensions_mut().insert(principal);
        }
        Err(AuthError::MissingToken) => {}
        Err(e) => debug!(code = e.error_code(), "Ignoring invalid credentials on optional route"),
    }

    next.run(req).await
}
