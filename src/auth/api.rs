//! Authentication API Endpoints
//! Register, login, token refresh and user administration

use crate::auth::{
    errors::AuthError,
    middleware::{bearer_token, Principal},
    models::{
        AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest, SetActiveRequest,
        UserResponse,
    },
    service::{AuthService, IssuedToken},
};
use crate::response;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

const MIN_NAME_LEN: usize = 2;
const MAX_NAME_LEN: usize = 100;

fn auth_body(issued: IssuedToken) -> AuthResponse {
    AuthResponse {
        token: issued.token,
        expires_in: issued.expires_in,
        user: UserResponse::from_user(&issued.user),
    }
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !email.contains(' '),
        None => false,
    };
    if !valid {
        return Err(AuthError::InvalidInput("A valid email is required".to_string()));
    }
    Ok(())
}

fn validate_registration(payload: &RegisterRequest) -> Result<(), AuthError> {
    validate_email(&payload.email)?;
    let name_len = payload.name.trim().chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&name_len) {
        return Err(AuthError::InvalidInput(format!(
            "Name must be between {MIN_NAME_LEN} and {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Register endpoint - POST /api/v1/register
pub async fn register(
    State(auth): State<Arc<AuthService>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, AuthError> {
    validate_registration(&payload)?;

    let issued = auth
        .register(&payload.email, &payload.password, payload.name.trim())
        .await?;

    Ok(response::created("User registered successfully", auth_body(issued)))
}

/// Login endpoint - POST /api/v1/login
pub async fn login(
    State(auth): State<Arc<AuthService>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, AuthError> {
    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(AuthError::InvalidInput(
            "Email and password are required".to_string(),
        ));
    }

    let issued = auth.login(&payload.email, &payload.password).await?;
    Ok(response::success("Login successful", auth_body(issued)))
}

/// Refresh endpoint - POST /api/v1/auth/refresh
/// Reads the bearer token itself; a valid token yields a fresh one.
pub async fn refresh(
    State(auth): State<Arc<AuthService>>,
    headers: HeaderMap,
) -> Result<Response, AuthError> {
    let token = bearer_token(&headers)?;
    let issued = auth.refresh(token).await?;
    Ok(response::success("Token refreshed", auth_body(issued)))
}

/// Current user - GET /api/v1/auth/me
pub async fn me(principal: Principal) -> Response {
    response::success("Profile", UserResponse::from_user(&principal.user))
}

/// Change own password - PUT /api/v1/auth/password
pub async fn change_password(
    State(auth): State<Arc<AuthService>>,
    principal: Principal,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Response, AuthError> {
    auth.change_password(
        principal.user_id(),
        &payload.old_password,
        &payload.new_password,
    )
    .await?;

    Ok(response::success("Password changed", ()))
}

/// List all users - GET /api/v1/admin/users (Admin only)
pub async fn list_users(State(auth): State<Arc<AuthService>>) -> Result<Response, AuthError> {
    let users: Vec<UserResponse> = auth
        .list_users()
        .await?
        .iter()
        .map(UserResponse::from_user)
        .collect();

    Ok(response::success("Users", users))
}

/// Activate or deactivate - PATCH /api/v1/admin/users/:id/active (Admin only)
pub async fn set_active(
    State(auth): State<Arc<AuthService>>,
    principal: Principal,
    Path(user_id): Path<i64>,
    Json(payload): Json<SetActiveRequest>,
) -> Response {
    if user_id == principal.user_id() && !payload.active {
        return AuthError::InvalidInput("Cannot deactivate your own account".to_string())
            .into_response();
    }

    match auth.set_active(user_id, payload.active).await {
        Ok(user) => response::success("User updated", UserResponse::from_user(&user)),
        // Here the id comes from the path, not a token
        Err(AuthError::UnknownUser) => response::failure(
            StatusCode::NOT_FOUND,
            "USER_NOT_FOUND",
            "User not found".to_string(),
        ),
        Err(e) => e.into_response(),
    }
}
