//! Authentication error taxonomy and its HTTP mapping.

use crate::{db::StoreError, response};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email is already registered")]
    DuplicateEmail,
    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Account is inactive")]
    InactiveAccount,
    #[error("User not found")]
    UnknownUser,
    #[error("Current password is incorrect")]
    IncorrectPassword,
    #[error("Malformed token")]
    MalformedToken,
    #[error("Unsupported token algorithm")]
    UnsupportedAlgorithm,
    #[error("Invalid token signature")]
    InvalidSignature,
    #[error("Token has expired")]
    Expired,
    #[error("Token is not valid yet")]
    NotYetValid,
    #[error("Token was signed with an unknown key")]
    UnknownKey,
    #[error("Failed to process credentials")]
    HashingFailure,
    #[error("Failed to sign token")]
    SigningFailure,
    #[error("Authorization header is missing")]
    MissingToken,
    #[error("Invalid authorization format. Use: Bearer <token>")]
    MalformedHeader,
    #[error("Access denied. Requires role: {required}")]
    AccessDenied { required: &'static str },
    #[error("{0}")]
    InvalidInput(String),
    #[error("storage failure: {0}")]
    Store(#[from] StoreError),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::DuplicateEmail => StatusCode::CONFLICT,
            AuthError::WeakPassword { .. }
            | AuthError::IncorrectPassword
            | AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials
            | AuthError::InactiveAccount
            | AuthError::UnknownUser
            | AuthError::MalformedToken
            | AuthError::UnsupportedAlgorithm
            | AuthError::InvalidSignature
            | AuthError::Expired
            | AuthError::NotYetValid
            | AuthError::UnknownKey
            | AuthError::MissingToken
            | AuthError::MalformedHeader => StatusCode::UNAUTHORIZED,
            AuthError::AccessDenied { .. } => StatusCode::FORBIDDEN,
            AuthError::HashingFailure | AuthError::SigningFailure | AuthError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::DuplicateEmail => "DUPLICATE_EMAIL",
            AuthError::WeakPassword { .. } => "WEAK_PASSWORD",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::InactiveAccount => "INACTIVE_ACCOUNT",
            AuthError::UnknownUser => "UNKNOWN_USER",
            AuthError::IncorrectPassword => "INCORRECT_PASSWORD",
            AuthError::MalformedToken => "MALFORMED_TOKEN",
            AuthError::UnsupportedAlgorithm => "UNSUPPORTED_ALGORITHM",
            AuthError::InvalidSignature => "INVALID_SIGNATURE",
            AuthError::Expired => "TOKEN_EXPIRED",
            AuthError::NotYetValid => "TOKEN_NOT_YET_VALID",
            AuthError::UnknownKey => "UNKNOWN_KEY",
            AuthError::HashingFailure => "HASHING_FAILURE",
            AuthError::SigningFailure => "SIGNING_FAILURE",
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::MalformedHeader => "MALFORMED_HEADER",
            AuthError::AccessDenied { .. } => "ACCESS_DENIED",
            AuthError::InvalidInput(_) => "INVALID_INPUT",
            AuthError::Store(_) => "INTERNAL_ERROR",
        }
    }

    /// True for failures produced while verifying a bearer token.
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            AuthError::MalformedToken
                | AuthError::UnsupportedAlgorithm
                | AuthError::InvalidSignature
                | AuthError::Expired
                | AuthError::NotYetValid
                | AuthError::UnknownKey
        )
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!(error = %self, code = self.error_code(), "Auth request failed");
            "Internal server error".to_string()
        } else {
            debug!(code = self.error_code(), "Auth request rejected");
            self.to_string()
        };

        response::failure(status, self.error_code(), message)
    }
}
