//! JWT Token Handler
//! Mint and verify HMAC-signed tokens against the rotating key set

use crate::auth::{
    errors::AuthError,
    keys::KeyManager,
    models::{Claims, User},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, Header, Validation,
};
use std::sync::Arc;
use tracing::{debug, error};

const HMAC_ALGORITHMS: [&str; 3] = ["HS256", "HS384", "HS512"];

pub const TOKEN_ISSUER: &str = "loja-backend";
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// JWT Handler for token operations
pub struct JwtHandler {
    keys: Arc<KeyManager>,
    expiration_hours: i64,
}

impl JwtHandler {
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self::with_ttl(keys, DEFAULT_TOKEN_TTL_HOURS)
    }

    pub fn with_ttl(keys: Arc<KeyManager>, expiration_hours: i64) -> Self {
        Self {
            keys,
            expiration_hours,
        }
    }

    pub fn keys(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    pub fn expires_in_secs(&self) -> i64 {
        self.expiration_hours.saturating_mul(3600)
    }

    /// Generate a JWT token for a user. Returns the token and its lifetime in seconds.
    pub fn generate_token(&self, user: &User) -> Result<(String, i64), AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now,
            nbf: now,
            exp: now.saturating_add(self.expires_in_secs()),
            iss: TOKEN_ISSUER.to_string(),
            sub: user.email.clone(),
            key_id: String::new(),
        };

        debug!(
            user_id = user.id,
            expires_in_h = self.expiration_hours,
            "Generating JWT"
        );

        let token = self.sign(&claims)?;
        Ok((token, self.expires_in_secs()))
    }

    /// Sign arbitrary claims with the current key.
    pub(crate) fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        let (key, kid) = self.keys.current_signing_key();
        let mut header = Header::new(SIGNING_ALGORITHM);
        header.kid = Some(kid);

        encode(&header, claims, &key).map_err(|e| {
            error!(error = %e, "Failed to sign JWT");
            AuthError::SigningFailure
        })
    }

    /// Validate a JWT token and extract claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token).map_err(|_| header_error(token))?;

        if !matches!(
            header.alg,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            debug!(alg = ?header.alg, "Rejected token with non-HMAC algorithm");
            return Err(AuthError::UnsupportedAlgorithm);
        }

        let kid = header.kid.ok_or(AuthError::UnknownKey)?;
        let key = self.keys.verification_key(&kid)?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = 0;
        // Time bounds are checked below with strict comparisons.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);

        let decoded = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::InvalidAlgorithm => AuthError::UnsupportedAlgorithm,
            _ => AuthError::MalformedToken,
        })?;

        let mut claims = decoded.claims;
        let now = Utc::now().timestamp();
        if now >= claims.exp {
            return Err(AuthError::Expired);
        }
        if now < claims.nbf {
            return Err(AuthError::NotYetValid);
        }

        claims.key_id = kid;
        debug!(user_id = claims.user_id, "Validated JWT");
        Ok(claims)
    }
}

/// Classify a header jsonwebtoken refused to parse. Algorithms it has no
/// variant for (`none` among them) still surface as unsupported.
fn header_error(token: &str) -> AuthError {
    let alg = token
        .split('.')
        .next()
        .and_then(|segment| URL_SAFE_NO_PAD.decode(segment).ok())
        .and_then(|raw| serde_json::from_slice::<serde_json::Value>(&raw).ok())
        .and_then(|header| header.get("alg")?.as_str().map(str::to_string));

    match alg {
        Some(alg) if !HMAC_ALGORITHMS.contains(&alg.as_str()) => {
            debug!(alg, "Rejected token with non-HMAC algorithm");
            AuthError::UnsupportedAlgorithm
        }
        _ => AuthError::MalformedToken,
    }
}
