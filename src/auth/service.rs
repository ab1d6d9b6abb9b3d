//! Credential Manager
//! Registration, login, token resolution and password changes

use crate::auth::{
    errors::AuthError,
    jwt::JwtHandler,
    models::{NewUser, User, UserRole},
    password::{self, PasswordHasher},
    user_store::CredentialStore,
};
use crate::db::StoreError;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a successful register, login or refresh.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub user: User,
    pub token: String,
    pub expires_in: i64,
}

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    jwt: Arc<JwtHandler>,
    hasher: PasswordHasher,
    /// Verified against when the email is unknown so both login failures cost the same.
    dummy_hash: String,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        jwt: Arc<JwtHandler>,
        hasher: PasswordHasher,
    ) -> Result<Self, AuthError> {
        let dummy_hash = hasher.hash("timing-equalizer")?;
        Ok(Self {
            store,
            jwt,
            hasher,
            dummy_hash,
        })
    }

    pub fn jwt(&self) -> &Arc<JwtHandler> {
        &self.jwt
    }

    fn issue(&self, user: User) -> Result<IssuedToken, AuthError> {
        let (token, expires_in) = self.jwt.generate_token(&user)?;
        Ok(IssuedToken {
            user: user.scrubbed(),
            token,
            expires_in,
        })
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<IssuedToken, AuthError> {
        if self.store.find_by_email(email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }
        password::check_strength(password)?;

        let password_hash = self.hasher.hash_async(password).await?;
        let id = self
            .store
            .insert(NewUser {
                email: email.to_string(),
                password_hash,
                name: name.to_string(),
                role: UserRole::User,
                active: true,
            })
            .await
            .map_err(|e| match e {
                // lost a race with a concurrent registration
                StoreError::DuplicateKey => AuthError::DuplicateEmail,
                other => AuthError::Store(other),
            })?;

        let user = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(AuthError::UnknownUser)?;

        info!(user_id = user.id, "🆕 User registered");
        self.issue(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedToken, AuthError> {
        let Some(user) = self.store.find_by_email(email).await? else {
            self.hasher.verify_async(password, &self.dummy_hash).await;
            warn!("❌ Failed login attempt");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify_async(password, &user.password_hash).await {
            warn!(user_id = user.id, "❌ Failed login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.active {
            warn!(user_id = user.id, "Login refused for inactive account");
            return Err(AuthError::InactiveAccount);
        }

        info!(user_id = user.id, role = user.role.as_str(), "✅ Login successful");
        self.issue(user)
    }

    /// Resolve a bearer token to the stored user. Always hits the store, so
    /// role and active flag are current even if the token is older.
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.jwt.validate_token(token)?;

        let user = self
            .store
            .find_by_id(claims.user_id)
            .await?
            .ok_or(AuthError::UnknownUser)?;

        if !user.active {
            return Err(AuthError::InactiveAccount);
        }

        Ok(user.scrubbed())
    }

    pub async fn refresh(&self, token: &str) -> Result<IssuedToken, AuthError> {
        let user = self.authenticate(token).await?;
        self.issue(user)
    }

    pub async fn change_password(
        &self,
        user_id: i64,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UnknownUser)?;

        if !self
            .hasher
            .verify_async(old_password, &user.password_hash)
            .await
        {
            return Err(AuthError::IncorrectPassword);
        }
        password::check_strength(new_password)?;

        let hash = self.hasher.hash_async(new_password).await?;
        self.store
            .update_password(user_id, &hash)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => AuthError::UnknownUser,
                other => AuthError::Store(other),
            })?;

        info!(user_id, "🔐 Password changed");
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        let users = self.store.list().await?;
        Ok(users.into_iter().map(User::scrubbed).collect())
    }

    pub async fn set_active(&self, user_id: i64, active: bool) -> Result<User, AuthError> {
        self.store
            .set_active(user_id, active)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => AuthError::UnknownUser,
                other => AuthError::Store(other),
            })?;

        info!(user_id, active, "User activation changed");
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UnknownUser)?;
        Ok(user.scrubbed())
    }

    /// Create the initial admin account unless one with this email exists.
    /// Returns true when an account was created.
    pub async fn seed_admin(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<bool, AuthError> {
        if self.store.find_by_email(email).await?.is_some() {
            info!("Admin user already exists, skipping seed");
            return Ok(false);
        }
        password::check_strength(password)?;

        let password_hash = self.hasher.hash_async(password).await?;
        let result = self
            .store
            .insert(NewUser {
                email: email.to_string(),
                password_hash,
                name: name.to_string(),
                role: UserRole::Admin,
                active: true,
            })
            .await;

        match result {
            Ok(id) => {
                info!(user_id = id, email, "🔐 Admin user seeded");
                Ok(true)
            }
            Err(StoreError::DuplicateKey) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{keys::KeyManager, keys::DEFAULT_ROTATION_INTERVAL, SqliteUserStore};
    use tempfile::NamedTempFile;

    struct Fixture {
        service: AuthService,
        store: Arc<SqliteUserStore>,
        _temp: NamedTempFile,
    }

    fn fixture() -> Fixture {
        let temp = NamedTempFile::new().unwrap();
        let store = Arc::new(SqliteUserStore::new(temp.path().to_str().unwrap()).unwrap());
        let keys = Arc::new(KeyManager::new(DEFAULT_ROTATION_INTERVAL).unwrap());
        let jwt = Arc::new(JwtHandler::new(keys));
        let service = AuthService::new(store.clone(), jwt, PasswordHasher::new(4)).unwrap();
        Fixture {
            service,
            store,
            _temp: temp,
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let f = fixture();

        let registered = f.service.register("a@x.com", "secret1", "Ana").await.unwrap();
        assert!(!registered.token.is_empty());
        assert!(registered.user.password_hash.is_empty());
        assert_eq!(registered.user.role, UserRole::User);
        assert!(registered.user.active);

        let logged_in = f.service.login("a@x.com", "secret1").await.unwrap();
        assert_eq!(logged_in.user.id, registered.user.id);
        assert!(logged_in.user.password_hash.is_empty());
        assert!(!logged_in.token.is_empty());
    }

    #[tokio::test]
    async fn test_register_duplicate_email_wins_over_other_checks() {
        let f = fixture();
        f.service.register("a@x.com", "secret1", "Ana").await.unwrap();

        let again = f.service.register("a@x.com", "another", "Bea").await;
        assert!(matches!(again, Err(AuthError::DuplicateEmail)));

        let weak = f.service.register("a@x.com", "123", "Bea").await;
        assert!(matches!(weak, Err(AuthError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn test_concurrent_registrations_one_winner() {
        let f = fixture();
        let register = || f.service.register("a@x.com", "secret1", "Ana");

        // all four pass the lookup before any of them inserts
        let (a, b, c, d) = tokio::join!(register(), register(), register(), register());
        let results = [a, b, c, d];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for result in results.iter().filter(|r| r.is_err()) {
            assert!(
                matches!(result, Err(AuthError::DuplicateEmail)),
                "unexpected error: {result:?}"
            );
        }
        assert_eq!(f.service.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_register_weak_password() {
        let f = fixture();
        let result = f.service.register("a@x.com", "12345", "Ana").await;
        assert!(matches!(result, Err(AuthError::WeakPassword { min: 6 })));
        assert!(f.store.find_by_email("a@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let f = fixture();
        f.service.register("a@x.com", "secret1", "Ana").await.unwrap();

        let wrong = f.service.login("a@x.com", "wrong").await.unwrap_err();
        let unknown = f.service.login("nobody@x.com", "secret1").await.unwrap_err();

        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert_eq!(wrong.error_code(), unknown.error_code());
    }

    #[tokio::test]
    async fn test_inactive_account() {
        let f = fixture();
        let issued = f.service.register("a@x.com", "secret1", "Ana").await.unwrap();

        f.service.set_active(issued.user.id, false).await.unwrap();

        assert!(matches!(
            f.service.authenticate(&issued.token).await,
            Err(AuthError::InactiveAccount)
        ));
        assert!(matches!(
            f.service.login("a@x.com", "secret1").await,
            Err(AuthError::InactiveAccount)
        ));
        // wrong password on an inactive account reveals nothing more
        assert!(matches!(
            f.service.login("a@x.com", "wrong!").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_authenticate_returns_stored_user() {
        let f = fixture();
        let issued = f.service.register("a@x.com", "secret1", "Ana").await.unwrap();

        let user = f.service.authenticate(&issued.token).await.unwrap();
        assert_eq!(user.id, issued.user.id);
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.name, "Ana");
        assert_eq!(user.role, UserRole::User);
        assert!(user.password_hash.is_empty());
    }

    #[tokio::test]
    async fn test_reactivated_account_authenticates_again() {
        let f = fixture();
        let issued = f.service.register("a@x.com", "secret1", "Ana").await.unwrap();

        f.service.set_active(issued.user.id, false).await.unwrap();
        assert!(f.service.authenticate(&issued.token).await.is_err());

        let user = f.service.set_active(issued.user.id, true).await.unwrap();
        assert!(user.active);
        assert!(f.service.authenticate(&issued.token).await.is_ok());

        assert!(matches!(
            f.service.set_active(999, true).await,
            Err(AuthError::UnknownUser)
        ));
    }

    #[tokio::test]
    async fn test_authenticate_unknown_user() {
        let f = fixture();
        let ghost = User {
            id: 999,
            email: "ghost@x.com".to_string(),
            password_hash: String::new(),
            name: "Ghost".to_string(),
            role: UserRole::User,
            active: true,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let (token, _) = f.service.jwt().generate_token(&ghost).unwrap();

        assert!(matches!(
            f.service.authenticate(&token).await,
            Err(AuthError::UnknownUser)
        ));
        assert!(matches!(
            f.service.refresh(&token).await,
            Err(AuthError::UnknownUser)
        ));
    }

    #[tokio::test]
    async fn test_authenticate_propagates_token_errors() {
        let f = fixture();
        assert!(matches!(
            f.service.authenticate("garbage").await,
            Err(AuthError::MalformedToken)
        ));
    }

    #[tokio::test]
    async fn test_refresh_issues_new_token() {
        let f = fixture();
        let issued = f.service.register("a@x.com", "secret1", "Ana").await.unwrap();

        f.service.jwt().keys().rotate().unwrap();
        let refreshed = f.service.refresh(&issued.token).await.unwrap();
        assert_eq!(refreshed.user.id, issued.user.id);

        // new token is signed with the rotated key
        let claims = f.service.jwt().validate_token(&refreshed.token).unwrap();
        assert_eq!(claims.key_id, f.service.jwt().keys().current_key_id());
    }

    #[tokio::test]
    async fn test_change_password() {
        let f = fixture();
        let issued = f.service.register("a@x.com", "secret1", "Ana").await.unwrap();
        let id = issued.user.id;

        assert!(matches!(
            f.service.change_password(id, "wrong!", "newsecret").await,
            Err(AuthError::IncorrectPassword)
        ));
        assert!(matches!(
            f.service.change_password(id, "secret1", "short").await,
            Err(AuthError::WeakPassword { .. })
        ));
        assert!(matches!(
            f.service.change_password(999, "secret1", "newsecret").await,
            Err(AuthError::UnknownUser)
        ));

        f.service.change_password(id, "secret1", "newsecret").await.unwrap();
        assert!(f.service.login("a@x.com", "newsecret").await.is_ok());
        assert!(matches!(
            f.service.login("a@x.com", "secret1").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_seed_admin_is_idempotent() {
        let f = fixture();
        assert!(f.service.seed_admin("root@x.com", "rootpass", "Root").await.unwrap());
        assert!(!f.service.seed_admin("root@x.com", "rootpass", "Root").await.unwrap());

        let admin = f.service.login("root@x.com", "rootpass").await.unwrap();
        assert_eq!(admin.user.role, UserRole::Admin);
        assert_eq!(f.store.count_admins().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_users_is_scrubbed() {
        let f = fixture();
        f.service.register("a@x.com", "secret1", "Ana").await.unwrap();
        f.service.register("b@x.com", "secret2", "Bea").await.unwrap();

        let users = f.service.list_users().await.unwrap();
        assert_eq!(users.len(), 2);
        assert!(users.iter().all(|u| u.password_hash.is_empty()));
    }
}
