//! Signing Key Manager
//! Two generations of HMAC key material with periodic rotation

use crate::auth::errors::AuthError;
use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey};
use parking_lot::RwLock;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle, time::Instant};
use tracing::{debug, error, info};

pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_secs(7 * 24 * 3600);
pub const DEFAULT_ROTATION_TICK: Duration = Duration::from_secs(24 * 3600);

const SECRET_LEN: usize = 64;
const KEY_ID_LEN: usize = 16;

struct SigningKey {
    secret: Vec<u8>,
    key_id: String,
    created_at: DateTime<Utc>,
}

impl SigningKey {
    fn generate() -> Result<Self> {
        let mut secret = vec![0u8; SECRET_LEN];
        OsRng
            .try_fill_bytes(&mut secret)
            .context("entropy source failed while generating signing key")?;

        let mut id = [0u8; KEY_ID_LEN];
        OsRng
            .try_fill_bytes(&mut id)
            .context("entropy source failed while generating key id")?;

        Ok(Self {
            secret,
            key_id: URL_SAFE_NO_PAD.encode(id),
            created_at: Utc::now(),
        })
    }

    /// Deterministic key id so tokens survive a restart with the same secret.
    fn from_secret(secret: &[u8]) -> Self {
        let digest = Sha256::digest(secret);
        Self {
            secret: secret.to_vec(),
            key_id: hex::encode(&digest[..KEY_ID_LEN / 2]),
            created_at: Utc::now(),
        }
    }
}

struct KeySet {
    current: SigningKey,
    previous: Option<SigningKey>,
    rotated_at: Instant,
}

/// Owns the signing keys. Readers sign and verify concurrently; `rotate`
/// takes the write lock only for the pointer swap.
pub struct KeyManager {
    keys: RwLock<KeySet>,
    rotation_interval: Duration,
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys = self.keys.read();
        f.debug_struct("KeyManager")
            .field("current_kid", &short_kid(&keys.current.key_id))
            .field("has_previous", &keys.previous.is_some())
            .field("rotation_interval", &self.rotation_interval)
            .finish()
    }
}

impl KeyManager {
    /// Start with a freshly generated random key.
    pub fn new(rotation_interval: Duration) -> Result<Self> {
        let current = SigningKey::generate()?;
        info!(kid = short_kid(&current.key_id), "🔑 Signing key generated");
        Ok(Self::with_current(current, rotation_interval))
    }

    /// Start from a configured secret. Rotation replaces it with random keys.
    pub fn from_secret(secret: &[u8], rotation_interval: Duration) -> Self {
        let current = SigningKey::from_secret(secret);
        info!(
            kid = short_kid(&current.key_id),
            "🔑 Signing key loaded from configured secret"
        );
        Self::with_current(current, rotation_interval)
    }

    fn with_current(current: SigningKey, rotation_interval: Duration) -> Self {
        Self {
            keys: RwLock::new(KeySet {
                current,
                previous: None,
                rotated_at: Instant::now(),
            }),
            rotation_interval,
        }
    }

    /// Key used for minting new tokens, with its id.
    pub fn current_signing_key(&self) -> (EncodingKey, String) {
        let keys = self.keys.read();
        (
            EncodingKey::from_secret(&keys.current.secret),
            keys.current.key_id.clone(),
        )
    }

    pub fn current_key_id(&self) -> String {
        self.keys.read().current.key_id.clone()
    }

    pub fn current_key_created_at(&self) -> DateTime<Utc> {
        self.keys.read().current.created_at
    }

    /// Resolve the verification key for a token's `kid`.
    pub fn verification_key(&self, key_id: &str) -> Result<DecodingKey, AuthError> {
        let keys = self.keys.read();
        if keys.current.key_id == key_id {
            return Ok(DecodingKey::from_secret(&keys.current.secret));
        }
        match &keys.previous {
            Some(previous) if previous.key_id == key_id => {
                Ok(DecodingKey::from_secret(&previous.secret))
            }
            _ => Err(AuthError::UnknownKey),
        }
    }

    /// Demote the current key to previous and install a fresh one.
    pub fn rotate(&self) -> Result<()> {
        // Generate outside the lock so the write section is a swap.
        let fresh = SigningKey::generate()?;
        let new_kid = short_kid(&fresh.key_id).to_string();

        let mut keys = self.keys.write();
        let old = std::mem::replace(&mut keys.current, fresh);
        keys.previous = Some(old);
        keys.rotated_at = Instant::now();
        drop(keys);

        info!(kid = %new_kid, "🔄 Signing key rotated");
        Ok(())
    }

    pub fn should_rotate(&self) -> bool {
        self.keys.read().rotated_at.elapsed() > self.rotation_interval
    }

    /// Spawn the periodic rotation check. Stop it with [`RotationTask::shutdown`].
    pub fn spawn_rotation(self: &Arc<Self>, tick: Duration) -> RotationTask {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let manager = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + tick, tick);
            info!(tick_secs = tick.as_secs(), "⏱️  Key rotation task started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if manager.should_rotate() {
                            if let Err(e) = manager.rotate() {
                                error!("Key rotation failed: {e:#}");
                            }
                        } else {
                            debug!("Key rotation not due");
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Key rotation task stopped");
        });

        RotationTask { stop_tx, handle }
    }
}

/// Handle to the background rotation task.
pub struct RotationTask {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RotationTask {
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            error!("Key rotation task ended abnormally: {e}");
        }
    }
}

fn short_kid(kid: &str) -> &str {
    kid.get(..8).unwrap_or(kid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_key_verifies() {
        let manager = KeyManager::new(DEFAULT_ROTATION_INTERVAL).unwrap();
        let (_, kid) = manager.current_signing_key();
        assert!(manager.verification_key(&kid).is_ok());
        assert!(matches!(
            manager.verification_key("nope"),
            Err(AuthError::UnknownKey)
        ));
    }

    #[test]
    fn test_previous_key_kept_for_one_rotation() {
        let manager = KeyManager::new(DEFAULT_ROTATION_INTERVAL).unwrap();
        let original = manager.current_key_id();

        manager.rotate().unwrap();
        assert_ne!(manager.current_key_id(), original);
        assert!(manager.verification_key(&original).is_ok());

        manager.rotate().unwrap();
        assert!(matches!(
            manager.verification_key(&original),
            Err(AuthError::UnknownKey)
        ));
    }

    #[test]
    fn test_configured_secret_has_stable_kid() {
        let a = KeyManager::from_secret(b"a-long-configured-secret", DEFAULT_ROTATION_INTERVAL);
        let b = KeyManager::from_secret(b"a-long-configured-secret", DEFAULT_ROTATION_INTERVAL);
        let c = KeyManager::from_secret(b"another-secret", DEFAULT_ROTATION_INTERVAL);
        assert_eq!(a.current_key_id(), b.current_key_id());
        assert_ne!(a.current_key_id(), c.current_key_id());
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let manager = KeyManager::from_secret(b"super-secret-material", DEFAULT_ROTATION_INTERVAL);
        let out = format!("{manager:?}");
        assert!(!out.contains("super-secret-material"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_rotate_after_interval() {
        let manager = KeyManager::new(Duration::from_secs(60)).unwrap();
        assert!(!manager.should_rotate());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(manager.should_rotate());

        manager.rotate().unwrap();
        assert!(!manager.should_rotate());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotation_task_rotates_and_stops() {
        let manager = Arc::new(KeyManager::new(DEFAULT_ROTATION_INTERVAL).unwrap());
        let original = manager.current_key_id();

        let task = manager.spawn_rotation(DEFAULT_ROTATION_TICK);

        // Six daily ticks: not due yet.
        tokio::time::sleep(Duration::from_secs(6 * 24 * 3600 + 60)).await;
        assert_eq!(manager.current_key_id(), original);

        // Day eight: past the seven-day interval.
        tokio::time::sleep(Duration::from_secs(2 * 24 * 3600)).await;
        assert_ne!(manager.current_key_id(), original);

        task.shutdown().await;
    }
}
