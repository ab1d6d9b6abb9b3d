//! Advisory key/value cache.
//! Entries are JSON strings with a TTL; a miss is always safe.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::{collections::HashMap, time::Duration};
use tokio::time::Instant;
use tracing::debug;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String, ttl: Duration);
    async fn delete(&self, key: &str);
    /// Drop every key starting with `prefix`.
    async fn delete_prefix(&self, prefix: &str);
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process cache. Expired entries are dropped lazily on read and on write.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_expired(entries: &mut HashMap<String, Entry>, now: Instant) {
        entries.retain(|_, e| e.expires_at > now);
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(e) if e.expires_at > now => return Some(e.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        self.entries.write().remove(key);
        debug!(key, "Cache entry expired");
        None
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write();
        Self::purge_expired(&mut entries, now);
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    async fn delete(&self, key: &str) {
        self.entries.write().remove(key);
    }

    async fn delete_prefix(&self, prefix: &str) {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        debug!(prefix, removed = before - entries.len(), "Cache invalidated");
    }
}
