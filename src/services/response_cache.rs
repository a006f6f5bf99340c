// Response Cache
// Expiring key -> value store for semantic-layer responses, keyed by SHA-256 of the prompt.

use crate::services::config_store::CacheConfig;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

pub struct ResponseCache<V> {
    enabled: bool,
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

pub fn hash_key(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            ttl: Duration::from_secs(config.ttl_secs),
            max_entries: config.max_entries,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The cached value, unless absent or expired.
    pub fn get(&self, key: &str) -> Option<V> {
        if !self.enabled {
            return None;
        }
        let entries = self.lock();
        entries
            .get(&hash_key(key))
            .filter(|e| Instant::now() < e.expires_at)
            .map(|e| e.value.clone())
    }

    /// Stores `value`; when full, the entry closest to expiry makes room.
    pub fn set(&self, key: &str, value: V) {
        if !self.enabled || self.max_entries == 0 {
            return;
        }
        let hashed = hash_key(key);
        let mut entries = self.lock();

        if !entries.contains_key(&hashed) && entries.len() >= self.max_entries {
            let nearest = entries
                .iter()
                .min_by_key(|(_, e)| e.expires_at)
                .map(|(k, _)| k.clone());
            if let Some(k) = nearest {
                entries.remove(&k);
            }
        }

        entries.insert(
            hashed,
            CacheEntry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn delete(&self, key: &str) -> bool {
        self.lock().remove(&hash_key(key)).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops expired entries and returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| now < e.expires_at);
        before - entries.len()
    }
}

impl<V: Clone + Send + 'static> ResponseCache<V> {
    /// Periodically purges expired entries. The task ends once the cache is dropped.
    pub fn spawn_sweeper(cache: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(cache);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else { break };
                let removed = cache.cleanup_expired();
                if removed > 0 {
                    debug!("[CACHE] swept {} expired entries", removed);
                }
            }
        })
    }
}
