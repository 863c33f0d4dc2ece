use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const FAST_GAS_PRICE_KEY: &str = "gas_station_fast_gas_price";

/// Key-value store with expiring entries, also used as the lock service.
#[async_trait]
pub trait SharedCache: Send + Sync {
    /// Sets `key` if it does not exist yet. Returns false when the key is held.
    async fn acquire(&self, key: &str, ttl: Duration) -> bool;

    async fn release(&self, key: &str);

    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>);
}

#[derive(Debug)]
struct CacheEntry {
    value: String,
    expires: Option<Instant>,
}

impl CacheEntry {
    fn is_alive(&self, now: Instant) -> bool {
        self.expires.map(|expires| expires > now).unwrap_or(true)
    }
}

/// Process local [`SharedCache`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SharedCache for MemoryCache {
    async fn acquire(&self, key: &str, ttl: Duration) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get(key) {
            if entry.is_alive(now) {
                return false;
            }
        }
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: "1".to_string(),
                expires: Some(now + ttl),
            },
        );
        true
    }

    async fn release(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    async fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.is_alive(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let expires = ttl.map(|ttl| Instant::now() + ttl);
        self.entries.lock().await.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires,
            },
        );
    }
}
