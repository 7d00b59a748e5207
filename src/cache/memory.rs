//! In-memory cache store bounded by an LRU capacity.

use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;

use super::{CacheError, CacheStore, expiry_after, is_expired};

const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::new(1024).unwrap();

struct Entry {
    value: Vec<u8>,
    expires_at: u64,
}

/// Process-local cache store.
pub struct MemoryStore {
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemoryStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if !is_expired(entry.expires_at) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }
        entries.pop(key);
        Ok(None)
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.entries.lock().await.put(
            key.to_string(),
            Entry {
                value,
                expires_at: expiry_after(ttl),
            },
        );
        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.lock().await.pop(key).is_some())
    }

    async fn flush(&self) -> Result<(), CacheError> {
        self.entries.lock().await.clear();
        Ok(())
    }
}
