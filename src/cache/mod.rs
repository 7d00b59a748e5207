//! # Keyed Cache
//!
//! A small get/put/remember/flush cache over a pluggable [`CacheStore`].
//! Values are stored as JSON with a time-to-live. The cache is a memoization
//! layer: read or write failures inside [`Cache::remember`] are logged and
//! treated as a miss instead of failing the caller.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, warn};

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Cache key of the provider listing.
pub const PROVIDERS_KEY: &str = "providers";

/// Errors raised by cache stores.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Byte-level storage backing a [`Cache`].
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the stored bytes for `key` unless absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Stores `value` under `key` for `ttl`, replacing any previous entry.
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Removes `key`, returning whether an entry existed.
    async fn forget(&self, key: &str) -> Result<bool, CacheError>;

    /// Removes every entry of the store.
    async fn flush(&self) -> Result<(), CacheError>;
}

/// Typed cache facade over a shared store.
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.store.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn put<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value)?;
        self.store.put(key, bytes, ttl).await
    }

    pub async fn forget(&self, key: &str) -> Result<bool, CacheError> {
        self.store.forget(key).await
    }

    /// Clears the whole cache namespace, not only a single key.
    pub async fn flush(&self) -> Result<(), CacheError> {
        debug!("Flushing cache");
        self.store.flush().await
    }

    /// Returns the cached value for `key`, or runs `producer` and caches its result for `ttl`.
    ///
    /// Producer errors are returned unchanged and nothing is cached.
    pub async fn remember<T, E, F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.get::<T>(key).await {
            Ok(Some(value)) => {
                counter!("cache_hits_total").increment(1);
                return Ok(value);
            }
            Ok(None) => {}
            Err(err) => warn!(key, error = %err, "Ignoring unreadable cache entry"),
        }

        counter!("cache_misses_total").increment(1);
        let value = producer().await?;

        if let Err(err) = self.put(key, &value, ttl).await {
            warn!(key, error = %err, "Failed to store cache entry");
        }

        Ok(value)
    }
}

/// Milliseconds since the unix epoch.
pub(crate) fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

pub(crate) fn expiry_after(ttl: Duration) -> u64 {
    now_millis().saturating_add(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))
}

pub(crate) fn is_expired(expires_at: u64) -> bool {
    now_millis() >= expires_at
}
