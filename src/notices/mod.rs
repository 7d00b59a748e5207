//! Flash notices shown once on the next admin page render.
//!
//! Each severity level keeps its own de-duplicated queue in a [`CacheStore`]
//! under `zl_notice_<level>`. Adding a message resets the queue's ttl.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use crate::cache::{CacheError, CacheStore, MemoryStore};

/// Severity of a notice, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Error,
    Success,
    Warning,
    Info,
}

impl NoticeLevel {
    /// All levels in the order they are displayed.
    pub const ALL: [NoticeLevel; 4] = [
        NoticeLevel::Error,
        NoticeLevel::Success,
        NoticeLevel::Warning,
        NoticeLevel::Info,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeLevel::Error => "error",
            NoticeLevel::Success => "success",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Info => "info",
        }
    }

    fn key(&self) -> String {
        format!("zl_notice_{}", self.as_str())
    }
}

/// A single message ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Notice queues backed by a cache store.
#[derive(Clone)]
pub struct NoticeStore {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl NoticeStore {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Notice store kept in process memory.
    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryStore::default()), ttl)
    }

    /// Appends `message` to the queue of `level` unless it is already queued.
    pub async fn add(&self, level: NoticeLevel, message: impl Into<String>) -> Result<(), CacheError> {
        self.add_with_ttl(level, message, self.ttl).await
    }

    pub async fn add_with_ttl(
        &self,
        level: NoticeLevel,
        message: impl Into<String>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let message = message.into();
        let key = level.key();
        let mut queue = self.read_queue(&key).await?;
        if !queue.contains(&message) {
            queue.push(message);
        }
        self.store.put(&key, serde_json::to_vec(&queue)?, ttl).await
    }

    pub async fn error(&self, message: impl Into<String>) -> Result<(), CacheError> {
        self.add(NoticeLevel::Error, message).await
    }

    pub async fn success(&self, message: impl Into<String>) -> Result<(), CacheError> {
        self.add(NoticeLevel::Success, message).await
    }

    pub async fn warning(&self, message: impl Into<String>) -> Result<(), CacheError> {
        self.add(NoticeLevel::Warning, message).await
    }

    pub async fn info(&self, message: impl Into<String>) -> Result<(), CacheError> {
        self.add(NoticeLevel::Info, message).await
    }

    /// Returns every pending notice once and clears the queues.
    ///
    /// Queues are cleared only after all levels were read. A failed clear is
    /// logged and the notices are still returned.
    pub async fn take_all(&self) -> Result<Vec<Notice>, CacheError> {
        let mut pending = Vec::new();
        for level in NoticeLevel::ALL {
            let key = level.key();
            let queue = self.read_queue(&key).await?;
            if !queue.is_empty() {
                pending.push((level, key, queue));
            }
        }

        let mut notices = Vec::new();
        for (level, key, queue) in pending {
            if let Err(err) = self.store.forget(&key).await {
                warn!(key, error = %err, "Failed to clear notice queue");
            }
            notices.extend(queue.into_iter().map(|message| Notice { level, message }));
        }
        Ok(notices)
    }

    async fn read_queue(&self, key: &str) -> Result<Vec<String>, CacheError> {
        let Some(bytes) = self.store.get(key).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_slice(&bytes) {
            Ok(queue) => Ok(queue),
            Err(err) => {
                warn!(key, error = %err, "Dropping unreadable notice queue");
                Ok(Vec::new())
            }
        }
    }
}
