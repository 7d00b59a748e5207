//! File-backed cache store.
//!
//! Each key lives in its own file below the cache directory. The path is the
//! SHA-256 hex digest of the key, nested two levels deep by its first four
//! characters. A file starts with the expiry as 20 zero-padded digits of unix
//! milliseconds, followed by the raw payload.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::warn;

use super::{CacheError, CacheStore, expiry_after, is_expired};

const EXPIRY_WIDTH: usize = 20;

/// Cache store keeping one file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let hash = hex::encode(Sha256::digest(key.as_bytes()));
        self.directory
            .join(&hash[0..2])
            .join(&hash[2..4])
            .join(&hash)
    }

    async fn remove_quietly(path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to remove cache file")
            }
        }
    }
}

fn parse_expiry(bytes: &[u8]) -> Option<u64> {
    let prefix = bytes.get(..EXPIRY_WIDTH)?;
    std::str::from_utf8(prefix).ok()?.parse().ok()
}

#[async_trait]
impl CacheStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match parse_expiry(&bytes) {
            Some(expires_at) if !is_expired(expires_at) => {
                Ok(Some(bytes[EXPIRY_WIDTH..].to_vec()))
            }
            Some(_) => {
                Self::remove_quietly(&path).await;
                Ok(None)
            }
            None => {
                warn!(key, "Discarding cache file without a valid expiry header");
                Self::remove_quietly(&path).await;
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut contents = format!("{:0width$}", expiry_after(ttl), width = EXPIRY_WIDTH)
            .into_bytes();
        contents.extend_from_slice(&value);
        fs::write(&path, contents).await?;
        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<bool, CacheError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn flush(&self) -> Result<(), CacheError> {
        match fs::remove_dir_all(&self.directory).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        fs::create_dir_all(&self.directory).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn put_get_and_forget_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        store
            .put("providers", b"[1,2]".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            store.get("providers").await.unwrap(),
            Some(b"[1,2]".to_vec())
        );

        assert!(store.forget("providers").await.unwrap());
        assert!(!store.forget("providers").await.unwrap());
        assert!(store.get("providers").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn files_are_laid_out_by_key_digest() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store
            .put("providers", b"x".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        let hash = hex::encode(Sha256::digest(b"providers"));
        let path = dir.path().join(&hash[0..2]).join(&hash[2..4]).join(&hash);
        let contents = std::fs::read(path).unwrap();
        assert_eq!(contents.len(), EXPIRY_WIDTH + 1);
        assert_eq!(contents.last(), Some(&b'x'));
    }

    #[tokio::test]
    async fn expired_entries_are_removed_on_read() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store
            .put("k", b"v".to_vec(), Duration::from_millis(20))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(store.get("k").await.unwrap().is_none());
        assert!(!store.path_for("k").exists());
    }

    #[tokio::test]
    async fn corrupt_files_are_discarded() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let path = store.path_for("k");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"garbage").unwrap();

        assert!(store.get("k").await.unwrap().is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn flush_removes_all_entries_and_keeps_directory() {
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join("cache");
        let store = FileStore::new(&cache_dir);
        store
            .put("a", b"1".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        store
            .put("b", b"2".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        store.flush().await.unwrap();

        assert!(cache_dir.is_dir());
        assert!(store.get("a").await.unwrap().is_none());
        assert!(store.get("b").await.unwrap().is_none());
    }
}
