//! On-disk cache provider
//!
//! One JSON document per key inside a dedicated directory. Entries survive
//! process restarts; expiry is checked on read using wall-clock time.

use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::options::ProviderOptions;
use crate::cache::traits::{CacheService, Ttl};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

const FILE_EXTENSION: &str = "json";

#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl FileEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Persistent cache service writing to a local directory
#[derive(Debug, Clone)]
pub struct FileCacheService {
    directory: PathBuf,
}

impl FileCacheService {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Build from provider settings (`directory`), defaulting to a
    /// `sqlcache` folder under the system temp dir
    pub fn from_options(options: &ProviderOptions) -> CacheResult<Self> {
        let directory = options
            .get_str("directory")
            .map_err(|reason| CacheError::setup("file", reason))?
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("sqlcache"));
        Ok(Self::new(directory))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // fingerprints are plain hex; anything else is encoded so it cannot escape the directory
        let stem = if !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric()) {
            key.to_string()
        } else {
            format!("x{}", hex::encode(key))
        };
        self.directory.join(format!("{stem}.{FILE_EXTENSION}"))
    }

    async fn discard(&self, path: &Path) -> CacheResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl CacheService for FileCacheService {
    async fn setup(&self) -> CacheResult<()> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| {
                CacheError::setup(
                    "file",
                    format!("cannot create {}: {e}", self.directory.display()),
                )
            })?;
        debug!(directory = %self.directory.display(), "File cache ready");
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: FileEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Discarding unreadable cache file");
                self.discard(&path).await?;
                return Ok(None);
            }
        };

        if entry.is_expired(Utc::now()) {
            self.discard(&path).await?;
            return Ok(None);
        }
        Ok(Some(entry.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Ttl) -> CacheResult<()> {
        let expires_at = ttl
            .as_duration()
            .and_then(|d| ChronoDuration::from_std(d).ok())
            .map(|d| Utc::now() + d);
        let entry = FileEntry {
            value: value.to_string(),
            expires_at,
        };
        let body = serde_json::to_vec(&entry)
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;

        // write-then-rename so readers never observe a half-written document
        let path = self.path_for(key);
        let staging = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&staging, body).await?;
        tokio::fs::rename(&staging, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        self.discard(&self.path_for(key)).await
    }

    async fn flush(&self) -> CacheResult<()> {
        let mut dir = match tokio::fs::read_dir(&self.directory).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().is_some_and(|ext| ext == FILE_EXTENSION) {
                self.discard(&path).await?;
            }
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn service() -> (TempDir, FileCacheService) {
        let dir = TempDir::new().unwrap();
        let svc = FileCacheService::new(dir.path().join("store"));
        svc.setup().await.unwrap();
        (dir, svc)
    }

    #[tokio::test]
    async fn test_file_round_trip_and_remove() {
        let (_dir, svc) = service().await;
        svc.set("abc123", r#"[{"n":1}]"#, Ttl::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            svc.get("abc123").await.unwrap(),
            Some(r#"[{"n":1}]"#.to_string())
        );

        svc.remove("abc123").await.unwrap();
        assert_eq!(svc.get("abc123").await.unwrap(), None);
        svc.remove("abc123").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_entries_survive_new_instance() {
        let (_dir, svc) = service().await;
        svc.set("persisted", "v", Ttl::NEVER).await.unwrap();

        let reopened = FileCacheService::new(svc.directory());
        reopened.setup().await.unwrap();
        assert_eq!(reopened.get("persisted").await.unwrap(), Some("v".into()));
    }

    #[tokio::test]
    async fn test_file_flush_clears_directory() {
        let (_dir, svc) = service().await;
        svc.set("a", "1", Ttl::NEVER).await.unwrap();
        svc.set("b", "2", Ttl::NEVER).await.unwrap();
        svc.flush().await.unwrap();

        assert_eq!(svc.get("a").await.unwrap(), None);
        assert_eq!(svc.get("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_unsafe_key_stays_inside_directory() {
        let (_dir, svc) = service().await;
        let path = svc.path_for("../escape");
        assert_eq!(path.parent(), Some(svc.directory()));

        svc.set("../escape", "v", Ttl::NEVER).await.unwrap();
        assert_eq!(svc.get("../escape").await.unwrap(), Some("v".into()));
    }

    #[tokio::test]
    async fn test_file_expired_entry_is_removed() {
        let (_dir, svc) = service().await;
        let stale = FileEntry {
            value: "old".into(),
            expires_at: Some(Utc::now() - ChronoDuration::seconds(5)),
        };
        tokio::fs::write(svc.path_for("stale"), serde_json::to_vec(&stale).unwrap())
            .await
            .unwrap();

        assert_eq!(svc.get("stale").await.unwrap(), None);
        assert!(!svc.path_for("stale").exists());
    }
}
