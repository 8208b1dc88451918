//! Best-effort package cache around a [`CacheStore`]
//!
//! Caching is an optimisation only: no outcome of `restore` or `save`
//! fails the build. Misses and store errors become warnings.

use crate::cache::key::CacheKey;
use crate::cache::store::CacheStore;
use crate::platform::PlatformIo;
use std::path::Path;
use tracing::{info, warn};

/// Restores the package cache before a build and saves it after
pub struct PackageCache {
    store: Box<dyn CacheStore>,
}

impl PackageCache {
    pub fn new(store: Box<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Restore `path` from the best matching entry.
    ///
    /// Returns the matched key; `None` on a miss or store failure.
    pub async fn restore(
        &self,
        path: &Path,
        key: &CacheKey,
        io: &dyn PlatformIo,
    ) -> Option<String> {
        io.start_group("Restoring Charmcraft package cache");
        let result = self
            .store
            .restore(&[path.to_path_buf()], &key.primary_key, &key.restore_keys)
            .await;

        let matched = match result {
            Ok(Some(matched)) => {
                info!("Restored {} from {} store", path.display(), self.store.store_name());
                io.info(&format!("Got hit on cacheKey: {}", matched));
                Some(matched)
            }
            Ok(None) => {
                io.info(&format!(
                    "Cache not found for input keys: {}",
                    key.lookup_order().join(", ")
                ));
                None
            }
            Err(e) => {
                warn!("Cache restore failed: {}", e);
                io.warning(&format!("Failed to restore cache: {}", e));
                None
            }
        };
        io.end_group();
        matched
    }

    /// Save `path` under `primary_key`.
    ///
    /// Returns the saved key; `None` when the key already exists or the
    /// store failed.
    pub async fn save(
        &self,
        path: &Path,
        primary_key: &str,
        io: &dyn PlatformIo,
    ) -> Option<String> {
        io.start_group("Saving Charmcraft package cache");
        let result = self.store.save(&[path.to_path_buf()], primary_key).await;

        let saved = match result {
            Ok(Some(saved)) => {
                io.info(&format!("Cache saved with key: {}", saved));
                Some(saved)
            }
            Ok(None) => {
                io.warning(&format!(
                    "Cache entry {} already exists, not saving",
                    primary_key
                ));
                None
            }
            Err(e) => {
                warn!("Cache save failed: {}", e);
                io.warning(&format!("Failed to save cache: {}", e));
                None
            }
        };
        io.end_group();
        saved
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::{PackError, PackResult};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Scripted store recording every call
    #[derive(Default)]
    pub struct FakeStore {
        pub restore_result: Option<String>,
        pub fail: bool,
        pub restores: Mutex<Vec<(Vec<PathBuf>, String, Vec<String>)>>,
        pub saves: Mutex<Vec<(Vec<PathBuf>, String)>>,
    }

    #[async_trait]
    impl CacheStore for FakeStore {
        async fn restore(
            &self,
            paths: &[PathBuf],
            primary_key: &str,
            restore_keys: &[String],
        ) -> PackResult<Option<String>> {
            self.restores.lock().unwrap().push((
                paths.to_vec(),
                primary_key.to_string(),
                restore_keys.to_vec(),
            ));
            if self.fail {
                return Err(PackError::CacheStore("unreachable".to_string()));
            }
            Ok(self.restore_result.clone())
        }

        async fn save(&self, paths: &[PathBuf], key: &str) -> PackResult<Option<String>> {
            self.saves
                .lock()
                .unwrap()
                .push((paths.to_vec(), key.to_string()));
            if self.fail {
                return Err(PackError::CacheStore("unreachable".to_string()));
            }
            Ok(Some(key.to_string()))
        }

        fn store_name(&self) -> &'static str {
            "fake"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeStore;
    use super::*;
    use crate::cache::key::RunIdentity;
    use crate::cache::store::LocalCacheStore;
    use crate::platform::testing::RecordingPlatform;
    use tempfile::TempDir;

    fn key() -> CacheKey {
        CacheKey::derive("craft-shared-cache", &RunIdentity::new(1, 2, "pack"))
    }

    #[tokio::test]
    async fn miss_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let cache = PackageCache::new(Box::new(LocalCacheStore::new(temp.path().join("store"))));
        let io = RecordingPlatform::default();

        let matched = cache.restore(&temp.path().join("cache"), &key(), &io).await;

        assert!(matched.is_none());
        assert!(io.warnings().is_empty());
        assert_eq!(
            io.infos(),
            vec!["Cache not found for input keys: craft-shared-cache-1-2-pack, craft-shared-cache"]
        );
    }

    #[tokio::test]
    async fn hit_reports_matched_key() {
        let store = FakeStore {
            restore_result: Some("craft-shared-cache-0-1-pack".to_string()),
            ..Default::default()
        };
        let cache = PackageCache::new(Box::new(store));
        let io = RecordingPlatform::default();

        let matched = cache.restore(Path::new("/tmp/c"), &key(), &io).await;

        assert_eq!(matched.as_deref(), Some("craft-shared-cache-0-1-pack"));
        assert_eq!(io.groups(), vec!["Restoring Charmcraft package cache"]);
        assert!(io.infos()[0].contains("craft-shared-cache-0-1-pack"));
    }

    #[tokio::test]
    async fn store_failure_becomes_warning() {
        let store = FakeStore {
            fail: true,
            ..Default::default()
        };
        let cache = PackageCache::new(Box::new(store));
        let io = RecordingPlatform::default();

        assert!(cache.restore(Path::new("/tmp/c"), &key(), &io).await.is_none());
        assert!(cache.save(Path::new("/tmp/c"), "k", &io).await.is_none());
        assert_eq!(io.warnings().len(), 2);
    }

    #[tokio::test]
    async fn resave_same_key_is_warning_only() {
        let temp = TempDir::new().unwrap();
        let cache_dir = temp.path().join("cache");
        std::fs::create_dir_all(&cache_dir).unwrap();
        let cache = PackageCache::new(Box::new(LocalCacheStore::new(temp.path().join("store"))));
        let io = RecordingPlatform::default();

        let first = cache.save(&cache_dir, "craft-shared-cache-1-2-pack", &io).await;
        let second = cache.save(&cache_dir, "craft-shared-cache-1-2-pack", &io).await;

        assert_eq!(first.as_deref(), Some("craft-shared-cache-1-2-pack"));
        assert!(second.is_none());
        assert_eq!(io.warnings().len(), 1);
    }
}
