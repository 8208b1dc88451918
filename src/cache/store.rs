//! Cache store abstraction and a directory-backed implementation
//!
//! Keys are opaque strings. Lookup tries the primary key exactly, then each
//! restore key as a prefix, taking the newest entry that matches.

use crate::error::{PackError, PackResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Remote or local storage for keyed directory snapshots
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Materialise the best matching entry at `paths`.
    ///
    /// Returns the matched key, or `None` on a miss.
    async fn restore(
        &self,
        paths: &[PathBuf],
        primary_key: &str,
        restore_keys: &[String],
    ) -> PackResult<Option<String>>;

    /// Snapshot `paths` under `key`.
    ///
    /// Returns `None` when an entry under `key` already exists.
    async fn save(&self, paths: &[PathBuf], key: &str) -> PackResult<Option<String>>;

    /// Human-readable store name for display
    fn store_name(&self) -> &'static str;
}

/// Metadata written next to each saved entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Key the entry was saved under
    pub key: String,
    /// When the entry was saved
    pub created_at: DateTime<Utc>,
    /// Paths that were saved, in `data/<index>` order
    pub paths: Vec<PathBuf>,
}

const METADATA_FILE: &str = "entry.json";
const DATA_DIR: &str = "data";
const STAGING_PREFIX: &str = ".staging-";

/// Staging directories older than this are left over from interrupted saves
const DEFAULT_STAGING_TTL: Duration = Duration::from_secs(60 * 60);

/// How many entries to keep for a restore prefix after each save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retention {
    pub prefix: String,
    pub keep: usize,
}

/// Cache store keeping entries as directory trees under a root directory
///
/// Layout: `<root>/<key hash>/entry.json` and `<root>/<key hash>/data/<n>/`.
#[derive(Debug, Clone)]
pub struct LocalCacheStore {
    root: PathBuf,
    retention: Option<Retention>,
    staging_ttl: Duration,
}

impl LocalCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            retention: None,
            staging_ttl: DEFAULT_STAGING_TTL,
        }
    }

    /// Prune entries under `prefix` down to the newest `keep` after each save.
    ///
    /// A `keep` of 0 disables pruning.
    pub fn with_retention(mut self, prefix: impl Into<String>, keep: usize) -> Self {
        self.retention = (keep > 0).then(|| Retention {
            prefix: prefix.into(),
            keep,
        });
        self
    }

    /// Age after which an unfinished staging directory is removed
    pub fn with_staging_ttl(mut self, ttl: Duration) -> Self {
        self.staging_ttl = ttl;
        self
    }

    fn entry_dir(&self, key: &str) -> PathBuf {
        self.root.join(key_digest(key))
    }

    /// All readable entries in the store
    fn entries(&self) -> PackResult<Vec<(PathBuf, EntryMetadata)>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let read = fs::read_dir(&self.root).map_err(|e| {
            PackError::io(format!("reading cache store {}", self.root.display()), e)
        })?;

        let mut entries = Vec::new();
        for entry in read {
            let entry = entry.map_err(|e| PackError::io("reading cache store entry", e))?;
            if is_staging(&entry.path()) {
                continue;
            }
            let metadata_path = entry.path().join(METADATA_FILE);
            let Ok(content) = fs::read_to_string(&metadata_path) else {
                continue;
            };
            match serde_json::from_str::<EntryMetadata>(&content) {
                Ok(metadata) => entries.push((entry.path(), metadata)),
                Err(e) => debug!("Skipping unreadable entry {}: {}", metadata_path.display(), e),
            }
        }
        Ok(entries)
    }

    /// Find the entry to restore: exact match, then newest prefix match
    fn lookup(
        &self,
        primary_key: &str,
        restore_keys: &[String],
    ) -> PackResult<Option<(PathBuf, EntryMetadata)>> {
        let entries = self.entries()?;

        if let Some(exact) = entries.iter().find(|(_, m)| m.key == primary_key) {
            return Ok(Some(exact.clone()));
        }

        for prefix in restore_keys {
            let newest = entries
                .iter()
                .filter(|(_, m)| m.key.starts_with(prefix.as_str()))
                .max_by_key(|(_, m)| m.created_at);
            if let Some(found) = newest {
                return Ok(Some(found.clone()));
            }
        }
        Ok(None)
    }

    fn restore_blocking(
        &self,
        paths: &[PathBuf],
        primary_key: &str,
        restore_keys: &[String],
    ) -> PackResult<Option<String>> {
        let Some((dir, metadata)) = self.lookup(primary_key, restore_keys)? else {
            return Ok(None);
        };

        for (index, target) in paths.iter().enumerate() {
            let source = dir.join(DATA_DIR).join(index.to_string());
            if !source.exists() {
                debug!("Entry {} has no data for {}", metadata.key, target.display());
                continue;
            }
            copy_tree(&source, target)?;
        }
        Ok(Some(metadata.key))
    }

    fn save_blocking(&self, paths: &[PathBuf], key: &str) -> PackResult<Option<String>> {
        let entry_dir = self.entry_dir(key);
        if entry_dir.exists() {
            debug!("Cache entry {} already exists", key);
            return Ok(None);
        }

        for path in paths {
            if !path.exists() {
                return Err(PackError::CacheStore(format!(
                    "path to cache does not exist: {}",
                    path.display()
                )));
            }
        }

        let staging = self.root.join(format!("{}{}", STAGING_PREFIX, Uuid::new_v4()));
        let result = self.write_entry(&staging, paths, key);
        if let Err(e) = result {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        if fs::rename(&staging, &entry_dir).is_err() {
            // Another save under the same key finished first
            let _ = fs::remove_dir_all(&staging);
            return Ok(None);
        }

        if let Err(e) = self.prune() {
            warn!("Failed to prune cache store {}: {}", self.root.display(), e);
        }
        Ok(Some(key.to_string()))
    }

    /// Drop entries beyond the retention limit and stale staging directories.
    ///
    /// Returns the number of directories removed.
    fn prune(&self) -> PackResult<usize> {
        let mut removed = self.remove_stale_staging()?;

        let Some(retention) = &self.retention else {
            return Ok(removed);
        };

        let mut matching: Vec<_> = self
            .entries()?
            .into_iter()
            .filter(|(_, m)| m.key.starts_with(retention.prefix.as_str()))
            .collect();
        matching.sort_by(|(_, a), (_, b)| b.created_at.cmp(&a.created_at));

        for (dir, metadata) in matching.into_iter().skip(retention.keep) {
            debug!("Pruning cache entry {}", metadata.key);
            fs::remove_dir_all(&dir)
                .map_err(|e| PackError::io(format!("removing {}", dir.display()), e))?;
            removed += 1;
        }
        Ok(removed)
    }

    fn remove_stale_staging(&self) -> PackResult<usize> {
        let read = fs::read_dir(&self.root).map_err(|e| {
            PackError::io(format!("reading cache store {}", self.root.display()), e)
        })?;

        let mut removed = 0;
        for entry in read {
            let entry = entry.map_err(|e| PackError::io("reading cache store entry", e))?;
            let path = entry.path();
            if !is_staging(&path) {
                continue;
            }
            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| modified.elapsed().ok())
                .unwrap_or(Duration::ZERO);
            if age >= self.staging_ttl {
                debug!("Removing stale staging directory {}", path.display());
                fs::remove_dir_all(&path)
                    .map_err(|e| PackError::io(format!("removing {}", path.display()), e))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn write_entry(&self, staging: &Path, paths: &[PathBuf], key: &str) -> PackResult<()> {
        fs::create_dir_all(staging)
            .map_err(|e| PackError::io(format!("creating {}", staging.display()), e))?;
        for (index, path) in paths.iter().enumerate() {
            copy_tree(path, &staging.join(DATA_DIR).join(index.to_string()))?;
        }

        let metadata = EntryMetadata {
            key: key.to_string(),
            created_at: Utc::now(),
            paths: paths.to_vec(),
        };
        let metadata_path = staging.join(METADATA_FILE);
        fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?).map_err(|e| {
            PackError::io(format!("writing {}", metadata_path.display()), e)
        })
    }
}

#[async_trait]
impl CacheStore for LocalCacheStore {
    async fn restore(
        &self,
        paths: &[PathBuf],
        primary_key: &str,
        restore_keys: &[String],
    ) -> PackResult<Option<String>> {
        let store = self.clone();
        let paths = paths.to_vec();
        let primary_key = primary_key.to_string();
        let restore_keys = restore_keys.to_vec();

        tokio::task::spawn_blocking(move || {
            store.restore_blocking(&paths, &primary_key, &restore_keys)
        })
        .await
        .map_err(|e| PackError::Internal(format!("cache restore task failed: {}", e)))?
    }

    async fn save(&self, paths: &[PathBuf], key: &str) -> PackResult<Option<String>> {
        let store = self.clone();
        let paths = paths.to_vec();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || store.save_blocking(&paths, &key))
            .await
            .map_err(|e| PackError::Internal(format!("cache save task failed: {}", e)))?
    }

    fn store_name(&self) -> &'static str {
        "local"
    }
}

fn is_staging(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(STAGING_PREFIX))
}

/// Directory name for a key: first 16 hex chars of its SHA256
fn key_digest(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(&digest[..8])
}

/// Recursively copy `source` onto `target`, merging into existing dirs
pub(crate) fn copy_tree(source: &Path, target: &Path) -> PackResult<()> {
    let metadata = fs::symlink_metadata(source)
        .map_err(|e| PackError::io(format!("reading {}", source.display()), e))?;

    if metadata.file_type().is_symlink() {
        copy_symlink(source, target)
    } else if metadata.is_dir() {
        fs::create_dir_all(target)
            .map_err(|e| PackError::io(format!("creating {}", target.display()), e))?;
        let entries = fs::read_dir(source)
            .map_err(|e| PackError::io(format!("reading {}", source.display()), e))?;
        for entry in entries {
            let entry = entry.map_err(|e| PackError::io("reading directory entry", e))?;
            copy_tree(&entry.path(), &target.join(entry.file_name()))?;
        }
        Ok(())
    } else {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| PackError::io(format!("creating {}", parent.display()), e))?;
        }
        fs::copy(source, target).map_err(|e| {
            PackError::io(
                format!("copying {} to {}", source.display(), target.display()),
                e,
            )
        })?;
        Ok(())
    }
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> PackResult<()> {
    let link = fs::read_link(source)
        .map_err(|e| PackError::io(format!("reading link {}", source.display()), e))?;
    if fs::symlink_metadata(target).is_ok() {
        fs::remove_file(target)
            .map_err(|e| PackError::io(format!("replacing {}", target.display()), e))?;
    }
    std::os::unix::fs::symlink(&link, target)
        .map_err(|e| PackError::io(format!("creating link {}", target.display()), e))
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, target: &Path) -> PackResult<()> {
    fs::copy(source, target)
        .map(|_| ())
        .map_err(|e| PackError::io(format!("copying {}", source.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn populate(dir: &Path, file: &str, content: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(file), content).unwrap();
    }

    #[test]
    fn key_digest_is_stable() {
        assert_eq!(key_digest("a"), key_digest("a"));
        assert_ne!(key_digest("a"), key_digest("b"));
        assert_eq!(key_digest("a").len(), 16);
    }

    #[tokio::test]
    async fn save_then_restore_exact() {
        let temp = TempDir::new().unwrap();
        let store = LocalCacheStore::new(temp.path().join("store"));
        let cache_dir = temp.path().join("cache");
        populate(&cache_dir.join("pip"), "wheel.whl", "bytes");

        let saved = store.save(&[cache_dir.clone()], "prefix-1-1-job").await.unwrap();
        assert_eq!(saved.as_deref(), Some("prefix-1-1-job"));

        fs::remove_dir_all(&cache_dir).unwrap();
        let matched = store
            .restore(&[cache_dir.clone()], "prefix-1-1-job", &["prefix".to_string()])
            .await
            .unwrap();

        assert_eq!(matched.as_deref(), Some("prefix-1-1-job"));
        assert_eq!(
            fs::read_to_string(cache_dir.join("pip").join("wheel.whl")).unwrap(),
            "bytes"
        );
    }

    #[tokio::test]
    async fn restore_falls_back_to_newest_prefix_match() {
        let temp = TempDir::new().unwrap();
        let store = LocalCacheStore::new(temp.path().join("store"));
        let cache_dir = temp.path().join("cache");

        populate(&cache_dir, "marker", "old");
        store.save(&[cache_dir.clone()], "prefix-1-1-job").await.unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        populate(&cache_dir, "marker", "new");
        store.save(&[cache_dir.clone()], "prefix-2-1-job").await.unwrap();
        fs::remove_dir_all(&cache_dir).unwrap();

        let matched = store
            .restore(&[cache_dir.clone()], "prefix-3-1-job", &["prefix".to_string()])
            .await
            .unwrap();

        assert_eq!(matched.as_deref(), Some("prefix-2-1-job"));
        assert_eq!(fs::read_to_string(cache_dir.join("marker")).unwrap(), "new");
    }

    #[tokio::test]
    async fn restore_miss_leaves_path_absent() {
        let temp = TempDir::new().unwrap();
        let store = LocalCacheStore::new(temp.path().join("store"));
        let cache_dir = temp.path().join("cache");

        let matched = store
            .restore(&[cache_dir.clone()], "prefix-1-1-job", &["prefix".to_string()])
            .await
            .unwrap();

        assert!(matched.is_none());
        assert!(!cache_dir.exists());
    }

    #[tokio::test]
    async fn restore_ignores_other_prefixes() {
        let temp = TempDir::new().unwrap();
        let store = LocalCacheStore::new(temp.path().join("store"));
        let cache_dir = temp.path().join("cache");
        populate(&cache_dir, "marker", "x");
        store.save(&[cache_dir.clone()], "other-1-1-job").await.unwrap();

        let matched = store
            .restore(&[cache_dir], "prefix-1-1-job", &["prefix".to_string()])
            .await
            .unwrap();
        assert!(matched.is_none());
    }

    #[tokio::test]
    async fn save_existing_key_is_noop() {
        let temp = TempDir::new().unwrap();
        let store = LocalCacheStore::new(temp.path().join("store"));
        let cache_dir = temp.path().join("cache");
        populate(&cache_dir, "marker", "first");

        store.save(&[cache_dir.clone()], "key").await.unwrap();
        populate(&cache_dir, "marker", "second");
        let second = store.save(&[cache_dir.clone()], "key").await.unwrap();
        assert!(second.is_none());

        fs::remove_dir_all(&cache_dir).unwrap();
        store.restore(&[cache_dir.clone()], "key", &[]).await.unwrap();
        assert_eq!(fs::read_to_string(cache_dir.join("marker")).unwrap(), "first");
    }

    fn entry_count(root: &Path) -> usize {
        fs::read_dir(root).unwrap().count()
    }

    #[tokio::test]
    async fn retention_bounds_entries_per_prefix() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("store");
        let store = LocalCacheStore::new(&root).with_retention("craft-shared-cache", 2);
        let cache_dir = temp.path().join("cache");

        for run in 0..20 {
            populate(&cache_dir, "marker", &run.to_string());
            let key = format!("craft-shared-cache-{}-1-pack", run);
            let saved = store.save(&[cache_dir.clone()], &key).await.unwrap();
            assert_eq!(saved.as_deref(), Some(key.as_str()));
        }
        assert_eq!(entry_count(&root), 2);

        fs::remove_dir_all(&cache_dir).unwrap();
        let matched = store
            .restore(
                &[cache_dir.clone()],
                "craft-shared-cache-20-1-pack",
                &["craft-shared-cache".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(matched.as_deref(), Some("craft-shared-cache-19-1-pack"));
        assert_eq!(fs::read_to_string(cache_dir.join("marker")).unwrap(), "19");
    }

    #[tokio::test]
    async fn retention_keeps_other_prefixes() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("store");
        let cache_dir = temp.path().join("cache");
        populate(&cache_dir, "marker", "x");

        LocalCacheStore::new(&root)
            .save(&[cache_dir.clone()], "other-1-1-pack")
            .await
            .unwrap();
        let store = LocalCacheStore::new(&root).with_retention("craft", 1);
        for run in 0..3 {
            let key = format!("craft-{}-1-pack", run);
            store.save(&[cache_dir.clone()], &key).await.unwrap();
        }

        let keys: Vec<String> = store
            .entries()
            .unwrap()
            .into_iter()
            .map(|(_, m)| m.key)
            .collect();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&"other-1-1-pack".to_string()));
        assert!(keys.contains(&"craft-2-1-pack".to_string()));
    }

    #[tokio::test]
    async fn save_removes_stale_staging() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("store");
        let leftover = root.join(format!("{}crashed", STAGING_PREFIX));
        populate(&leftover, "partial", "x");
        let cache_dir = temp.path().join("cache");
        populate(&cache_dir, "marker", "x");

        let store = LocalCacheStore::new(&root).with_staging_ttl(Duration::ZERO);
        store.save(&[cache_dir], "key").await.unwrap();

        assert!(!leftover.exists());
        assert_eq!(entry_count(&root), 1);
    }

    #[tokio::test]
    async fn fresh_staging_survives_prune() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("store");
        let in_progress = root.join(format!("{}running", STAGING_PREFIX));
        populate(&in_progress, "partial", "x");
        let cache_dir = temp.path().join("cache");
        populate(&cache_dir, "marker", "x");

        LocalCacheStore::new(&root).save(&[cache_dir], "key").await.unwrap();

        assert!(in_progress.exists());
    }

    #[tokio::test]
    async fn save_missing_path_fails() {
        let temp = TempDir::new().unwrap();
        let store = LocalCacheStore::new(temp.path().join("store"));

        let err = store
            .save(&[temp.path().join("missing")], "key")
            .await
            .unwrap_err();
        assert!(matches!(err, PackError::CacheStore(_)));
    }
}
