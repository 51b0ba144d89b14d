//! Cache stores for highlighted blocks.
//!
//! Highlighting is cached by content: the key is derived from the block's
//! hash, so identical code in different places only ever costs one request.
//! Stores are best effort. A store that cannot read or write behaves like
//! a miss and logs why.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use atomicwrites::{AtomicFile, OverwriteBehavior};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::block::Block;
use crate::config::Config;
use crate::error::{Error, Result};

/// Prefix shared by every key this crate writes.
pub const CACHE_PREFIX: &str = "torchlight::";

/// How long highlighted blocks stay cached.
pub const BLOCK_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// The cache key for a block: `torchlight::block-<hash>`.
pub fn block_key(block: &Block) -> String {
    format!("{CACHE_PREFIX}block-{}", block.hash())
}

/// A key/value store with per-entry expiry.
pub trait CacheStore: Send + Sync {
    /// Fetch a live entry.
    fn get(&self, key: &str) -> Option<Value>;

    /// Store `value` under `key` for `ttl`.
    fn put(&self, key: &str, value: Value, ttl: Duration);
}

/// Pick a store by its configured name.
pub fn store_from_config(config: &Config) -> Result<Arc<dyn CacheStore>> {
    match config.cache_store_name.as_str() {
        "" | "memory" | "array" => Ok(Arc::new(MemoryCache::new())),
        "file" => Ok(Arc::new(FileCache::new(&config.cache_dir))),
        "none" | "null" => Ok(Arc::new(NullCache)),
        other => Err(Error::configuration(format!(
            "Unknown cache store '{other}'. Expected one of: memory, file, none."
        ))),
    }
}

/// In-process store. Entries vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Value, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = matches!(entries.get(key), Some((_, at)) if *at <= Instant::now());
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|(value, _)| value.clone())
    }

    fn put(&self, key: &str, value: Value, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), (value, expires_at));
    }
}

/// Directory-backed store: one JSON file per key.
///
/// File names are the blake3 hash of the key, so any key is safe to use.
/// Writes are atomic (write to temp, then rename).
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct FileEntry {
    /// Seconds since the Unix epoch.
    expires_at: u64,
    value: Value,
}

impl FileCache {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name = blake3::hash(key.as_bytes()).to_hex();
        self.dir.join(format!("{name}.json"))
    }

    fn read(&self, path: &Path) -> std::io::Result<Option<FileEntry>> {
        let bytes = match fs_err::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(std::io::Error::other)
    }

    fn write(&self, path: &Path, entry: &FileEntry) -> std::io::Result<()> {
        fs_err::create_dir_all(&self.dir)?;
        let bytes = serde_json::to_vec(entry).map_err(std::io::Error::other)?;
        AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
            .write(|file| file.write_all(&bytes))
            .map_err(std::io::Error::other)
    }
}

impl CacheStore for FileCache {
    fn get(&self, key: &str) -> Option<Value> {
        let path = self.path_for(key);
        match self.read(&path) {
            Ok(Some(entry)) if entry.expires_at > unix_now() => Some(entry.value),
            Ok(Some(_)) => {
                // Expired; drop it so the directory does not grow forever.
                if let Err(e) = fs_err::remove_file(&path) {
                    tracing::debug!(key, error = %e, "could not remove expired cache entry");
                }
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, path = %path.display(), error = %e, "unreadable cache entry");
                None
            }
        }
    }

    fn put(&self, key: &str, value: Value, ttl: Duration) {
        let path = self.path_for(key);
        let entry = FileEntry {
            expires_at: unix_now().saturating_add(ttl.as_secs()),
            value,
        };
        if let Err(e) = self.write(&path, &entry) {
            tracing::warn!(key, path = %path.display(), error = %e, "failed to write cache entry");
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// A store that remembers nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

impl CacheStore for NullCache {
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn put(&self, _key: &str, _value: Value, _ttl: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn block_keys_are_prefixed_hashes() {
        let block = Block::new("x").language("rust").code("fn main() {}");
        let key = block_key(&block);
        assert_eq!(key, format!("torchlight::block-{}", block.hash()));
        assert_eq!(key, block_key(&Block { id: "y".into(), ..block }));
    }

    #[test]
    fn memory_round_trip() {
        let cache = MemoryCache::new();
        assert!(cache.get("k").is_none());

        cache.put("k", json!({"wrapped": "<pre></pre>"}), BLOCK_TTL);
        assert_eq!(cache.get("k"), Some(json!({"wrapped": "<pre></pre>"})));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn memory_entries_expire() {
        let cache = MemoryCache::new();
        cache.put("k", json!("v"), Duration::ZERO);
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn file_cache_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();

        FileCache::new(dir.path()).put(
            "torchlight::block-abc",
            json!({"highlighted": "x"}),
            BLOCK_TTL,
        );

        let reopened = FileCache::new(dir.path());
        assert_eq!(
            reopened.get("torchlight::block-abc"),
            Some(json!({"highlighted": "x"}))
        );
        assert!(reopened.get("torchlight::block-other").is_none());
    }

    #[test]
    fn file_cache_drops_expired_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());

        cache.put("k", json!(1), Duration::ZERO);
        assert!(cache.get("k").is_none());
        assert!(!cache.path_for("k").exists());
    }

    #[test]
    fn file_cache_treats_garbage_as_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        std::fs::write(cache.path_for("k"), b"not json").unwrap();
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn null_cache_forgets() {
        NullCache.put("k", json!(1), BLOCK_TTL);
        assert!(NullCache.get("k").is_none());
    }

    #[test]
    fn stores_are_chosen_by_name() {
        let mut config = Config::default();
        assert!(store_from_config(&config).is_ok());

        config.cache_store_name = "file".into();
        assert!(store_from_config(&config).is_ok());

        config.cache_store_name = "redis".into();
        let err = store_from_config(&config).err().unwrap();
        assert!(err.to_string().contains("redis"));
    }
}
