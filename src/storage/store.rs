//! Store Core
//!
//! Concurrent key-value map guarded by a single reader/writer lock. Reads
//! (`get`, `len`) take the shared lock and re-check expiry; writes (`set`,
//! `delete`) take the exclusive lock and, when persistence is enabled, call
//! through to the mirror before returning.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;
use tracing::error;

use crate::config::StoreConfig;
use crate::error::Result;
use crate::persistence::{MirrorDir, MirrorRecord};
use crate::storage::entry::{now_ms, remaining_ttl_ms, Entry};
use crate::storage::sweeper;

pub(crate) struct StoreInner<V> {
    pub(crate) data: RwLock<HashMap<String, Entry<V>>>,
    pub(crate) mirror: Option<MirrorDir>,
    shutdown_tx: watch::Sender<bool>,
}

impl<V> Drop for StoreInner<V> {
    fn drop(&mut self) {
        // Wake the sweeper so it exits promptly instead of on its next tick
        let _ = self.shutdown_tx.send(true);
    }
}

/// In-process key-value store with per-entry TTL and optional write-through
/// persistence.
///
/// Cloning is cheap and every clone operates on the same underlying map.
/// The background sweeper is scoped to the store's lifetime: it stops once
/// the last handle is dropped.
pub struct Store<V> {
    inner: Arc<StoreInner<V>>,
}

impl<V> Clone for Store<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Store<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Open a store and start its sweeper.
    ///
    /// When a storage directory is configured it is created if absent and
    /// every mirror file in it is replayed into the map, each entry keeping
    /// whatever remains of its original TTL. Must be called from within a
    /// tokio runtime, which the sweeper task is spawned on.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let mirror = match &config.storage_dir {
            Some(dir) => Some(MirrorDir::open(dir)?),
            None => None,
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let store = Self {
            inner: Arc::new(StoreInner {
                data: RwLock::new(HashMap::new()),
                mirror,
                shutdown_tx,
            }),
        };

        store.replay()?;
        sweeper::spawn(
            Arc::downgrade(&store.inner),
            config.clean_interval,
            shutdown_rx,
        );
        Ok(store)
    }

    /// Repopulate the map from the mirror directory
    fn replay(&self) -> Result<()> {
        let records = match &self.inner.mirror {
            Some(mirror) => mirror.load_all::<V>()?,
            None => return Ok(()),
        };
        let now = now_ms();
        for record in records {
            let ttl_ms = remaining_ttl_ms(record.expires_at_ms, now);
            self.set(record.key, record.value, ttl_ms)?;
        }
        Ok(())
    }

    /// Insert or replace the entry for `key` with a TTL in milliseconds.
    /// A TTL of zero means the entry never expires.
    ///
    /// The in-memory map is updated unconditionally; when persistence is
    /// enabled the mirror file is then written before this call returns. On
    /// a write failure the entry is still live in memory and the error is
    /// returned, leaving memory and disk inconsistent until corrected.
    /// Callers that require durability must check the result.
    pub fn set(&self, key: impl Into<String>, value: V, ttl_ms: u64) -> Result<()> {
        let key = key.into();
        let entry = Entry::new(value, ttl_ms);

        let mut data = self.inner.data.write();
        if let Some(mirror) = &self.inner.mirror {
            let record = MirrorRecord {
                key: key.clone(),
                value: entry.value.clone(),
                expires_at_ms: entry.expires_at_ms,
            };
            data.insert(key, entry);
            mirror.write(&record)?;
        } else {
            data.insert(key, entry);
        }
        Ok(())
    }

    /// Get the value for `key`, or `None` if it is absent or expired.
    ///
    /// An expired-but-not-yet-swept entry is left in place; eviction is the
    /// sweeper's job, which keeps this path free of allocation and I/O.
    pub fn get(&self, key: &str) -> Option<V> {
        let data = self.inner.data.read();
        let now = now_ms();
        data.get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value.clone())
    }

    /// Remove `key` from the map and its mirror file. Removing an absent key
    /// (or a mirror file something else already deleted) is a no-op, not an
    /// error.
    pub fn delete(&self, key: &str) -> Result<()> {
        let mut data = self.inner.data.write();
        data.remove(key);
        if let Some(mirror) = &self.inner.mirror {
            mirror.remove(key)?;
        }
        Ok(())
    }

    /// Number of live entries. Scans the whole map so the count excludes
    /// entries that have expired but not yet been swept.
    pub fn len(&self) -> usize {
        let data = self.inner.data.read();
        let now = now_ms();
        data.values().filter(|e| !e.is_expired_at(now)).count()
    }

    /// True if no live entries remain
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict every expired entry and its mirror file, returning the count of
    /// removed keys. This is the sweeper's loop body; calling it directly is
    /// also fine.
    pub fn sweep(&self) -> usize {
        sweep(&self.inner)
    }
}

/// One sweep pass over the map. A mirror removal failure is reported through
/// the log and does not stop the rest of the pass: the sweeper has no caller
/// to return an error to, and silently dying would disable all future
/// expiration.
pub(crate) fn sweep<V>(inner: &StoreInner<V>) -> usize {
    let mut data = inner.data.write();
    let now = now_ms();
    let expired: Vec<String> = data
        .iter()
        .filter(|(_, entry)| entry.is_expired_at(now))
        .map(|(key, _)| key.clone())
        .collect();

    for key in &expired {
        data.remove(key);
        if let Some(mirror) = &inner.mirror {
            if let Err(e) = mirror.remove(key) {
                error!(key = %key, error = %e, "failed to remove mirror file during sweep");
            }
        }
    }
    expired.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::time::sleep;

    fn in_memory() -> Store<String> {
        // Long interval: these tests exercise lazy expiry, not the sweeper
        Store::open(StoreConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = in_memory();

        store.set("key1", "value1".to_string(), 0).unwrap();
        assert_eq!(store.get("key1"), Some("value1".to_string()));

        store.delete("key1").unwrap();
        assert_eq!(store.get("key1"), None);
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let store = in_memory();
        assert_eq!(store.get("nope"), None);
    }

    #[tokio::test]
    async fn test_set_replaces_value_and_ttl() {
        let store = in_memory();

        store.set("key1", "old".to_string(), 10).unwrap();
        store.set("key1", "new".to_string(), 0).unwrap();
        sleep(Duration::from_millis(30)).await;

        // Replacement is wholesale: the new entry never expires
        assert_eq!(store.get("key1"), Some("new".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_lazy_expiry_on_get() {
        let store = in_memory();

        store.set("short", "v".to_string(), 50).unwrap();
        assert_eq!(store.get("short"), Some("v".to_string()));

        sleep(Duration::from_millis(80)).await;
        // Expired well before any sweep: the read path hides it
        assert_eq!(store.get("short"), None);
    }

    #[tokio::test]
    async fn test_len_excludes_expired() {
        let store = in_memory();

        store.set("a", "1".to_string(), 50).unwrap();
        store.set("b", "2".to_string(), 0).unwrap();
        assert_eq!(store.len(), 2);

        sleep(Duration::from_millis(80)).await;
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_absent_key_is_noop() {
        let store = in_memory();
        store.delete("never-set").unwrap();
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_sweep_evicts_expired_only() {
        let store = in_memory();

        store.set("a", "1".to_string(), 30).unwrap();
        store.set("b", "2".to_string(), 10_000).unwrap();
        sleep(Duration::from_millis(60)).await;

        assert_eq!(store.sweep(), 1);
        assert_eq!(store.get("b"), Some("2".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sweeper_runs_in_background() {
        let store: Store<String> = Store::open(
            StoreConfig::default().with_clean_interval(Duration::from_millis(50)),
        )
        .unwrap();

        store.set("a", "1".to_string(), 30).unwrap();
        store.set("b", "2".to_string(), 5_000).unwrap();
        assert_eq!(store.len(), 2);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(store.get("a"), None);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_restart_recovers_entries() {
        let dir = tempdir().unwrap();
        let config = StoreConfig::default().with_storage_dir(dir.path());

        {
            let store: Store<String> = Store::open(config.clone()).unwrap();
            store.set("keep", "value".to_string(), 60_000).unwrap();
            store.set("forever", "pinned".to_string(), 0).unwrap();
        }

        let store: Store<String> = Store::open(config).unwrap();
        assert_eq!(store.get("keep"), Some("value".to_string()));
        assert_eq!(store.get("forever"), Some("pinned".to_string()));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_restart_does_not_resurrect_expired_entries() {
        let dir = tempdir().unwrap();
        let config = StoreConfig::default().with_storage_dir(dir.path());

        {
            let store: Store<String> = Store::open(config.clone()).unwrap();
            store.set("short", "v".to_string(), 30).unwrap();
        }
        sleep(Duration::from_millis(60)).await;

        // Replay reinserts with a minimal TTL, never as non-expiring
        let store: Store<String> = Store::open(config).unwrap();
        sleep(Duration::from_millis(5)).await;
        assert_eq!(store.get("short"), None);
        assert_eq!(store.len(), 0);
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct CacheData {
        id: u32,
        name: String,
        list: Vec<i32>,
    }

    #[tokio::test]
    async fn test_structured_value_round_trip() {
        let dir = tempdir().unwrap();
        let config = StoreConfig::default().with_storage_dir(dir.path());
        let value = CacheData {
            id: 1,
            name: "value1".to_string(),
            list: vec![1, 2, 3],
        };

        {
            let store: Store<CacheData> = Store::open(config.clone()).unwrap();
            store.set("key1", value.clone(), 0).unwrap();
        }

        let store: Store<CacheData> = Store::open(config).unwrap();
        assert_eq!(store.get("key1"), Some(value));
    }

    fn mirror_files(dir: &std::path::Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".store.json"))
            .count()
    }

    #[tokio::test]
    async fn test_delete_removes_mirror_file() {
        let dir = tempdir().unwrap();
        let store: Store<String> =
            Store::open(StoreConfig::default().with_storage_dir(dir.path())).unwrap();

        store.set("key1", "value1".to_string(), 0).unwrap();
        assert_eq!(mirror_files(dir.path()), 1);

        store.delete("key1").unwrap();
        assert_eq!(mirror_files(dir.path()), 0);

        // Mirror file already gone externally: still a no-op
        store.delete("key1").unwrap();
    }

    #[tokio::test]
    async fn test_sweep_removes_mirror_files() {
        let dir = tempdir().unwrap();
        let store: Store<String> = Store::open(
            StoreConfig::default()
                .with_clean_interval(Duration::from_millis(50))
                .with_storage_dir(dir.path()),
        )
        .unwrap();

        store.set("short", "v".to_string(), 30).unwrap();
        store.set("long", "v".to_string(), 60_000).unwrap();
        assert_eq!(mirror_files(dir.path()), 2);

        sleep(Duration::from_millis(200)).await;
        // Eviction is durable: the expired entry's file is gone too
        assert_eq!(mirror_files(dir.path()), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_persistence_write_failure_keeps_memory_entry() {
        use sha2::{Digest, Sha256};

        let dir = tempdir().unwrap();
        let store: Store<String> =
            Store::open(StoreConfig::default().with_storage_dir(dir.path())).unwrap();

        // Occupy the key's mirror path with a directory so the write must fail
        let name = format!("{}.store.json", hex::encode(Sha256::digest(b"key1")));
        fs::create_dir(dir.path().join(name)).unwrap();

        let result = store.set("key1", "value1".to_string(), 0);
        assert!(matches!(
            result,
            Err(crate::StoreError::PersistenceWrite { .. })
        ));
        // Memory was mutated before the mirror write failed
        assert_eq!(store.get("key1"), Some("value1".to_string()));
    }
}
