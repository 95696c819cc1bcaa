//! Transactional key/value store shared by all connections.
//!
//! The store keeps committed state in memory behind a single read/write lock.
//! At most one transaction is open at a time across the whole store. While a
//! transaction is open, `put` and `delete` are buffered and only become visible
//! on `commit`. Reads always see committed state, including reads made by the
//! caller that opened the transaction.
//!
//! # Example
//!
//! ```no_run
//! use hammer_gateway::store::TransactionalStore;
//!
//! let store = TransactionalStore::new("data/memdb.json");
//! store.load()?;
//!
//! store.begin_transaction()?;
//! store.put("greeting", "hello");
//! assert_eq!(store.get("greeting"), None);
//! store.commit()?;
//! assert_eq!(store.get("greeting").as_deref(), Some("hello"));
//!
//! store.persist()?;
//! # Ok::<(), hammer_gateway::error::StoreError>(())
//! ```

mod snapshot;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;

/// A stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreItem {
    #[serde(rename = "Value")]
    pub value: String,
}

/// Buffered write inside an open transaction.
#[derive(Debug, Clone)]
enum PendingWrite {
    Put(StoreItem),
    Tombstone,
}

#[derive(Debug, Default)]
struct Transaction {
    pending: HashMap<String, PendingWrite>,
}

#[derive(Debug, Default)]
struct StoreState {
    committed: HashMap<String, StoreItem>,
    transaction: Option<Transaction>,
}

impl StoreState {
    fn write(&mut self, key: &str, write: PendingWrite) {
        if let Some(tx) = self.transaction.as_mut() {
            tx.pending.insert(key.to_string(), write);
            return;
        }
        match write {
            PendingWrite::Put(item) => {
                self.committed.insert(key.to_string(), item);
            }
            PendingWrite::Tombstone => {
                self.committed.remove(key);
            }
        }
    }
}

/// In-memory string store with store-wide transactions and snapshot persistence.
#[derive(Debug)]
pub struct TransactionalStore {
    state: RwLock<StoreState>,
    /// Held from encode through rename so snapshots land in the order they were taken.
    persist_lock: Mutex<()>,
    snapshot_path: PathBuf,
}

impl TransactionalStore {
    /// Create an empty store that persists to `snapshot_path`.
    pub fn new(snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            persist_lock: Mutex::new(()),
            snapshot_path: snapshot_path.into(),
        }
    }

    /// Path of the snapshot file.
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Committed value for `key`. Never observes buffered transaction writes.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = self.read_state().committed.get(key).map(|item| item.value.clone());
        if value.is_none() {
            debug!("Key not found: {}", key);
        }
        value
    }

    /// Set `key`, buffered if a transaction is open.
    pub fn put(&self, key: &str, value: impl Into<String>) {
        let item = StoreItem {
            value: value.into(),
        };
        self.write_state().write(key, PendingWrite::Put(item));
    }

    /// Remove `key`, buffered as a tombstone if a transaction is open.
    pub fn delete(&self, key: &str) {
        self.write_state().write(key, PendingWrite::Tombstone);
    }

    /// Number of committed keys.
    pub fn len(&self) -> usize {
        self.read_state().committed.len()
    }

    /// True if no keys are committed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.read_state().transaction.is_some()
    }

    /// Open the store-wide transaction.
    ///
    /// Fails with `AlreadyInProgress` if one is open; the open transaction's
    /// buffer is left untouched.
    pub fn begin_transaction(&self) -> Result<(), StoreError> {
        let mut state = self.write_state();
        if state.transaction.is_some() {
            return Err(StoreError::AlreadyInProgress);
        }
        state.transaction = Some(Transaction::default());
        debug!("Transaction started");
        Ok(())
    }

    /// Apply every buffered write to committed state in one step and close
    /// the transaction.
    pub fn commit(&self) -> Result<(), StoreError> {
        let mut state = self.write_state();
        let tx = state
            .transaction
            .take()
            .ok_or(StoreError::NoActiveTransaction)?;

        let applied = tx.pending.len();
        for (key, write) in tx.pending {
            match write {
                PendingWrite::Put(item) => {
                    state.committed.insert(key, item);
                }
                PendingWrite::Tombstone => {
                    state.committed.remove(&key);
                }
            }
        }
        debug!("Transaction committed ({} writes)", applied);
        Ok(())
    }

    /// Discard the buffered writes. Safe to call with no open transaction.
    pub fn rollback(&self) {
        if let Some(tx) = self.write_state().transaction.take() {
            debug!("Transaction rolled back ({} writes discarded)", tx.pending.len());
        }
    }

    /// Write the committed state to the snapshot file, replacing any previous one.
    ///
    /// Blocks until the file is synced. Concurrent calls are serialised, so
    /// the file on disk always holds the most recent snapshot taken. Readers
    /// and writers are only held off while the state is encoded.
    pub fn persist(&self) -> Result<(), StoreError> {
        let _persisting = self
            .persist_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let bytes = {
            let state = self.read_state();
            snapshot::encode(&state.committed)?
        };
        snapshot::write_atomic(&self.snapshot_path, &bytes)
    }

    /// Replace committed state with the snapshot file's contents.
    ///
    /// A missing or empty snapshot yields an empty store.
    pub fn load(&self) -> Result<(), StoreError> {
        let items = snapshot::read(&self.snapshot_path)?;
        let count = items.len();
        self.write_state().committed = items;
        info!(
            "Loaded {} keys from {}",
            count,
            self.snapshot_path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use tempfile::TempDir;

    fn store() -> TransactionalStore {
        TransactionalStore::new("unused.json")
    }

    #[test]
    fn test_put_get_delete() {
        let store = store();
        store.put("k", "v");
        assert_eq!(store.get("k").as_deref(), Some("v"));

        store.delete("k");
        assert_eq!(store.get("k"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_transaction_isolation() {
        let store = store();
        store.put("k", "v1");

        store.begin_transaction().unwrap();
        store.put("k", "v2");
        store.put("fresh", "x");
        assert_eq!(store.get("k").as_deref(), Some("v1"));
        assert_eq!(store.get("fresh"), None);

        store.commit().unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v2"));
        assert_eq!(store.get("fresh").as_deref(), Some("x"));
        assert!(!store.in_transaction());
    }

    #[test]
    fn test_delete_in_transaction_is_tombstone() {
        let store = store();
        store.put("k", "v");

        store.begin_transaction().unwrap();
        store.delete("k");
        assert_eq!(store.get("k").as_deref(), Some("v"));

        store.commit().unwrap();
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn test_rollback_restores_pre_transaction_state() {
        let store = store();
        store.put("a", "1");
        store.put("b", "2");

        store.begin_transaction().unwrap();
        store.put("a", "changed");
        store.delete("b");
        store.put("c", "3");
        store.rollback();

        assert_eq!(store.get("a").as_deref(), Some("1"));
        assert_eq!(store.get("b").as_deref(), Some("2"));
        assert_eq!(store.get("c"), None);
        assert_eq!(store.len(), 2);

        // Writes after rollback apply directly.
        store.put("c", "3");
        assert_eq!(store.get("c").as_deref(), Some("3"));
    }

    #[test]
    fn test_rollback_without_transaction_is_noop() {
        let store = store();
        store.put("k", "v");
        store.rollback();
        assert_eq!(store.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_double_begin_keeps_first_buffer() {
        let store = store();
        store.begin_transaction().unwrap();
        store.put("k", "buffered");

        assert!(matches!(
            store.begin_transaction(),
            Err(StoreError::AlreadyInProgress)
        ));

        store.commit().unwrap();
        assert_eq!(store.get("k").as_deref(), Some("buffered"));
    }

    #[test]
    fn test_commit_without_transaction() {
        let store = store();
        assert!(matches!(store.commit(), Err(StoreError::NoActiveTransaction)));
    }

    #[test]
    fn test_persist_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memdb.json");

        let store = TransactionalStore::new(&path);
        store.put("a", "1");
        store.put("b", "2");
        store.begin_transaction().unwrap();
        store.put("uncommitted", "x");
        store.persist().unwrap();

        let restored = TransactionalStore::new(&path);
        restored.put("stale", "gone");
        restored.load().unwrap();

        assert_eq!(restored.get("a").as_deref(), Some("1"));
        assert_eq!(restored.get("b").as_deref(), Some("2"));
        assert_eq!(restored.get("uncommitted"), None);
        assert_eq!(restored.get("stale"), None);
    }

    #[test]
    fn test_load_missing_snapshot_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = TransactionalStore::new(dir.path().join("none.json"));
        store.load().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_readers_never_see_partial_commit() {
        let store = Arc::new(store());
        store.put("a", "0");
        store.put("b", "0");
        let start = Arc::new(Barrier::new(2));

        let reader = {
            let store = store.clone();
            let start = start.clone();
            std::thread::spawn(move || {
                start.wait();
                // Spin until the commit lands; `b` can never revert, so
                // reading it after `a` is enough.
                loop {
                    let a = store.get("a");
                    let b = store.get("b");
                    match a.as_deref() {
                        Some("1") => {
                            assert_eq!(b.as_deref(), Some("1"));
                            return;
                        }
                        other => assert_eq!(other, Some("0")),
                    }
                }
            })
        };

        store.begin_transaction().unwrap();
        store.put("b", "1");
        store.put("a", "1");
        start.wait();
        store.commit().unwrap();

        reader.join().unwrap();
    }

    #[test]
    fn test_concurrent_persists_keep_latest_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memdb.json");

        for round in 0..5 {
            let store = Arc::new(TransactionalStore::new(&path));
            let start = Arc::new(Barrier::new(8));

            let workers: Vec<_> = (0..8)
                .map(|i| {
                    let store = store.clone();
                    let start = start.clone();
                    std::thread::spawn(move || {
                        start.wait();
                        store.put(&format!("k{i}"), i.to_string());
                        store.persist().unwrap();
                    })
                })
                .collect();
            for worker in workers {
                worker.join().unwrap();
            }

            let restored = TransactionalStore::new(&path);
            restored.load().unwrap();
            assert_eq!(restored.len(), 8, "round {round}");
        }
    }
}
