//! InMemoryCasStore - BTreeMap-backed CAS store for testing and development.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::{CasStore, ScanPage, StoreError, StoreOp, StoredValue};

/// Internal stored representation of a value.
struct StoredEntry {
    bytes: Vec<u8>,
    version: u64,
}

#[derive(Default)]
struct Inner {
    entries: BTreeMap<String, StoredEntry>,
    /// Store-wide version counter. Versions are never reused, so a key that
    /// is deleted and recreated cannot satisfy a stale condition.
    last_version: u64,
}

/// In-memory CAS store backed by a `BTreeMap`.
///
/// Keys are kept ordered so prefix scans page deterministically.
/// Clone-friendly via Arc: clones share the same storage.
#[derive(Clone, Default)]
pub struct InMemoryCasStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryCasStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys in order.
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .read()
            .map(|inner| inner.entries.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// State of a key after the earlier operations of the batch.
#[derive(Clone, Copy)]
enum Staged {
    /// Written by this batch; it has no committed version yet.
    Written,
    Removed,
}

/// Checks every condition in `ops` against the current entries, taking
/// earlier operations of the same batch into account.
fn validate(entries: &BTreeMap<String, StoredEntry>, ops: &[StoreOp]) -> Result<(), StoreError> {
    let mut staged: HashMap<&str, Staged> = HashMap::new();

    for op in ops {
        let key = op.key();
        let committed = entries.get(key).map(|entry| entry.version);
        let exists = match staged.get(key) {
            Some(Staged::Written) => true,
            Some(Staged::Removed) => false,
            None => committed.is_some(),
        };

        match op {
            StoreOp::Create { .. } => {
                if exists {
                    return Err(StoreError::CreateConflict {
                        key: key.to_string(),
                    });
                }
                staged.insert(key, Staged::Written);
            }
            StoreOp::Update { version, .. } | StoreOp::Delete { version, .. } => {
                // A key staged by this batch cannot match any caller version.
                let matches = staged.get(key).is_none() && committed == Some(*version);
                if !matches {
                    return Err(StoreError::VersionConflict {
                        key: key.to_string(),
                        expected: *version,
                        actual: if exists { committed } else { None },
                    });
                }
                let next = match op {
                    StoreOp::Delete { .. } => Staged::Removed,
                    _ => Staged::Written,
                };
                staged.insert(key, next);
            }
        }
    }

    Ok(())
}

#[async_trait]
impl CasStore for InMemoryCasStore {
    async fn read(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;

        Ok(inner.entries.get(key).map(|entry| StoredValue {
            key: key.to_string(),
            value: entry.bytes.clone(),
            version: entry.version,
        }))
    }

    async fn scan_prefix(
        &self,
        prefix: &str,
        offset: usize,
        limit: usize,
    ) -> Result<ScanPage, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;

        let values = inner
            .entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .skip(offset)
            .take(limit)
            .map(|(key, entry)| StoredValue {
                key: key.clone(),
                value: entry.bytes.clone(),
                version: entry.version,
            })
            .collect();

        Ok(ScanPage { values })
    }

    async fn commit(&self, ops: Vec<StoreOp>) -> Result<(), StoreError> {
        if ops.is_empty() {
            return Ok(());
        }

        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;

        validate(&inner.entries, &ops)?;

        for op in ops {
            match op {
                StoreOp::Create { key, value } | StoreOp::Update { key, value, .. } => {
                    inner.last_version += 1;
                    let version = inner.last_version;
                    inner.entries.insert(
                        key,
                        StoredEntry {
                            bytes: value,
                            version,
                        },
                    );
                }
                StoreOp::Delete { key, .. } => {
                    inner.entries.remove(&key);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_read() {
        let store = InMemoryCasStore::new();
        store.create("a", b"one".to_vec()).await.unwrap();

        let stored = store.read("a").await.unwrap().unwrap();
        assert_eq!(stored.value, b"one".to_vec());
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn read_missing_returns_none() {
        let store = InMemoryCasStore::new();
        assert!(store.read("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_fails_on_existing() {
        let store = InMemoryCasStore::new();
        store.create("a", b"one".to_vec()).await.unwrap();

        let err = store.create("a", b"two".to_vec()).await.unwrap_err();
        assert_eq!(err, StoreError::CreateConflict { key: "a".into() });
        assert_eq!(store.read("a").await.unwrap().unwrap().value, b"one".to_vec());
    }

    #[tokio::test]
    async fn update_with_wrong_version_fails() {
        let store = InMemoryCasStore::new();
        store.create("a", b"one".to_vec()).await.unwrap();

        let err = store.update("a", b"two".to_vec(), 99).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict {
                expected: 99,
                actual: Some(1),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn versions_are_never_reused() {
        let store = InMemoryCasStore::new();
        store.create("a", b"one".to_vec()).await.unwrap();
        let first = store.read("a").await.unwrap().unwrap();

        store.delete("a", first.version).await.unwrap();
        store.create("a", b"again".to_vec()).await.unwrap();

        let err = store.delete("a", first.version).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn delete_of_missing_key_reports_already_deleted() {
        let store = InMemoryCasStore::new();
        let err = store.delete("gone", 3).await.unwrap_err();
        assert!(err.is_already_deleted());
    }

    #[tokio::test]
    async fn failed_commit_applies_nothing() {
        let store = InMemoryCasStore::new();
        store.create("taken", b"x".to_vec()).await.unwrap();

        let err = store
            .commit(vec![
                StoreOp::Create {
                    key: "fresh".into(),
                    value: b"y".to_vec(),
                },
                StoreOp::Create {
                    key: "taken".into(),
                    value: b"z".to_vec(),
                },
            ])
            .await
            .unwrap_err();

        assert_eq!(err.conflicting_key(), Some("taken"));
        assert!(store.read("fresh").await.unwrap().is_none());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn second_write_in_one_batch_reports_committed_version() {
        let store = InMemoryCasStore::new();
        store.create("a", b"one".to_vec()).await.unwrap();
        let version = store.read("a").await.unwrap().unwrap().version;

        let err = store
            .commit(vec![
                StoreOp::Update {
                    key: "a".into(),
                    value: b"two".to_vec(),
                    version,
                },
                StoreOp::Update {
                    key: "a".into(),
                    value: b"three".to_vec(),
                    version,
                },
            ])
            .await
            .unwrap_err();

        assert_eq!(
            err,
            StoreError::VersionConflict {
                key: "a".into(),
                expected: version,
                actual: Some(version),
            }
        );
        assert_eq!(store.read("a").await.unwrap().unwrap().value, b"one".to_vec());
    }

    #[tokio::test]
    async fn scan_pages_in_key_order() {
        let store = InMemoryCasStore::new();
        for i in 0..5 {
            store.create(&format!("p/{}", i), vec![i]).await.unwrap();
        }
        store.create("q/0", vec![]).await.unwrap();

        let first = store.scan_prefix("p/", 0, 3).await.unwrap();
        assert_eq!(first.count(), 3);
        assert_eq!(first.values[0].key, "p/0");

        let second = store.scan_prefix("p/", 3, 3).await.unwrap();
        assert_eq!(second.count(), 2);
        assert_eq!(second.values[1].key, "p/4");
    }

    #[tokio::test]
    async fn clone_shares_storage() {
        let store = InMemoryCasStore::new();
        let clone = store.clone();

        store.create("a", b"one".to_vec()).await.unwrap();
        assert!(clone.read("a").await.unwrap().is_some());
    }
}
