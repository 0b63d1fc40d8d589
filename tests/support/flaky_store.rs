//! A store that can be told to refuse deletes of specific keys, or to let
//! another writer in right after a key is read.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cas_persistence::{CasStore, InMemoryCasStore, ScanPage, StoreError, StoreOp, StoredValue};

#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: InMemoryCasStore,
    refused_deletes: Arc<Mutex<HashSet<String>>>,
    raced_reads: Arc<Mutex<HashSet<String>>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryCasStore {
        &self.inner
    }

    /// Make every commit that deletes `key` fail as unavailable.
    pub fn refuse_delete(&self, key: impl Into<String>) {
        self.refused_deletes.lock().unwrap().insert(key.into());
    }

    /// The next read of `key` returns the value it had, then rewrites it so
    /// the version the reader holds is already stale.
    pub fn race_next_read(&self, key: impl Into<String>) {
        self.raced_reads.lock().unwrap().insert(key.into());
    }

    pub fn heal(&self) {
        self.refused_deletes.lock().unwrap().clear();
    }
}

#[async_trait]
impl CasStore for FlakyStore {
    async fn read(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        let stored = self.inner.read(key).await?;
        let raced = self.raced_reads.lock().unwrap().remove(key);
        if let (true, Some(stored)) = (raced, &stored) {
            self.inner
                .update(key, stored.value.clone(), stored.version)
                .await?;
        }
        Ok(stored)
    }

    async fn scan_prefix(
        &self,
        prefix: &str,
        offset: usize,
        limit: usize,
    ) -> Result<ScanPage, StoreError> {
        self.inner.scan_prefix(prefix, offset, limit).await
    }

    async fn commit(&self, ops: Vec<StoreOp>) -> Result<(), StoreError> {
        let refused = {
            let refused = self.refused_deletes.lock().unwrap();
            ops.iter().find_map(|op| match op {
                StoreOp::Delete { key, .. } if refused.contains(key) => Some(key.clone()),
                _ => None,
            })
        };
        if let Some(key) = refused {
            return Err(StoreError::Unavailable(format!("delete of {} refused", key)));
        }
        self.inner.commit(ops).await
    }
}
