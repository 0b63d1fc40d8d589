//! CasStore - The compare-and-swap key-value contract the persisters run on.
//!
//! Every key carries a version assigned by the store. Writes are conditioned
//! on that version (or on the key being absent), which gives per-key
//! linearizability. Cross-key atomicity is only available through
//! [`CasStore::commit`], which applies a batch of operations all-or-nothing.
//!
//! ## Example
//!
//! ```ignore
//! use cas_persistence::{CasStore, InMemoryCasStore, StoreOp};
//!
//! let store = InMemoryCasStore::new();
//! store.create("Outbox/Sales/abc", b"{}".to_vec()).await?;
//! let stored = store.read("Outbox/Sales/abc").await?.unwrap();
//! store.update("Outbox/Sales/abc", b"{\"x\":1}".to_vec(), stored.version).await?;
//! ```

mod in_memory;

use async_trait::async_trait;
use thiserror::Error;

pub use in_memory::InMemoryCasStore;

/// A value read from the store together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub key: String,
    pub value: Vec<u8>,
    pub version: u64,
}

/// One page of a prefix scan, in key order.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub values: Vec<StoredValue>,
}

impl ScanPage {
    /// Number of entries on this page.
    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A single conditioned write, enlisted into an atomic commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// Create the key; fails if it already exists.
    Create { key: String, value: Vec<u8> },
    /// Replace the value; fails unless the current version matches.
    Update {
        key: String,
        value: Vec<u8>,
        version: u64,
    },
    /// Remove the key; fails unless the current version matches.
    Delete { key: String, version: u64 },
}

impl StoreOp {
    pub fn key(&self) -> &str {
        match self {
            StoreOp::Create { key, .. } | StoreOp::Update { key, .. } | StoreOp::Delete { key, .. } => {
                key
            }
        }
    }
}

/// Error type for CAS store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A create targeted a key that already exists.
    #[error("key {key} already exists")]
    CreateConflict { key: String },
    /// A conditioned write found a different version. `actual` is `None`
    /// when the key no longer exists.
    #[error("version conflict on {key} (expected version {expected}, actual {actual:?})")]
    VersionConflict {
        key: String,
        expected: u64,
        actual: Option<u64>,
    },
    /// Transport or backend failure. Retry policy belongs to the caller.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Key the conflict was reported on, if this is a conflict.
    pub fn conflicting_key(&self) -> Option<&str> {
        match self {
            StoreError::CreateConflict { key } | StoreError::VersionConflict { key, .. } => Some(key),
            StoreError::Unavailable(_) => None,
        }
    }

    /// True when a conditioned write failed because the key is already gone.
    pub fn is_already_deleted(&self) -> bool {
        matches!(self, StoreError::VersionConflict { actual: None, .. })
    }
}

/// Abstract compare-and-swap key-value store.
///
/// Implementations talk to a remote linearizable store; [`InMemoryCasStore`]
/// is the process-local reference implementation.
#[async_trait]
pub trait CasStore: Send + Sync {
    /// Read a key with its version. Returns `None` if absent.
    async fn read(&self, key: &str) -> Result<Option<StoredValue>, StoreError>;

    /// Return up to `limit` entries whose key starts with `prefix`, skipping
    /// the first `offset` matches. Entries come back in key order.
    async fn scan_prefix(
        &self,
        prefix: &str,
        offset: usize,
        limit: usize,
    ) -> Result<ScanPage, StoreError>;

    /// Apply every operation atomically. Either all succeed or none is
    /// applied and the first failing condition is reported.
    async fn commit(&self, ops: Vec<StoreOp>) -> Result<(), StoreError>;

    /// Create a single key.
    async fn create(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.commit(vec![StoreOp::Create {
            key: key.to_string(),
            value,
        }])
        .await
    }

    /// Update a single key conditioned on `version`.
    async fn update(&self, key: &str, value: Vec<u8>, version: u64) -> Result<(), StoreError> {
        self.commit(vec![StoreOp::Update {
            key: key.to_string(),
            value,
            version,
        }])
        .await
    }

    /// Delete a single key conditioned on `version`.
    async fn delete(&self, key: &str, version: u64) -> Result<(), StoreError> {
        self.commit(vec![StoreOp::Delete {
            key: key.to_string(),
            version,
        }])
        .await
    }
}
