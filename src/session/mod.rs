//! Session - The unit of work shared by the outbox and saga persisters.
//!
//! A session collects conditioned writes and commits them as one atomic
//! store batch. It also owns the request-scoped version tokens: every key
//! read through [`Session::load`] remembers the version it was read at, and
//! later updates or deletes of that key are conditioned on it.
//!
//! ## Example
//!
//! ```ignore
//! let mut session = Session::new(store.clone());
//! let saga = persister.get_by_id::<OrderSaga>(id, &mut session).await?;
//! persister.update(&changed, &mut session)?;
//! session.commit().await?;
//! ```

mod context;
mod resolver;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::PersistenceError;
use crate::store::{CasStore, StoreError, StoreOp, StoredValue};

pub use context::{Headers, MessageContext};
pub use resolver::{DatabaseStores, ResolveSession, SessionByDatabaseName, SessionByDelegate};

/// The version a key was read at, plus the document as it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionToken {
    pub version: u64,
    pub document: Vec<u8>,
}

/// What a create-conflict on a given key means to the caller.
#[derive(Debug, Clone)]
pub(crate) enum CreateIntent {
    OutboxRecord {
        message_id: String,
    },
    UniqueIdentity {
        saga_type: String,
        property: String,
        value: String,
    },
}

impl CreateIntent {
    fn into_error(self) -> PersistenceError {
        match self {
            CreateIntent::OutboxRecord { message_id } => {
                PersistenceError::DuplicateMessage { message_id }
            }
            CreateIntent::UniqueIdentity {
                saga_type,
                property,
                value,
            } => PersistenceError::UniquenessViolation {
                saga_type,
                property,
                value,
            },
        }
    }
}

/// A unit of work against one CAS store.
pub struct Session {
    store: Arc<dyn CasStore>,
    database: Option<String>,
    pending: Vec<StoreOp>,
    versions: HashMap<String, VersionToken>,
    intents: HashMap<String, CreateIntent>,
}

impl Session {
    /// Open a session on `store`.
    pub fn new(store: Arc<dyn CasStore>) -> Self {
        Self {
            store,
            database: None,
            pending: Vec::new(),
            versions: HashMap::new(),
            intents: HashMap::new(),
        }
    }

    /// Open a session on a named database's store.
    pub fn for_database(store: Arc<dyn CasStore>, database: impl Into<String>) -> Self {
        let mut session = Self::new(store);
        session.database = Some(database.into());
        session
    }

    /// Name of the database this session was opened for, if not the default.
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// The store this session writes to.
    pub fn store(&self) -> &Arc<dyn CasStore> {
        &self.store
    }

    /// Read `key` and remember the version it was read at.
    pub async fn load(&mut self, key: &str) -> Result<Option<StoredValue>, PersistenceError> {
        let stored = self.store.read(key).await?;
        if let Some(stored) = &stored {
            self.versions.insert(
                key.to_string(),
                VersionToken {
                    version: stored.version,
                    document: stored.value.clone(),
                },
            );
        }
        Ok(stored)
    }

    /// The token recorded by the last [`Session::load`] of `key`.
    pub fn version_token(&self, key: &str) -> Option<&VersionToken> {
        self.versions.get(key)
    }

    /// Enlist a create of `key`.
    pub fn create(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.pending.push(StoreOp::Create {
            key: key.into(),
            value,
        });
    }

    /// Enlist a create whose conflict carries meaning for the caller.
    pub(crate) fn create_with_intent(
        &mut self,
        key: impl Into<String>,
        value: Vec<u8>,
        intent: CreateIntent,
    ) {
        let key = key.into();
        self.intents.insert(key.clone(), intent);
        self.create(key, value);
    }

    /// Enlist an update of `key`, conditioned on the version it was loaded at.
    ///
    /// A later update of the same key replaces the pending one, so the
    /// commit carries a single write per key.
    pub fn update(&mut self, key: &str, value: Vec<u8>) -> Result<(), PersistenceError> {
        let version = self.required_version(key)?;

        let pending = self.pending.iter_mut().find_map(|op| match op {
            StoreOp::Update { key: k, value, .. } if k == key => Some(value),
            _ => None,
        });
        match pending {
            Some(pending) => *pending = value,
            None => self.pending.push(StoreOp::Update {
                key: key.to_string(),
                value,
                version,
            }),
        }
        Ok(())
    }

    /// Enlist a delete of `key`, conditioned on the version it was loaded at.
    ///
    /// Supersedes any pending update of the key. The key's token is dropped,
    /// so it cannot be written again in this unit of work.
    pub fn delete(&mut self, key: &str) -> Result<(), PersistenceError> {
        let version = self.required_version(key)?;

        self.pending
            .retain(|op| !matches!(op, StoreOp::Update { key: k, .. } if k == key));
        self.pending.push(StoreOp::Delete {
            key: key.to_string(),
            version,
        });
        self.versions.remove(key);
        Ok(())
    }

    /// Operations waiting for [`Session::commit`].
    pub fn pending_operations(&self) -> &[StoreOp] {
        &self.pending
    }

    /// Commit every enlisted operation as one atomic batch.
    ///
    /// Version tokens are discarded afterwards whatever the outcome; a new
    /// unit of work has to read again.
    pub async fn commit(&mut self) -> Result<(), PersistenceError> {
        let ops = std::mem::take(&mut self.pending);
        let mut intents = std::mem::take(&mut self.intents);
        self.versions.clear();

        if ops.is_empty() {
            return Ok(());
        }

        debug!(
            operations = ops.len(),
            database = self.database.as_deref().unwrap_or("default"),
            "committing session"
        );

        match self.store.commit(ops).await {
            Ok(()) => Ok(()),
            Err(StoreError::CreateConflict { key }) => match intents.remove(&key) {
                Some(intent) => Err(intent.into_error()),
                None => Err(StoreError::CreateConflict { key }.into()),
            },
            Err(err) => Err(err.into()),
        }
    }

    fn required_version(&self, key: &str) -> Result<u64, PersistenceError> {
        self.versions
            .get(key)
            .map(|token| token.version)
            .ok_or_else(|| PersistenceError::MissingVersionToken {
                key: key.to_string(),
            })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("database", &self.database)
            .field("pending", &self.pending.len())
            .field("versions", &self.versions.len())
            .finish()
    }
}
