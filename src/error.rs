use thiserror::Error;

use crate::config::ConfigError;
use crate::store::StoreError;

/// Error type for outbox and saga persistence operations.
///
/// Conflicts are correctness signals: they are never retried internally and
/// must reach the message-processing layer so it can fail the unit of work.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// An outbox record for this message id is already stored. The existing
    /// record is untouched; the caller is processing a duplicate.
    #[error("outbox record for message {message_id} already exists")]
    DuplicateMessage { message_id: String },

    /// Another saga instance already owns this correlation value.
    #[error("saga {saga_type} already has an instance with {property} = {value}")]
    UniquenessViolation {
        saga_type: String,
        property: String,
        value: String,
    },

    /// A conditioned write was requested for a key this session never read.
    #[error("no version token for {key}; it must be read through this session first")]
    MissingVersionToken { key: String },

    /// No collection name was registered for this saga type.
    #[error("no collection registered for saga type {0}")]
    UnregisteredSagaType(String),

    /// Session resolution asked for a database that is not configured.
    #[error("unknown database: {0}")]
    UnknownDatabase(String),

    /// The operation observed a cancellation request.
    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The background cleanup task panicked or was aborted.
    #[error("outbox cleanup task failed: {0}")]
    CleanupTaskFailed(String),

    /// Error reported by the CAS store.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A stored document could not be encoded or decoded.
    #[error("document serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl PersistenceError {
    /// True for create or version conflicts, whatever layer reported them.
    pub fn is_conflict(&self) -> bool {
        match self {
            PersistenceError::DuplicateMessage { .. }
            | PersistenceError::UniquenessViolation { .. } => true,
            PersistenceError::Store(err) => err.conflicting_key().is_some(),
            _ => false,
        }
    }
}
