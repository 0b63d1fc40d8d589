//! Outbox and saga persistence over a compare-and-swap key-value store.
//!
//! - [`OutboxPersister`] records the outgoing messages produced while
//!   handling an incoming message, keyed by that message's id, so a redelivery
//!   is recognized and its side effects are not repeated.
//! - [`OutboxCleaner`] (and [`OutboxCleanupTask`] on a timer) removes
//!   dispatched records once they have aged out.
//! - [`SagaPersister`] stores saga state and enforces that no two instances
//!   of a saga type share a correlation value.
//!
//! All writes go through a [`Session`] and are applied by one atomic
//! [`CasStore::commit`]. Conflicts are detected by the store, never by
//! client-side locks.

// Lets `#[derive(SagaData)]` expand to `cas_persistence::...` inside this crate.
extern crate self as cas_persistence;

mod config;
mod error;
pub mod keys;
mod outbox;
mod saga;
mod session;
mod store;

pub use config::{ConfigError, OutboxSettings, PersistenceConfig};
pub use error::PersistenceError;
pub use outbox::{
    CleanupReport, CleanupStats, OutboxCleaner, OutboxCleanupTask, OutboxMessage,
    OutboxPersister, OutboxRecord, OutboxTransaction, TransportOperation, DEFAULT_PAGE_SIZE,
};
pub use saga::{
    CorrelationProperty, SagaCollections, SagaData, SagaDataContainer, SagaPersister,
    SagaUniqueIdentity, DEFAULT_IDENTITY_SEPARATOR,
};
pub use session::{
    DatabaseStores, Headers, MessageContext, ResolveSession, Session, SessionByDatabaseName,
    SessionByDelegate, VersionToken,
};
pub use store::{CasStore, InMemoryCasStore, ScanPage, StoreError, StoreOp, StoredValue};

/// Saga ids are v4 UUIDs.
pub use uuid::Uuid;

// Re-export the derive macro (same name as the trait, different namespace)
#[cfg(feature = "derive")]
pub use cas_persistence_macros::SagaData;
