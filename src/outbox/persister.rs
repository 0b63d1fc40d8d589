use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::record::{OutboxMessage, OutboxRecord};
use crate::error::PersistenceError;
use crate::keys;
use crate::session::{CreateIntent, MessageContext, ResolveSession, Session};
use crate::store::CasStore;

/// An open unit of work for one incoming message.
///
/// Owns the session; saga persistence for the same message enlists into it
/// through [`OutboxTransaction::session_mut`], so the outbox record and the
/// saga changes commit together.
#[derive(Debug)]
pub struct OutboxTransaction {
    session: Session,
}

impl OutboxTransaction {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Commit the outbox record and everything else enlisted in the session.
    pub async fn commit(mut self) -> Result<(), PersistenceError> {
        self.session.commit().await
    }

    /// Unwrap into the underlying session without committing.
    pub fn into_session(self) -> Session {
        self.session
    }
}

/// Transaction-scoped access to the outbox records of one endpoint.
///
/// Idempotency across redelivery comes from the record key being derived
/// from the message id: storing the same message twice hits the store's
/// create conflict instead of writing a second record.
pub struct OutboxPersister {
    store: Arc<dyn CasStore>,
    endpoint_name: String,
    sessions: Arc<dyn ResolveSession>,
}

impl OutboxPersister {
    /// `store` is used when the context carries no incoming message;
    /// otherwise `sessions` picks the session from the message headers.
    pub fn new(
        store: Arc<dyn CasStore>,
        endpoint_name: impl Into<String>,
        sessions: Arc<dyn ResolveSession>,
    ) -> Self {
        Self {
            store,
            endpoint_name: endpoint_name.into(),
            sessions,
        }
    }

    pub fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }

    /// Load the record for `message_id`.
    ///
    /// Dispatched records come back with an empty operation list.
    pub async fn get(
        &self,
        message_id: &str,
        context: &MessageContext,
    ) -> Result<Option<OutboxRecord>, PersistenceError> {
        let mut session = self.open_session(context)?;
        let key = self.record_key(message_id);

        let Some(stored) = session.load(&key).await? else {
            return Ok(None);
        };

        let mut record: OutboxRecord = serde_json::from_slice(&stored.value)?;
        if record.dispatched {
            record.transport_operations.clear();
        }
        Ok(Some(record))
    }

    /// Open the unit of work for the message in `context`.
    pub fn begin_transaction(
        &self,
        context: &MessageContext,
    ) -> Result<OutboxTransaction, PersistenceError> {
        Ok(OutboxTransaction::new(self.open_session(context)?))
    }

    /// Enlist a create of the message's outbox record.
    ///
    /// If a record already exists for this message id, the commit fails
    /// with [`PersistenceError::DuplicateMessage`] and nothing is written.
    pub fn store(
        &self,
        message: &OutboxMessage,
        transaction: &mut OutboxTransaction,
    ) -> Result<(), PersistenceError> {
        let key = self.record_key(&message.message_id);
        let document = serde_json::to_vec(&OutboxRecord::pending(message))?;

        debug!(
            endpoint = %self.endpoint_name,
            message_id = %message.message_id,
            operations = message.transport_operations.len(),
            "storing outbox record"
        );

        transaction.session_mut().create_with_intent(
            key,
            document,
            CreateIntent::OutboxRecord {
                message_id: message.message_id.clone(),
            },
        );
        Ok(())
    }

    /// Mark the message's operations as delivered.
    ///
    /// A missing or already-dispatched record is a no-op, so this is safe to
    /// repeat. A version conflict means someone else changed the record and
    /// is returned as an error.
    pub async fn set_as_dispatched(
        &self,
        message_id: &str,
        context: &MessageContext,
    ) -> Result<(), PersistenceError> {
        let mut session = self.open_session(context)?;
        let key = self.record_key(message_id);

        let Some(stored) = session.load(&key).await? else {
            return Ok(());
        };

        let mut record: OutboxRecord = serde_json::from_slice(&stored.value)?;
        if record.dispatched {
            return Ok(());
        }

        record.mark_dispatched(Utc::now());
        session.update(&key, serde_json::to_vec(&record)?)?;
        session.commit().await?;

        info!(endpoint = %self.endpoint_name, message_id, "outbox record dispatched");
        Ok(())
    }

    fn record_key(&self, message_id: &str) -> String {
        keys::outbox_record_key(&self.endpoint_name, message_id)
    }

    fn open_session(&self, context: &MessageContext) -> Result<Session, PersistenceError> {
        match context.headers() {
            Some(headers) => self.sessions.resolve_session(headers),
            None => Ok(Session::new(self.store.clone())),
        }
    }
}
