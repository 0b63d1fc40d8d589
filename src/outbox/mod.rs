//! Outbox - Exactly-once effects on top of at-least-once delivery.
//!
//! A handler's outgoing operations are stored in an [`OutboxRecord`] keyed
//! by the incoming message id, in the same commit as its business state.
//! Redelivery of the message finds the record and replays the stored
//! operations instead of running the handler again.
//!
//! ## Example
//!
//! ```ignore
//! let context = MessageContext::for_message(message_id, headers);
//! if let Some(record) = outbox.get(message_id, &context).await? {
//!     dispatch(&record.transport_operations).await?;
//! } else {
//!     let mut tx = outbox.begin_transaction(&context)?;
//!     let operations = handle(message, tx.session_mut()).await?;
//!     outbox.store(&OutboxMessage::new(message_id, operations.clone()), &mut tx)?;
//!     tx.commit().await?;
//!     dispatch(&operations).await?;
//! }
//! outbox.set_as_dispatched(message_id, &context).await?;
//! ```

mod cleaner;
mod cleanup_task;
mod persister;
mod record;

pub use cleaner::{CleanupReport, OutboxCleaner, DEFAULT_PAGE_SIZE};
pub use cleanup_task::{CleanupStats, OutboxCleanupTask};
pub use persister::{OutboxPersister, OutboxTransaction};
pub use record::{OutboxMessage, OutboxRecord, TransportOperation};
