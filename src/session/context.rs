//! Per-message context handed to the persisters.
//!
//! Carries the incoming message (when there is one) so session resolution
//! can pick a store from its headers.

use std::collections::HashMap;

/// Transport headers of a message.
pub type Headers = HashMap<String, String>;

/// The context of the unit of work being processed.
///
/// Outside message processing (e.g. a dispatcher confirming delivery after
/// a restart) there is no incoming message, and persisters fall back to the
/// default store.
#[derive(Debug, Clone, Default)]
pub struct MessageContext {
    incoming: Option<IncomingMessage>,
}

#[derive(Debug, Clone)]
struct IncomingMessage {
    message_id: String,
    headers: Headers,
}

impl MessageContext {
    /// A context with no incoming message.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context for an incoming message.
    pub fn for_message(message_id: impl Into<String>, headers: Headers) -> Self {
        Self {
            incoming: Some(IncomingMessage {
                message_id: message_id.into(),
                headers,
            }),
        }
    }

    /// Id of the incoming message, if any.
    pub fn message_id(&self) -> Option<&str> {
        self.incoming.as_ref().map(|m| m.message_id.as_str())
    }

    /// Headers of the incoming message, if any.
    pub fn headers(&self) -> Option<&Headers> {
        self.incoming.as_ref().map(|m| &m.headers)
    }

    /// Get a header of the incoming message.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers()
            .and_then(|headers| headers.get(key))
            .map(|v| v.as_str())
    }
}
