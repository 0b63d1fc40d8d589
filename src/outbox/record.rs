use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A side-effect to hand to the transport once the handler's work commits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransportOperation {
    pub message_id: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(rename = "Message", with = "base64_body")]
    pub body: Vec<u8>,
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl TransportOperation {
    pub fn new(message_id: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            message_id: message_id.into(),
            headers: HashMap::new(),
            body,
            options: HashMap::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// The outgoing side-effects of one incoming message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutboxMessage {
    pub message_id: String,
    pub transport_operations: Vec<TransportOperation>,
}

impl OutboxMessage {
    pub fn new(message_id: impl Into<String>, transport_operations: Vec<TransportOperation>) -> Self {
        Self {
            message_id: message_id.into(),
            transport_operations,
        }
    }
}

/// Delivery ledger entry for one incoming message.
///
/// Created once, flipped to dispatched once, and removed by the cleaner
/// after it ages out. Dispatching clears the operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OutboxRecord {
    pub message_id: String,
    pub dispatched: bool,
    #[serde(default)]
    pub dispatched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transport_operations: Vec<TransportOperation>,
}

impl OutboxRecord {
    /// A not-yet-dispatched record holding the message's operations.
    pub fn pending(message: &OutboxMessage) -> Self {
        Self {
            message_id: message.message_id.clone(),
            dispatched: false,
            dispatched_at: None,
            transport_operations: message.transport_operations.clone(),
        }
    }

    /// Mark as dispatched at `at` and drop the payload.
    pub fn mark_dispatched(&mut self, at: DateTime<Utc>) {
        self.dispatched = true;
        self.dispatched_at = Some(at);
        self.transport_operations.clear();
    }

    /// True when the record is dispatched at or before `cutoff`.
    pub fn is_dispatched_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.dispatched && self.dispatched_at.is_some_and(|at| at <= cutoff)
    }
}

mod base64_body {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
