use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope around a saga's state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SagaDataContainer {
    /// The container's own key.
    pub id: String,
    /// Saga state, opaque to the persister.
    pub data: serde_json::Value,
    /// Key of the paired uniqueness reservation, if the saga has one.
    #[serde(default)]
    pub identity_doc_id: Option<String>,
}

/// Reservation of a correlation value by one saga instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SagaUniqueIdentity {
    /// The reservation's own key.
    pub id: String,
    pub saga_id: Uuid,
    pub unique_value: String,
    /// Key of the owning container.
    pub saga_doc_id: String,
}
