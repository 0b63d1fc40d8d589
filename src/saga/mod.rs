//! Sagas - Long-lived correlated state with unique correlation values.
//!
//! Saga state is stored in a [`SagaDataContainer`]. When the saga is looked
//! up by a correlation property, a [`SagaUniqueIdentity`] is stored next to
//! it under a key derived from `(saga type, property, value)`. Both are
//! created with create-if-absent in one commit, so two instances can never
//! claim the same correlation value.
//!
//! ## Example
//!
//! ```ignore
//! use cas_persistence::{CorrelationProperty, SagaData, SagaPersister};
//!
//! #[derive(Serialize, Deserialize, SagaData)]
//! #[saga(name = "Shop.OrderSagaData")]
//! struct OrderSagaData {
//!     id: Uuid,
//!     order_id: String,
//! }
//!
//! let order_id = CorrelationProperty::new("OrderId", &data.order_id);
//! sagas.save(&data, Some(&order_id), tx.session_mut())?;
//! tx.commit().await?;
//! ```

mod collections;
mod documents;
mod persister;

use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

pub use collections::SagaCollections;
pub use documents::{SagaDataContainer, SagaUniqueIdentity};
pub use persister::{SagaPersister, DEFAULT_IDENTITY_SEPARATOR};

/// Trait for types that can be stored as saga state.
pub trait SagaData: Serialize + DeserializeOwned + Send + Sync {
    /// Stable name of the saga data type. Part of the uniqueness key and
    /// the lookup key for the type's collection.
    const TYPE_NAME: &'static str;

    /// Returns the saga instance id.
    fn id(&self) -> Uuid;
}

/// The business value a saga is correlated on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationProperty {
    pub name: String,
    /// String form of the value; this is what uniqueness is enforced on.
    pub value: String,
}

impl CorrelationProperty {
    pub fn new(name: impl Into<String>, value: impl ToString) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
        }
    }
}
