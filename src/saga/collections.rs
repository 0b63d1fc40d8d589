use std::collections::HashMap;

use super::SagaData;
use crate::error::PersistenceError;

/// Registry mapping saga data types to storage collection names.
///
/// Built once at startup, from configuration or in code.
#[derive(Debug, Clone, Default)]
pub struct SagaCollections {
    by_type: HashMap<String, String>,
}

impl SagaCollections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the collection for saga data type `T`.
    pub fn register<T: SagaData>(self, collection: impl Into<String>) -> Self {
        self.register_name(T::TYPE_NAME, collection)
    }

    /// Register a collection by saga type name.
    pub fn register_name(mut self, type_name: impl Into<String>, collection: impl Into<String>) -> Self {
        self.by_type.insert(type_name.into(), collection.into());
        self
    }

    /// Collection for the given saga type name.
    pub fn collection_for(&self, type_name: &str) -> Result<&str, PersistenceError> {
        self.by_type
            .get(type_name)
            .map(|c| c.as_str())
            .ok_or_else(|| PersistenceError::UnregisteredSagaType(type_name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SagaCollections {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |collections, (type_name, collection)| {
                collections.register_name(type_name, collection)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_type_fails() {
        let collections = SagaCollections::new().register_name("Shop.OrderSagaData", "OrderSagaDatas");

        assert_eq!(
            collections.collection_for("Shop.OrderSagaData").unwrap(),
            "OrderSagaDatas"
        );
        assert!(matches!(
            collections.collection_for("Shop.Other"),
            Err(PersistenceError::UnregisteredSagaType(_))
        ));
    }

    #[test]
    fn collects_from_pairs() {
        let collections: SagaCollections = vec![("A", "As"), ("B", "Bs")].into_iter().collect();
        assert_eq!(collections.len(), 2);
        assert_eq!(collections.collection_for("B").unwrap(), "Bs");
    }
}
