use tracing::{debug, warn};
use uuid::Uuid;

use super::collections::SagaCollections;
use super::documents::{SagaDataContainer, SagaUniqueIdentity};
use super::{CorrelationProperty, SagaData};
use crate::config::PersistenceConfig;
use crate::error::PersistenceError;
use crate::keys;
use crate::session::{CreateIntent, Session};

/// Default separator between collection name and saga id.
pub const DEFAULT_IDENTITY_SEPARATOR: &str = "/";

/// CRUD over saga state with unique correlation values.
///
/// Writes are enlisted into the caller's [`Session`] and take effect when it
/// commits. `update` and `complete` are conditioned on the version tokens a
/// prior `get` recorded in that same session, so a saga must be read before
/// it is written and lost updates surface as version conflicts.
#[derive(Debug, Clone)]
pub struct SagaPersister {
    collections: SagaCollections,
    separator: String,
}

impl SagaPersister {
    pub fn new(collections: SagaCollections) -> Self {
        Self {
            collections,
            separator: DEFAULT_IDENTITY_SEPARATOR.to_string(),
        }
    }

    /// Build from the saga collections and separator in `config`.
    pub fn from_config(config: &PersistenceConfig) -> Self {
        Self::new(config.saga_collections())
            .with_identity_separator(config.identity_parts_separator.clone())
    }

    /// Set the separator between collection name and saga id.
    pub fn with_identity_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Enlist the creation of a new saga instance.
    ///
    /// With a correlation property, a uniqueness reservation is created in
    /// the same commit. If another instance holds the value, the commit fails
    /// with [`PersistenceError::UniquenessViolation`] and neither document is
    /// written.
    pub fn save<T: SagaData>(
        &self,
        saga: &T,
        correlation: Option<&CorrelationProperty>,
        session: &mut Session,
    ) -> Result<(), PersistenceError> {
        let container_key = self.container_key::<T>(saga.id())?;
        let identity_key = correlation.map(|property| {
            keys::saga_unique_identity_key(T::TYPE_NAME, &property.name, &property.value)
        });

        let container = SagaDataContainer {
            id: container_key.clone(),
            data: serde_json::to_value(saga)?,
            identity_doc_id: identity_key.clone(),
        };
        session.create(container_key.clone(), serde_json::to_vec(&container)?);

        if let (Some(property), Some(identity_key)) = (correlation, identity_key) {
            let identity = SagaUniqueIdentity {
                id: identity_key.clone(),
                saga_id: saga.id(),
                unique_value: property.value.clone(),
                saga_doc_id: container_key,
            };
            session.create_with_intent(
                identity_key,
                serde_json::to_vec(&identity)?,
                CreateIntent::UniqueIdentity {
                    saga_type: T::TYPE_NAME.to_string(),
                    property: property.name.clone(),
                    value: property.value.clone(),
                },
            );
        }

        debug!(saga_type = T::TYPE_NAME, saga_id = %saga.id(), "saga save enlisted");
        Ok(())
    }

    /// Enlist an update of the saga's state.
    ///
    /// Requires the saga to have been read through `session` first.
    pub fn update<T: SagaData>(&self, saga: &T, session: &mut Session) -> Result<(), PersistenceError> {
        let key = self.container_key::<T>(saga.id())?;
        let token = session
            .version_token(&key)
            .ok_or_else(|| PersistenceError::MissingVersionToken { key: key.clone() })?;

        let mut container: SagaDataContainer = serde_json::from_slice(&token.document)?;
        container.data = serde_json::to_value(saga)?;
        session.update(&key, serde_json::to_vec(&container)?)
    }

    /// Load a saga by id, recording its version in `session`.
    pub async fn get_by_id<T: SagaData>(
        &self,
        saga_id: Uuid,
        session: &mut Session,
    ) -> Result<Option<T>, PersistenceError> {
        let key = self.container_key::<T>(saga_id)?;

        let Some(stored) = session.load(&key).await? else {
            return Ok(None);
        };

        let container: SagaDataContainer = serde_json::from_slice(&stored.value)?;
        Ok(Some(serde_json::from_value(container.data)?))
    }

    /// Load a saga through its correlation value.
    ///
    /// Reads the uniqueness reservation by its deterministic key, then the
    /// container it points at. Both versions are recorded in `session`.
    pub async fn get_by_property<T: SagaData>(
        &self,
        property_name: &str,
        property_value: &str,
        session: &mut Session,
    ) -> Result<Option<T>, PersistenceError> {
        let identity_key =
            keys::saga_unique_identity_key(T::TYPE_NAME, property_name, property_value);

        let Some(stored) = session.load(&identity_key).await? else {
            return Ok(None);
        };

        let identity: SagaUniqueIdentity = serde_json::from_slice(&stored.value)?;
        self.get_by_id(identity.saga_id, session).await
    }

    /// Enlist the removal of the saga and its uniqueness reservation.
    ///
    /// Both deletes are conditioned on the versions read through `session`
    /// and go into the same commit, so a stale version on either fails the
    /// whole completion.
    pub async fn complete<T: SagaData>(
        &self,
        saga: &T,
        session: &mut Session,
    ) -> Result<(), PersistenceError> {
        let key = self.container_key::<T>(saga.id())?;
        let token = session
            .version_token(&key)
            .ok_or_else(|| PersistenceError::MissingVersionToken { key: key.clone() })?;

        let container: SagaDataContainer = serde_json::from_slice(&token.document)?;
        session.delete(&key)?;

        let Some(identity_key) = container.identity_doc_id else {
            return Ok(());
        };

        if session.version_token(&identity_key).is_none()
            && session.load(&identity_key).await?.is_none()
        {
            warn!(
                saga_type = T::TYPE_NAME,
                saga_id = %saga.id(),
                identity = %identity_key,
                "uniqueness reservation missing on completion"
            );
            return Ok(());
        }

        session.delete(&identity_key)
    }

    fn container_key<T: SagaData>(&self, saga_id: Uuid) -> Result<String, PersistenceError> {
        let collection = self.collections.collection_for(T::TYPE_NAME)?;
        Ok(keys::saga_container_key(collection, &self.separator, saga_id))
    }
}
