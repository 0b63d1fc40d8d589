//! Persistence configuration.
//!
//! Deserializable from JSON (every field but the endpoint name has a
//! default) or built in code with the `with_*` methods.
//!
//! ```ignore
//! let config = PersistenceConfig::from_json(r#"{
//!     "endpoint_name": "Sales",
//!     "saga_collections": { "Shop.OrderSagaData": "OrderSagaDatas" },
//!     "outbox": { "time_to_keep_deduplication_data_secs": 86400 }
//! }"#)?;
//! let sagas = SagaPersister::from_config(&config);
//! let cleaner = OutboxCleaner::from_config(store.clone(), &config);
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::outbox::DEFAULT_PAGE_SIZE;
use crate::saga::SagaCollections;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid persistence configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid persistence configuration: {0}")]
    Invalid(String),
}

/// Outbox retention and cleanup schedule.
///
/// Durations are given in (possibly fractional) seconds in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutboxSettings {
    /// How long dispatched records are kept for deduplication.
    #[serde(rename = "time_to_keep_deduplication_data_secs", with = "duration_secs")]
    pub time_to_keep_deduplication_data: Duration,
    /// How often the cleanup task sweeps.
    #[serde(rename = "frequency_to_run_cleanup_secs", with = "duration_secs")]
    pub frequency_to_run_cleanup: Duration,
    pub cleanup_enabled: bool,
    pub page_size: usize,
}

impl Default for OutboxSettings {
    fn default() -> Self {
        Self {
            time_to_keep_deduplication_data: Duration::from_secs(7 * 24 * 60 * 60),
            frequency_to_run_cleanup: Duration::from_secs(60),
            cleanup_enabled: true,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl OutboxSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("outbox.page_size must be positive".into()));
        }
        if self.cleanup_enabled && self.frequency_to_run_cleanup.is_zero() {
            return Err(ConfigError::Invalid(
                "outbox.frequency_to_run_cleanup_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

/// Settings for one endpoint's outbox and saga persistence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PersistenceConfig {
    pub endpoint_name: String,
    #[serde(default = "default_identity_parts_separator")]
    pub identity_parts_separator: String,
    /// Saga data type name -> collection name.
    #[serde(default)]
    pub saga_collections: HashMap<String, String>,
    #[serde(default)]
    pub outbox: OutboxSettings,
}

fn default_identity_parts_separator() -> String {
    "/".to_string()
}

impl PersistenceConfig {
    pub fn new(endpoint_name: impl Into<String>) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
            identity_parts_separator: default_identity_parts_separator(),
            saga_collections: HashMap::new(),
            outbox: OutboxSettings::default(),
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint_name.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint_name must not be empty".into()));
        }
        if self.identity_parts_separator.is_empty() {
            return Err(ConfigError::Invalid(
                "identity_parts_separator must not be empty".into(),
            ));
        }
        self.outbox.validate()
    }

    /// Register a saga collection.
    pub fn with_saga_collection(
        mut self,
        type_name: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        self.saga_collections.insert(type_name.into(), collection.into());
        self
    }

    pub fn with_identity_parts_separator(mut self, separator: impl Into<String>) -> Self {
        self.identity_parts_separator = separator.into();
        self
    }

    pub fn with_time_to_keep_deduplication_data(mut self, keep: Duration) -> Self {
        self.outbox.time_to_keep_deduplication_data = keep;
        self
    }

    pub fn with_cleanup_frequency(mut self, frequency: Duration) -> Self {
        self.outbox.frequency_to_run_cleanup = frequency;
        self
    }

    pub fn with_cleanup_disabled(mut self) -> Self {
        self.outbox.cleanup_enabled = false;
        self
    }

    /// Resolve the saga collection registry.
    pub fn saga_collections(&self) -> SagaCollections {
        self.saga_collections
            .iter()
            .map(|(type_name, collection)| (type_name.as_str(), collection.as_str()))
            .collect()
    }
}
