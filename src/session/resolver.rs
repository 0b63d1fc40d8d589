//! ResolveSession - Picks the session a message is processed with.
//!
//! Two strategies are available, chosen once at configuration time:
//!
//! - [`SessionByDelegate`]: a caller-supplied function opens the session.
//! - [`SessionByDatabaseName`]: a function maps headers to a database name,
//!   and the session is opened on that database's store.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::{Headers, Session};
use crate::error::PersistenceError;
use crate::store::CasStore;

/// Opens the session used to process a message with the given headers.
pub trait ResolveSession: Send + Sync {
    fn resolve_session(&self, headers: &Headers) -> Result<Session, PersistenceError>;
}

type OpenSessionFn = dyn Fn(&Headers) -> Result<Session, PersistenceError> + Send + Sync;

/// Resolves sessions through a caller-supplied function.
pub struct SessionByDelegate {
    open: Arc<OpenSessionFn>,
}

impl SessionByDelegate {
    pub fn new<F>(open: F) -> Self
    where
        F: Fn(&Headers) -> Result<Session, PersistenceError> + Send + Sync + 'static,
    {
        Self {
            open: Arc::new(open),
        }
    }
}

impl ResolveSession for SessionByDelegate {
    fn resolve_session(&self, headers: &Headers) -> Result<Session, PersistenceError> {
        (self.open)(headers)
    }
}

impl fmt::Debug for SessionByDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionByDelegate").finish_non_exhaustive()
    }
}

/// The default store plus any number of named database stores.
#[derive(Clone)]
pub struct DatabaseStores {
    default: Arc<dyn CasStore>,
    named: HashMap<String, Arc<dyn CasStore>>,
}

impl DatabaseStores {
    pub fn new(default: Arc<dyn CasStore>) -> Self {
        Self {
            default,
            named: HashMap::new(),
        }
    }

    /// Register the store for a named database.
    pub fn with_database(mut self, name: impl Into<String>, store: Arc<dyn CasStore>) -> Self {
        self.named.insert(name.into(), store);
        self
    }

    pub fn default_store(&self) -> &Arc<dyn CasStore> {
        &self.default
    }

    /// Open a session on `name`, or on the default store when `name` is empty.
    pub fn open_session(&self, name: &str) -> Result<Session, PersistenceError> {
        if name.is_empty() {
            return Ok(Session::new(self.default.clone()));
        }

        self.named
            .get(name)
            .map(|store| Session::for_database(store.clone(), name))
            .ok_or_else(|| PersistenceError::UnknownDatabase(name.to_string()))
    }
}

type DatabaseNameFn = dyn Fn(&Headers) -> Option<String> + Send + Sync;

/// Resolves sessions by mapping message headers to a database name.
pub struct SessionByDatabaseName {
    stores: DatabaseStores,
    database_for: Arc<DatabaseNameFn>,
}

impl SessionByDatabaseName {
    /// Every message goes to the default store.
    pub fn new(stores: DatabaseStores) -> Self {
        Self {
            stores,
            database_for: Arc::new(|_: &Headers| None::<String>),
        }
    }

    /// Route messages with a header-to-database convention. Returning `None`
    /// or an empty name selects the default store.
    pub fn with_convention<F>(mut self, database_for: F) -> Self
    where
        F: Fn(&Headers) -> Option<String> + Send + Sync + 'static,
    {
        self.database_for = Arc::new(database_for);
        self
    }

    /// Route messages by the value of a single header.
    pub fn by_header(stores: DatabaseStores, header: impl Into<String>) -> Self {
        let header = header.into();
        Self::new(stores).with_convention(move |headers| headers.get(&header).cloned())
    }
}

impl ResolveSession for SessionByDatabaseName {
    fn resolve_session(&self, headers: &Headers) -> Result<Session, PersistenceError> {
        let name = (self.database_for)(headers).unwrap_or_default();
        debug!(database = %name, "resolving session by database name");
        self.stores.open_session(&name)
    }
}

impl fmt::Debug for SessionByDatabaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionByDatabaseName")
            .field("databases", &self.stores.named.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
